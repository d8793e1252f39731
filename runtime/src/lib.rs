//! The MicroPsi runtime: every world and node net of a running server,
//! plus the configuration, users and logs they share.

pub mod config;
pub mod error;
pub mod logging;
pub mod runner;
pub mod runtime;
pub mod users;

pub use config::{ConfigError, MicropsiConfig};
pub use error::RuntimeError;
pub use logging::{LogHub, LogRecord, init_logging};
pub use runner::spawn_runner;
pub use runtime::{NodenetSummary, Runtime, WorldadapterDescription};
pub use users::{Permission, Role, UserError, UserManager};
