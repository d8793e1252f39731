//! Small helpers shared by every MicroPsi crate.
//!
//! Nothing in here knows about worlds or node nets; it only deals with
//! identifiers and the filesystem.

pub mod tools;

pub use tools::{IdError, ToolError, check_for_url_proof_id, generate_uid, mkdir};
