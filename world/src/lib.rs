//! Worlds and the adapters that connect agents to them.
//!
//! An agent (a node net) never touches a world directly. It writes
//! activations into the *data targets* of its world adapter and reads the
//! *data sources*. At each world step the adapter turns targets into
//! actions and refreshes sources from whatever the world looks like now.
//!
//! Agent and world do not run in lockstep, so agents have to cope with lag
//! between acting and sensing the consequences.

pub mod adapter;
pub mod environment;
pub mod error;
pub mod ports;
pub mod timeseries;
pub mod world;

pub use adapter::{
    AdapterInfo, AdapterSnapshot, Config, ConfigOption, DefaultAdapter, DefaultArrayAdapter,
    WorldAdapter,
};
pub use environment::{DefaultEnvironment, Environment};
pub use error::WorldError;
pub use ports::{ArrayPorts, DataPorts, KeyedPorts};
pub use timeseries::{TimeSeries, TimeSeriesOptions, TimeSeriesRunner};
pub use world::{AgentSummary, World, WorldProperties};
