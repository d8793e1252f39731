use crate::adapter::{AdapterInfo, ConfigOption, DefaultAdapter, DefaultArrayAdapter, WorldAdapter};
use crate::error::WorldError;
use std::any::Any;

/// The simulated part of a world: what agents sense and act upon.
///
/// A [`crate::World`] keeps the bookkeeping (step counter, agents) and
/// delegates everything world-specific to its environment.
pub trait Environment: Any + Send + Sync {
    fn world_type(&self) -> &str;

    /// Adapter types agents in this world may use.
    fn supported_worldadapters(&self) -> Vec<&'static str>;

    /// Configuration parameters understood by `adapter_type`.
    fn worldadapter_config_options(&self, _adapter_type: &str) -> Vec<ConfigOption> {
        Vec::new()
    }

    /// Advance the simulation. Runs before the agents are updated.
    fn step(&mut self, _current_step: u64) {}

    /// Build an adapter of a supported type.
    fn create_worldadapter(
        &self,
        adapter_type: &str,
        info: AdapterInfo,
    ) -> Result<Box<dyn WorldAdapter>, WorldError>;

    /// Access to the concrete environment, for adapters that need it.
    fn as_any(&self) -> &dyn Any;
}

/// A world with nothing in it but the example adapters.
#[derive(Debug, Default)]
pub struct DefaultEnvironment;

impl DefaultEnvironment {
    pub const WORLD_TYPE: &'static str = "DefaultWorld";
}

impl Environment for DefaultEnvironment {
    fn world_type(&self) -> &str {
        Self::WORLD_TYPE
    }

    fn supported_worldadapters(&self) -> Vec<&'static str> {
        vec![DefaultAdapter::TYPE, DefaultArrayAdapter::TYPE]
    }

    fn create_worldadapter(
        &self,
        adapter_type: &str,
        info: AdapterInfo,
    ) -> Result<Box<dyn WorldAdapter>, WorldError> {
        match adapter_type {
            DefaultAdapter::TYPE => Ok(Box::new(DefaultAdapter::new(info))),
            DefaultArrayAdapter::TYPE => Ok(Box::new(DefaultArrayAdapter::new(info))),
            other => Err(WorldError::UnsupportedWorldadapter {
                adapter: other.to_string(),
                world_type: Self::WORLD_TYPE.to_string(),
            }),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
