use crate::config::MicropsiConfig;
use crate::error::RuntimeError;
use crate::logging::LogHub;
use crate::users::UserManager;
use nodenet::{NodeKind, Nodenet};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{error, info};
use world::{
    AdapterSnapshot, Config, ConfigOption, DefaultEnvironment, Environment, TimeSeries,
    TimeSeriesOptions, World, WorldAdapter, WorldProperties,
};

/// World types the runtime knows how to build.
pub const WORLD_TYPES: [&str; 2] = [DefaultEnvironment::WORLD_TYPE, TimeSeries::WORLD_TYPE];

#[derive(Debug, Clone, Serialize)]
pub struct WorldadapterDescription {
    pub config_options: Vec<ConfigOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NodenetSummary {
    pub name: String,
    pub owner: String,
    pub world: Option<String>,
    pub worldadapter: Option<String>,
    pub current_step: u64,
    pub running: bool,
}

/// All worlds and node nets hosted by one server.
pub struct Runtime {
    config: MicropsiConfig,
    worlds: BTreeMap<String, World>,
    nodenets: BTreeMap<String, Nodenet>,
    users: UserManager,
    logs: LogHub,
}

impl Runtime {
    pub fn new(config: MicropsiConfig, logs: LogHub) -> Self {
        Self {
            config,
            worlds: BTreeMap::new(),
            nodenets: BTreeMap::new(),
            users: UserManager::new(),
            logs,
        }
    }

    pub fn config(&self) -> &MicropsiConfig {
        &self.config
    }

    pub fn users(&self) -> &UserManager {
        &self.users
    }

    pub fn users_mut(&mut self) -> &mut UserManager {
        &mut self.users
    }

    pub fn logs(&self) -> &LogHub {
        &self.logs
    }

    fn world(&self, uid: &str) -> Result<&World, RuntimeError> {
        self.worlds
            .get(uid)
            .ok_or_else(|| RuntimeError::UnknownWorld(uid.to_string()))
    }

    fn world_mut(&mut self, uid: &str) -> Result<&mut World, RuntimeError> {
        self.worlds
            .get_mut(uid)
            .ok_or_else(|| RuntimeError::UnknownWorld(uid.to_string()))
    }

    fn nodenet_mut(&mut self, uid: &str) -> Result<&mut Nodenet, RuntimeError> {
        self.nodenets
            .get_mut(uid)
            .ok_or_else(|| RuntimeError::UnknownNodenet(uid.to_string()))
    }

    fn build_environment(
        &self,
        world_type: &str,
        config: &Config,
    ) -> Result<Box<dyn Environment>, RuntimeError> {
        match world_type {
            DefaultEnvironment::WORLD_TYPE => Ok(Box::new(DefaultEnvironment)),
            TimeSeries::WORLD_TYPE => {
                let options = TimeSeriesOptions::from_config(config)?;
                Ok(Box::new(TimeSeries::load(&self.config.data_directory, options)?))
            }
            other => Err(RuntimeError::UnknownWorldType(other.to_string())),
        }
    }

    pub fn new_world(
        &mut self,
        name: &str,
        world_type: &str,
        owner: &str,
        config: Config,
    ) -> Result<String, RuntimeError> {
        let environment = self.build_environment(world_type, &config)?;
        let world = World::new(name, owner, None, environment);
        let uid = world.uid.clone();
        info!(world = %uid, %name, world_type, "world created");
        self.worlds.insert(uid.clone(), world);
        Ok(uid)
    }

    /// Delete a world. Node nets living in it lose their body and stop.
    pub fn delete_world(&mut self, uid: &str) -> Result<(), RuntimeError> {
        self.worlds
            .remove(uid)
            .ok_or_else(|| RuntimeError::UnknownWorld(uid.to_string()))?;
        for net in self.nodenets.values_mut() {
            if net.world.as_deref() == Some(uid) {
                net.unbind();
            }
        }
        info!(world = %uid, "world deleted");
        Ok(())
    }

    pub fn get_available_worlds(&self) -> BTreeMap<String, WorldProperties> {
        self.worlds
            .iter()
            .map(|(uid, w)| (uid.clone(), w.properties()))
            .collect()
    }

    pub fn get_world_properties(&self, uid: &str) -> Result<WorldProperties, RuntimeError> {
        Ok(self.world(uid)?.properties())
    }

    pub fn step_world(&mut self, uid: &str) -> Result<u64, RuntimeError> {
        let world = self.world_mut(uid)?;
        world.step();
        Ok(world.current_step)
    }

    pub fn get_available_worldadapters(
        &self,
        world_uid: &str,
    ) -> Result<BTreeMap<String, WorldadapterDescription>, RuntimeError> {
        let env = self.world(world_uid)?.environment();
        Ok(env
            .supported_worldadapters()
            .into_iter()
            .map(|name| {
                (
                    name.to_string(),
                    WorldadapterDescription {
                        config_options: env.worldadapter_config_options(name),
                    },
                )
            })
            .collect())
    }

    pub fn spawn_agent(
        &mut self,
        world_uid: &str,
        adapter_type: &str,
        name: Option<String>,
        config: Config,
    ) -> Result<String, RuntimeError> {
        Ok(self
            .world_mut(world_uid)?
            .spawn_agent(adapter_type, None, name, config)?)
    }

    pub fn get_worldadapter_values(
        &self,
        world_uid: &str,
        agent_uid: &str,
    ) -> Result<AdapterSnapshot, RuntimeError> {
        Ok(self.world(world_uid)?.get_agent(agent_uid)?.snapshot())
    }

    pub fn set_datatarget_values(
        &mut self,
        world_uid: &str,
        agent_uid: &str,
        values: &[f64],
    ) -> Result<(), RuntimeError> {
        self.world_mut(world_uid)?
            .get_agent_mut(agent_uid)?
            .ports_mut()
            .set_datatarget_values(values)?;
        Ok(())
    }

    /// Create a node net, optionally giving it the body `worldadapter` in `world`.
    pub fn new_nodenet(
        &mut self,
        name: &str,
        owner: &str,
        world: Option<&str>,
        worldadapter: Option<&str>,
    ) -> Result<String, RuntimeError> {
        let mut net = Nodenet::new(name, owner, None);
        if let (Some(world_uid), Some(agent_uid)) = (world, worldadapter) {
            let agent = self.world_mut(world_uid)?.get_agent_mut(agent_uid)?;
            agent.info_mut().nodenet = Some(net.uid.clone());
            net.bind(world_uid, agent_uid);
        }
        let uid = net.uid.clone();
        info!(nodenet = %uid, %name, "nodenet created");
        self.nodenets.insert(uid.clone(), net);
        Ok(uid)
    }

    pub fn delete_nodenet(&mut self, uid: &str) -> Result<(), RuntimeError> {
        let net = self
            .nodenets
            .remove(uid)
            .ok_or_else(|| RuntimeError::UnknownNodenet(uid.to_string()))?;
        if let (Some(world_uid), Some(agent_uid)) = (net.world.as_deref(), net.worldadapter.as_deref()) {
            if let Some(agent) = self
                .worlds
                .get_mut(world_uid)
                .and_then(|w| w.get_agent_mut(agent_uid).ok())
            {
                agent.info_mut().nodenet = None;
            }
        }
        info!(nodenet = %uid, "nodenet deleted");
        Ok(())
    }

    pub fn get_available_nodenets(&self) -> BTreeMap<String, NodenetSummary> {
        self.nodenets
            .iter()
            .map(|(uid, n)| {
                (
                    uid.clone(),
                    NodenetSummary {
                        name: n.name.clone(),
                        owner: n.owner.clone(),
                        world: n.world.clone(),
                        worldadapter: n.worldadapter.clone(),
                        current_step: n.current_step,
                        running: n.running,
                    },
                )
            })
            .collect()
    }

    pub fn get_nodenet(&self, uid: &str) -> Result<&Nodenet, RuntimeError> {
        self.nodenets
            .get(uid)
            .ok_or_else(|| RuntimeError::UnknownNodenet(uid.to_string()))
    }

    pub fn add_node(&mut self, nodenet: &str, name: &str, kind: NodeKind) -> Result<String, RuntimeError> {
        Ok(self.nodenet_mut(nodenet)?.add_node(name, kind))
    }

    pub fn add_link(
        &mut self,
        nodenet: &str,
        source: &str,
        target: &str,
        weight: f64,
    ) -> Result<String, RuntimeError> {
        Ok(self.nodenet_mut(nodenet)?.add_link(source, target, weight)?)
    }

    pub fn set_node_activation(
        &mut self,
        nodenet: &str,
        node: &str,
        activation: f64,
    ) -> Result<(), RuntimeError> {
        Ok(self.nodenet_mut(nodenet)?.set_activation(node, activation)?)
    }

    /// Run one step of a node net against its body, if it has one.
    pub fn step_nodenet(&mut self, uid: &str) -> Result<u64, RuntimeError> {
        let net = self
            .nodenets
            .get_mut(uid)
            .ok_or_else(|| RuntimeError::UnknownNodenet(uid.to_string()))?;
        let adapter: Option<&mut dyn WorldAdapter> =
            match (net.world.as_deref(), net.worldadapter.as_deref()) {
                (Some(world_uid), Some(agent_uid)) => Some(
                    self.worlds
                        .get_mut(world_uid)
                        .ok_or_else(|| RuntimeError::UnknownWorld(world_uid.to_string()))?
                        .get_agent_mut(agent_uid)?,
                ),
                _ => None,
            };
        net.step(adapter)?;
        Ok(net.current_step)
    }

    pub fn start_nodenetrunner(&mut self, uid: &str) -> Result<(), RuntimeError> {
        let net = self.nodenet_mut(uid)?;
        if net.world.is_none() {
            return Err(RuntimeError::NotBound(uid.to_string()));
        }
        net.running = true;
        info!(nodenet = %uid, "runner started");
        Ok(())
    }

    pub fn stop_nodenetrunner(&mut self, uid: &str) -> Result<(), RuntimeError> {
        self.nodenet_mut(uid)?.running = false;
        info!(nodenet = %uid, "runner stopped");
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.nodenets.values().any(|n| n.running)
    }

    /// One runner cycle: step every world hosting a running node net, then
    /// every running node net. A failing net is stopped.
    pub fn tick(&mut self) {
        let running: Vec<String> = self
            .nodenets
            .values()
            .filter(|n| n.running)
            .map(|n| n.uid.clone())
            .collect();
        if running.is_empty() {
            return;
        }
        let worlds: BTreeSet<String> = running
            .iter()
            .filter_map(|uid| self.nodenets.get(uid).and_then(|n| n.world.clone()))
            .collect();
        for world_uid in &worlds {
            if let Some(world) = self.worlds.get_mut(world_uid) {
                world.step();
            }
        }
        for uid in running {
            if let Err(err) = self.step_nodenet(&uid) {
                error!(nodenet = %uid, %err, "nodenet step failed, stopping runner");
                if let Some(net) = self.nodenets.get_mut(&uid) {
                    net.running = false;
                }
            }
        }
    }
}
