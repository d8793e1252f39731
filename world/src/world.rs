use crate::adapter::{AdapterInfo, Config, WorldAdapter};
use crate::environment::Environment;
use crate::error::WorldError;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// A simulated world populated by agents.
pub struct World {
    pub uid: String,
    pub name: String,
    pub owner: String,
    pub current_step: u64,
    agents: BTreeMap<String, Box<dyn WorldAdapter>>,
    environment: Box<dyn Environment>,
}

/// Short description of one agent living in a world.
#[derive(Debug, Clone, Serialize)]
pub struct AgentSummary {
    pub name: String,
    pub adapter_type: String,
    pub nodenet: Option<String>,
}

/// Serializable description of a world.
#[derive(Debug, Clone, Serialize)]
pub struct WorldProperties {
    pub uid: String,
    pub name: String,
    pub owner: String,
    pub world_type: String,
    pub current_step: u64,
    pub agents: BTreeMap<String, AgentSummary>,
    pub supported_worldadapters: Vec<String>,
}

impl World {
    pub fn new(
        name: impl Into<String>,
        owner: impl Into<String>,
        uid: Option<String>,
        environment: Box<dyn Environment>,
    ) -> Self {
        Self {
            uid: uid.unwrap_or_else(shared::generate_uid),
            name: name.into(),
            owner: owner.into(),
            current_step: 0,
            agents: BTreeMap::new(),
            environment,
        }
    }

    pub fn world_type(&self) -> &str {
        self.environment.world_type()
    }

    pub fn environment(&self) -> &dyn Environment {
        self.environment.as_ref()
    }

    pub fn supported_worldadapters(&self) -> Vec<&'static str> {
        self.environment.supported_worldadapters()
    }

    /// Create an agent body of type `adapter_type` and return its uid.
    pub fn spawn_agent(
        &mut self,
        adapter_type: &str,
        uid: Option<String>,
        name: Option<String>,
        config: Config,
    ) -> Result<String, WorldError> {
        if !self.supported_worldadapters().contains(&adapter_type) {
            return Err(WorldError::UnsupportedWorldadapter {
                adapter: adapter_type.to_string(),
                world_type: self.world_type().to_string(),
            });
        }
        if let Some(uid) = uid.as_deref() {
            if self.agents.contains_key(uid) {
                return Err(WorldError::DuplicateAgent(uid.to_string()));
            }
        }
        let options = self.environment.worldadapter_config_options(adapter_type);
        let info = AdapterInfo::new(adapter_type, uid, name, &options, config);
        let adapter = self.environment.create_worldadapter(adapter_type, info)?;
        let uid = adapter.uid().to_string();
        info!(world = %self.uid, agent = %uid, adapter = adapter_type, "spawned agent");
        self.agents.insert(uid.clone(), adapter);
        Ok(uid)
    }

    pub fn remove_agent(&mut self, uid: &str) -> Result<Box<dyn WorldAdapter>, WorldError> {
        self.agents
            .remove(uid)
            .ok_or_else(|| WorldError::UnknownAgent(uid.to_string()))
    }

    pub fn get_agent(&self, uid: &str) -> Result<&dyn WorldAdapter, WorldError> {
        self.agents
            .get(uid)
            .map(|a| a.as_ref())
            .ok_or_else(|| WorldError::UnknownAgent(uid.to_string()))
    }

    pub fn get_agent_mut(&mut self, uid: &str) -> Result<&mut dyn WorldAdapter, WorldError> {
        match self.agents.get_mut(uid) {
            Some(agent) => Ok(agent.as_mut()),
            None => Err(WorldError::UnknownAgent(uid.to_string())),
        }
    }

    pub fn agents(&self) -> impl Iterator<Item = &dyn WorldAdapter> {
        self.agents.values().map(|a| a.as_ref())
    }

    /// Advance the world by one step and let every living agent update.
    pub fn step(&mut self) {
        self.current_step += 1;
        self.environment.step(self.current_step);
        self.agents.retain(|uid, agent| {
            let alive = agent.is_alive();
            if !alive {
                info!(agent = %uid, "agent died, removing it from the world");
            }
            alive
        });
        let env: &dyn Environment = self.environment.as_ref();
        for agent in self.agents.values_mut() {
            agent.update(env);
        }
        debug!(world = %self.uid, step = self.current_step, "world stepped");
    }

    pub fn properties(&self) -> WorldProperties {
        WorldProperties {
            uid: self.uid.clone(),
            name: self.name.clone(),
            owner: self.owner.clone(),
            world_type: self.world_type().to_string(),
            current_step: self.current_step,
            agents: self
                .agents
                .iter()
                .map(|(uid, a)| {
                    let info = a.info();
                    (
                        uid.clone(),
                        AgentSummary {
                            name: info.name.clone(),
                            adapter_type: info.adapter_type.clone(),
                            nodenet: info.nodenet.clone(),
                        },
                    )
                })
                .collect(),
            supported_worldadapters: self
                .supported_worldadapters()
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}
