use std::any::Any;
use world::{
    AdapterInfo, Config, DataPorts, DefaultAdapter, DefaultEnvironment, Environment, KeyedPorts,
    World, WorldAdapter, WorldError,
};

/// Adapter that dies after a fixed number of updates.
struct Mayfly {
    info: AdapterInfo,
    ports: KeyedPorts,
    lives: u32,
}

impl WorldAdapter for Mayfly {
    fn info(&self) -> &AdapterInfo {
        &self.info
    }
    fn info_mut(&mut self) -> &mut AdapterInfo {
        &mut self.info
    }
    fn ports(&self) -> &dyn DataPorts {
        &self.ports
    }
    fn ports_mut(&mut self) -> &mut dyn DataPorts {
        &mut self.ports
    }
    fn update_data_sources_and_targets(&mut self, _env: &dyn Environment) {
        self.lives = self.lives.saturating_sub(1);
    }
    fn is_alive(&self) -> bool {
        self.lives > 0
    }
}

struct Pond;

impl Environment for Pond {
    fn world_type(&self) -> &str {
        "Pond"
    }
    fn supported_worldadapters(&self) -> Vec<&'static str> {
        vec!["Mayfly"]
    }
    fn create_worldadapter(
        &self,
        _adapter_type: &str,
        info: AdapterInfo,
    ) -> Result<Box<dyn WorldAdapter>, WorldError> {
        Ok(Box::new(Mayfly {
            info,
            ports: KeyedPorts::new(),
            lives: 2,
        }))
    }
    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn default_world() -> World {
    World::new("island", "tester", None, Box::new(DefaultEnvironment))
}

#[test]
fn spawned_agents_are_listed() {
    let mut world = default_world();
    let uid = world
        .spawn_agent(DefaultAdapter::TYPE, None, Some("bob".into()), Config::new())
        .unwrap();
    let props = world.properties();
    assert_eq!(props.world_type, "DefaultWorld");
    assert_eq!(props.agents[&uid].name, "bob");
    assert_eq!(props.agents[&uid].adapter_type, "Default");
    assert!(props.supported_worldadapters.contains(&"DefaultArray".to_string()));
}

#[test]
fn unsupported_adapter_rejected() {
    let mut world = default_world();
    let err = world
        .spawn_agent("TimeSeriesRunner", None, None, Config::new())
        .unwrap_err();
    assert!(matches!(err, WorldError::UnsupportedWorldadapter { .. }));
}

#[test]
fn duplicate_uid_rejected() {
    let mut world = default_world();
    world
        .spawn_agent(DefaultAdapter::TYPE, Some("a1".into()), None, Config::new())
        .unwrap();
    assert!(matches!(
        world.spawn_agent(DefaultAdapter::TYPE, Some("a1".into()), None, Config::new()),
        Err(WorldError::DuplicateAgent(_))
    ));
}

#[test]
fn step_updates_agents_and_clears_targets() {
    let mut world = default_world();
    let uid = world
        .spawn_agent(DefaultAdapter::TYPE, None, None, Config::new())
        .unwrap();
    world
        .get_agent_mut(&uid)
        .unwrap()
        .ports_mut()
        .add_to_datatarget("echo", 1.5)
        .unwrap();
    world.step();
    assert_eq!(world.current_step, 1);
    let agent = world.get_agent(&uid).unwrap();
    assert_eq!(agent.ports().datatarget_feedback_value("echo"), Some(1.5));
    assert_eq!(agent.ports().datatarget_value("echo"), Some(0.0));
}

#[test]
fn dead_agents_are_removed() {
    let mut world = World::new("pond", "tester", Some("w1".into()), Box::new(Pond));
    let uid = world.spawn_agent("Mayfly", None, None, Config::new()).unwrap();
    world.step();
    world.step();
    assert!(world.get_agent(&uid).is_ok());
    world.step();
    assert!(matches!(world.get_agent(&uid), Err(WorldError::UnknownAgent(_))));
    assert_eq!(world.agents().count(), 0);
}

#[test]
fn remove_unknown_agent_fails() {
    let mut world = default_world();
    assert!(world.remove_agent("ghost").is_err());
}
