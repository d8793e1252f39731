use nodenet::{NodeKind, Nodenet, NodenetError};
use world::{
    Config, DataPorts, DefaultAdapter, DefaultArrayAdapter, DefaultEnvironment, World, WorldAdapter,
};

#[test]
fn sensor_to_actuator_round_trip_through_world() {
    let mut world = World::new("w", "tester", None, Box::new(DefaultEnvironment));
    let agent = world
        .spawn_agent(DefaultAdapter::TYPE, None, None, Config::new())
        .unwrap();

    let mut net = Nodenet::new("echoer", "tester", None);
    net.bind(world.uid.clone(), agent.clone());
    let sensor = net.add_node(
        "on",
        NodeKind::Sensor {
            datasource: "static_on".into(),
        },
    );
    let actuator = net.add_node(
        "echo",
        NodeKind::Actuator {
            datatarget: "echo".into(),
        },
    );
    net.add_link(&sensor, &actuator, 0.25).unwrap();

    // first step: the sensor picks up static_on, the actuator still sees nothing
    net.step(Some(world.get_agent_mut(&agent).unwrap())).unwrap();
    assert_eq!(net.get_node(&sensor).unwrap().activation, 1.0);
    world.step();

    net.step(Some(world.get_agent_mut(&agent).unwrap())).unwrap();
    assert_eq!(net.get_node(&actuator).unwrap().activation, 0.25);
    world.step();

    let ports = world.get_agent(&agent).unwrap().ports();
    assert_eq!(ports.datatarget_feedback_value("echo"), Some(0.25));
}

#[test]
fn actuator_on_missing_array_target_fails() {
    let mut world = World::new("w", "tester", None, Box::new(DefaultEnvironment));
    let agent = world
        .spawn_agent(DefaultArrayAdapter::TYPE, None, None, Config::new())
        .unwrap();
    let mut net = Nodenet::new("broken", "tester", None);
    net.add_node(
        "motor",
        NodeKind::Actuator {
            datatarget: "no_such_target".into(),
        },
    );
    let err = net
        .step(Some(world.get_agent_mut(&agent).unwrap()))
        .unwrap_err();
    assert!(matches!(err, NodenetError::World(_)));
}

#[test]
fn failed_step_leaves_net_and_body_untouched() {
    let mut world = World::new("w", "tester", None, Box::new(DefaultEnvironment));
    let agent = world
        .spawn_agent(DefaultArrayAdapter::TYPE, None, None, Config::new())
        .unwrap();
    let mut net = Nodenet::new("half-broken", "tester", None);
    let source = net.add_node("r", NodeKind::Register);
    let good = net.add_node(
        "good",
        NodeKind::Actuator {
            datatarget: "test".into(),
        },
    );
    let bad = net.add_node(
        "bad",
        NodeKind::Actuator {
            datatarget: "nope".into(),
        },
    );
    net.add_link(&source, &good, 1.0).unwrap();
    net.add_link(&source, &bad, 1.0).unwrap();
    net.set_activation(&source, 5.0).unwrap();
    net.set_activation(&good, 5.0).unwrap();

    let err = net
        .step(Some(world.get_agent_mut(&agent).unwrap()))
        .unwrap_err();
    assert!(matches!(err, NodenetError::World(_)));

    assert_eq!(net.current_step, 0);
    assert_eq!(net.get_node(&source).unwrap().activation, 5.0);
    assert_eq!(net.get_node(&good).unwrap().activation, 5.0);
    let ports = world.get_agent(&agent).unwrap().ports();
    assert_eq!(ports.datatarget_value("test"), Some(0.0));
}
