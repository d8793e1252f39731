use crate::error::NodenetError;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};
use world::WorldAdapter;

/// What a node does at the boundary to the world.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NodeKind {
    /// Reads a datasource.
    Sensor { datasource: String },
    /// Writes a datatarget.
    Actuator { datatarget: String },
    /// Plain summing node.
    Register,
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub uid: String,
    pub name: String,
    pub kind: NodeKind,
    pub activation: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Link {
    pub uid: String,
    pub source: String,
    pub target: String,
    pub weight: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Nodenet {
    pub uid: String,
    pub name: String,
    pub owner: String,
    pub world: Option<String>,
    pub worldadapter: Option<String>,
    pub current_step: u64,
    pub running: bool,
    nodes: BTreeMap<String, Node>,
    links: BTreeMap<String, Link>,
}

impl Nodenet {
    pub fn new(name: impl Into<String>, owner: impl Into<String>, uid: Option<String>) -> Self {
        Self {
            uid: uid.unwrap_or_else(shared::generate_uid),
            name: name.into(),
            owner: owner.into(),
            world: None,
            worldadapter: None,
            current_step: 0,
            running: false,
            nodes: BTreeMap::new(),
            links: BTreeMap::new(),
        }
    }

    /// Attach the net to an agent body in a world.
    pub fn bind(&mut self, world: impl Into<String>, worldadapter: impl Into<String>) {
        self.world = Some(world.into());
        self.worldadapter = Some(worldadapter.into());
    }

    pub fn unbind(&mut self) {
        self.world = None;
        self.worldadapter = None;
        self.running = false;
    }

    pub fn add_node(&mut self, name: impl Into<String>, kind: NodeKind) -> String {
        let uid = shared::generate_uid();
        let name = name.into();
        info!(nodenet = %self.uid, node = %uid, %name, "node added");
        self.nodes.insert(
            uid.clone(),
            Node {
                uid: uid.clone(),
                name,
                kind,
                activation: 0.0,
            },
        );
        uid
    }

    /// Remove a node together with every link touching it.
    pub fn delete_node(&mut self, uid: &str) -> Result<Node, NodenetError> {
        let node = self
            .nodes
            .remove(uid)
            .ok_or_else(|| NodenetError::UnknownNode(uid.to_string()))?;
        self.links.retain(|_, l| l.source != uid && l.target != uid);
        Ok(node)
    }

    pub fn add_link(&mut self, source: &str, target: &str, weight: f64) -> Result<String, NodenetError> {
        for end in [source, target] {
            if !self.nodes.contains_key(end) {
                return Err(NodenetError::UnknownNode(end.to_string()));
            }
        }
        let uid = shared::generate_uid();
        self.links.insert(
            uid.clone(),
            Link {
                uid: uid.clone(),
                source: source.to_string(),
                target: target.to_string(),
                weight,
            },
        );
        Ok(uid)
    }

    pub fn delete_link(&mut self, uid: &str) -> Result<Link, NodenetError> {
        self.links
            .remove(uid)
            .ok_or_else(|| NodenetError::UnknownLink(uid.to_string()))
    }

    pub fn set_activation(&mut self, uid: &str, activation: f64) -> Result<(), NodenetError> {
        let node = self
            .nodes
            .get_mut(uid)
            .ok_or_else(|| NodenetError::UnknownNode(uid.to_string()))?;
        node.activation = activation;
        Ok(())
    }

    pub fn get_node(&self, uid: &str) -> Result<&Node, NodenetError> {
        self.nodes
            .get(uid)
            .ok_or_else(|| NodenetError::UnknownNode(uid.to_string()))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn links(&self) -> impl Iterator<Item = &Link> {
        self.links.values()
    }

    /// Run one net step against `adapter`, if the net has a body.
    pub fn step(&mut self, mut adapter: Option<&mut dyn WorldAdapter>) -> Result<(), NodenetError> {
        let previous: HashMap<&str, f64> = self
            .nodes
            .iter()
            .map(|(uid, n)| (uid.as_str(), n.activation))
            .collect();
        let mut incoming: HashMap<String, f64> = HashMap::new();
        for link in self.links.values() {
            let source = previous.get(link.source.as_str()).copied().unwrap_or(0.0);
            *incoming.entry(link.target.clone()).or_insert(0.0) += link.weight * source;
        }

        // computed in node order, committed only once every actuator write landed
        let activations: Vec<f64> = self
            .nodes
            .values()
            .map(|node| match &node.kind {
                NodeKind::Sensor { datasource } => adapter
                    .as_deref()
                    .and_then(|a| a.ports().datasource_value(datasource))
                    .unwrap_or(0.0),
                _ => incoming.get(&node.uid).copied().unwrap_or(0.0),
            })
            .collect();

        if let Some(adapter) = adapter.as_deref_mut() {
            let written = adapter.ports().datatarget_values();
            for (node, activation) in self.nodes.values().zip(&activations) {
                if let NodeKind::Actuator { datatarget } = &node.kind {
                    if let Err(err) = adapter.ports_mut().add_to_datatarget(datatarget, *activation) {
                        adapter.ports_mut().set_datatarget_values(&written)?;
                        return Err(err.into());
                    }
                }
            }
        }

        for (node, activation) in self.nodes.values_mut().zip(activations) {
            node.activation = activation;
        }

        self.current_step += 1;
        debug!(nodenet = %self.uid, step = self.current_step, "nodenet stepped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_chain_propagates_one_hop_per_step() {
        let mut net = Nodenet::new("chain", "tester", None);
        let a = net.add_node("a", NodeKind::Register);
        let b = net.add_node("b", NodeKind::Register);
        let c = net.add_node("c", NodeKind::Register);
        net.add_link(&a, &b, 0.5).unwrap();
        net.add_link(&b, &c, 2.0).unwrap();
        net.add_link(&a, &a, 1.0).unwrap();
        net.set_activation(&a, 1.0).unwrap();

        net.step(None).unwrap();
        assert_eq!(net.get_node(&b).unwrap().activation, 0.5);
        assert_eq!(net.get_node(&c).unwrap().activation, 0.0);

        net.step(None).unwrap();
        assert_eq!(net.get_node(&c).unwrap().activation, 1.0);
        assert_eq!(net.get_node(&a).unwrap().activation, 1.0);
        assert_eq!(net.current_step, 2);
    }

    #[test]
    fn deleting_a_node_drops_its_links() {
        let mut net = Nodenet::new("n", "tester", None);
        let a = net.add_node("a", NodeKind::Register);
        let b = net.add_node("b", NodeKind::Register);
        net.add_link(&a, &b, 1.0).unwrap();
        net.delete_node(&b).unwrap();
        assert_eq!(net.links().count(), 0);
        assert!(matches!(
            net.add_link(&a, &b, 1.0),
            Err(NodenetError::UnknownNode(_))
        ));
    }

    #[test]
    fn unbound_sensors_read_zero() {
        let mut net = Nodenet::new("n", "tester", None);
        let s = net.add_node(
            "s",
            NodeKind::Sensor {
                datasource: "static_on".into(),
            },
        );
        net.set_activation(&s, 3.0).unwrap();
        net.step(None).unwrap();
        assert_eq!(net.get_node(&s).unwrap().activation, 0.0);
    }

    #[test]
    fn node_kind_serializes_with_type_tag() {
        let json = serde_json::to_value(NodeKind::Actuator {
            datatarget: "echo".into(),
        })
        .unwrap();
        assert_eq!(json["type"], "actuator");
        assert_eq!(json["datatarget"], "echo");
    }
}
