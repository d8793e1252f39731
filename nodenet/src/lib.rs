//! A small node net: the agent side of the agent/world coupling.
//!
//! Sensor nodes take their activation from a datasource of the bound world
//! adapter, actuator nodes push theirs into a datatarget, and every other
//! node sums its weighted incoming links. All nodes are updated from the
//! previous step's activations, so the result does not depend on the order
//! nodes are stored in.

mod error;
mod net;

pub use error::NodenetError;
pub use net::{Link, Node, NodeKind, Nodenet};
