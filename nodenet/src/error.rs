use thiserror::Error;
use world::WorldError;

#[derive(Debug, Error)]
pub enum NodenetError {
    #[error("unknown node: {0}")]
    UnknownNode(String),
    #[error("unknown link: {0}")]
    UnknownLink(String),
    #[error(transparent)]
    World(#[from] WorldError),
}
