use crate::users::UserError;
use nodenet::NodenetError;
use thiserror::Error;
use world::WorldError;

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("unknown world: {0}")]
    UnknownWorld(String),
    #[error("unknown world type: {0}")]
    UnknownWorldType(String),
    #[error("unknown nodenet: {0}")]
    UnknownNodenet(String),
    #[error("nodenet {0} is not bound to a world")]
    NotBound(String),
    #[error(transparent)]
    World(#[from] WorldError),
    #[error(transparent)]
    Nodenet(#[from] NodenetError),
    #[error(transparent)]
    User(#[from] UserError),
}
