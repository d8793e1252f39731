use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorldError {
    #[error("unknown datasource: {0}")]
    UnknownDatasource(String),
    #[error("unknown datatarget: {0}")]
    UnknownDatatarget(String),
    #[error("unknown group: {0}")]
    UnknownGroup(String),
    #[error("expected {expected} values, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("group {name} has {expected} entries, got {actual} values")]
    ShapeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },
    #[error("world type {world_type} does not support worldadapter {adapter}")]
    UnsupportedWorldadapter { adapter: String, world_type: String },
    #[error("unknown agent: {0}")]
    UnknownAgent(String),
    #[error("agent {0} already exists")]
    DuplicateAgent(String),
    #[error("invalid world options: {0}")]
    InvalidOptions(String),
    #[error("time series in {path} is unusable: {reason}")]
    BadTimeSeries { path: PathBuf, reason: String },
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
