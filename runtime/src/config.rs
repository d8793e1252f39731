//! Server configuration.
//!
//! Values come from `config.ini` (see `config.ini.template` at the
//! repository root), then `MICROPSI_*` environment variables, then command
//! line flags, each layer overriding the previous one.

use ini::Ini;
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

pub const DEFAULT_PORT: u16 = 6543;
pub const DEFAULT_RUNNER_TIMESTEP_MS: u64 = 100;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Read(#[from] ini::Error),
    #[error(transparent)]
    Parse(#[from] ini::ParseError),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: String, value: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MicropsiConfig {
    pub version: String,
    pub apptitle: String,
    pub host: String,
    pub port: u16,
    pub data_directory: PathBuf,
    pub runner_timestep_ms: u64,
    pub log_level: String,
}

impl Default for MicropsiConfig {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            apptitle: "MicroPsi".to_string(),
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            data_directory: PathBuf::from("micropsi2_data"),
            runner_timestep_ms: DEFAULT_RUNNER_TIMESTEP_MS,
            log_level: "info".to_string(),
        }
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

impl MicropsiConfig {
    /// Load `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "config file not found, using defaults");
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)?;
        Self::from_ini(&ini)
    }

    pub fn from_ini_str(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text)?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(section) = ini.section(Some("micropsi2")) {
            for (key, value) in section.iter() {
                config.set(key, value)?;
            }
        }
        if let Some(level) = ini.section(Some("logging")).and_then(|s| s.get("level")) {
            config.log_level = level.trim().to_string();
        }
        Ok(config)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "version" => self.version = value.trim().to_string(),
            "apptitle" => self.apptitle = value.trim().to_string(),
            "host" => self.host = value.trim().to_string(),
            "port" => self.port = parse(key, value)?,
            "data_directory" => self.data_directory = PathBuf::from(value.trim()),
            "runner_timestep" => self.runner_timestep_ms = parse(key, value)?,
            other => warn!(key = other, "ignoring unknown config key"),
        }
        Ok(())
    }

    /// Apply `MICROPSI_*` overrides found through `lookup`.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        for key in ["host", "port", "data_directory", "runner_timestep"] {
            let var = format!("MICROPSI_{}", key.to_uppercase());
            if let Some(value) = lookup(&var) {
                self.set(key, &value)?;
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env(|var| std::env::var(var).ok())
    }
}
