//! JSON configuration file adapter.
//!
//! Implements [`ConfigPort`] over a file on disk.  Missing fields take
//! their defaults; the loaded configuration is validated before it is
//! handed out, never clamped.

use std::io;
use std::path::PathBuf;

use log::info;

use crate::app::ports::ConfigPort;
use crate::config::{ConfigError, RigConfig};

pub struct JsonConfigFile {
    path: PathBuf,
}

impl JsonConfigFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigPort for JsonConfigFile {
    fn load(&self) -> Result<RigConfig, ConfigError> {
        let text = std::fs::read_to_string(&self.path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ConfigError::NotFound(self.path.display().to_string()),
            _ => ConfigError::Io(format!("{}: {}", self.path.display(), e)),
        })?;
        let config: RigConfig = serde_json::from_str(&text)
            .map_err(|e| ConfigError::Corrupted(format!("{}: {}", self.path.display(), e)))?;
        config.validate()?;
        info!("loaded rig configuration from {}", self.path.display());
        Ok(config)
    }
}
