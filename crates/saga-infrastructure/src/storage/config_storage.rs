//! `config.toml` storage.

use saga_core::config::RootConfig;
use saga_core::{Result, SagaError};
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding `storage.retention_days`.
pub const TTL_ENV: &str = "SAGA_GAME_TTL_DAYS";

pub struct ConfigStorage {
    path: PathBuf,
}

impl ConfigStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads the file; a missing or blank file yields defaults.
    ///
    /// # Errors
    ///
    /// `SagaError::Configuration` when the file exists but is not valid TOML
    /// for [`RootConfig`].
    pub fn load(&self) -> Result<RootConfig> {
        if !self.path.exists() {
            tracing::debug!("[ConfigStorage] {} not found, using defaults", self.path.display());
            return Ok(RootConfig::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(RootConfig::default());
        }
        toml::from_str(&content).map_err(|e| {
            SagaError::configuration(format!("Invalid {}: {}", self.path.display(), e))
        })
    }

    /// Loads the file and applies environment overrides.
    ///
    /// `ttl_override` is the raw value of [`TTL_ENV`], if set.
    pub fn load_effective(&self, ttl_override: Option<&str>) -> Result<RootConfig> {
        let mut config = self.load()?;
        config.storage = config.storage.with_retention_override(ttl_override);
        Ok(config)
    }

    /// Writes the defaults if no file exists yet.
    pub fn ensure_file(&self) -> Result<&Path> {
        if !self.path.exists() {
            if let Some(parent) = self.path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&self.path, toml::to_string_pretty(&RootConfig::default())?)?;
        }
        Ok(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
