//! Path layout for saga configuration and game data.
//!
//! ```text
//! <config_dir>/saga/          # ~/.config/saga on Linux
//! ├── config.toml             # RootConfig
//! └── secret.json             # API keys
//!
//! <data_dir>/saga/            # ~/.local/share/saga on Linux
//! ├── games/                  # one <session-id>.json per game
//! └── logs/                   # saga.log.YYYY-MM-DD
//! ```
//!
//! Setting `SAGA_HOME` places both trees under that directory instead.

use saga_core::{Result, SagaError};
use std::path::{Path, PathBuf};

pub const HOME_ENV: &str = "SAGA_HOME";
const APP_DIR: &str = "saga";

/// Resolved directories for one process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl SagaPaths {
    /// Resolves paths from `SAGA_HOME` or the platform directories.
    ///
    /// # Errors
    ///
    /// Returns `SagaError::Configuration` when no home directory can be
    /// determined and `SAGA_HOME` is unset.
    pub fn resolve() -> Result<Self> {
        match std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
            Some(home) => Ok(Self::under(PathBuf::from(home))),
            None => Self::platform(),
        }
    }

    /// Uses `<root>/config` and `<root>/data`.
    pub fn under(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            config_dir: root.join("config"),
            data_dir: root.join("data"),
        }
    }

    fn platform() -> Result<Self> {
        let config = dirs::config_dir()
            .ok_or_else(|| SagaError::configuration("Cannot find config directory"))?;
        let data = dirs::data_dir()
            .ok_or_else(|| SagaError::configuration("Cannot find data directory"))?;
        Ok(Self {
            config_dir: config.join(APP_DIR),
            data_dir: data.join(APP_DIR),
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }

    /// # Security Note
    ///
    /// The file holds plaintext API keys and should be mode 600.
    pub fn secret_file(&self) -> PathBuf {
        self.config_dir.join("secret.json")
    }

    pub fn games_dir(&self) -> PathBuf {
        self.data_dir.join("games")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Creates the games and logs directories.
    pub fn ensure_dirs(&self) -> Result<()> {
        for dir in [self.games_dir(), self.logs_dir()] {
            std::fs::create_dir_all(&dir).map_err(|e| {
                SagaError::io(format!("Failed to create {}: {}", dir.display(), e))
            })?;
        }
        Ok(())
    }
}
