//! Secret configuration file storage.
//!
//! Read-only access to `secret.json`. API keys are never logged.

use saga_core::config::{AnthropicConfig, SecretConfig};
use saga_core::{Result, SagaError};
use std::fs;
use std::path::{Path, PathBuf};

pub struct SecretStorage {
    path: PathBuf,
}

impl SecretStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Loads `secret.json`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(SecretConfig))`: Successfully loaded and parsed
    /// - `Ok(None)`: File doesn't exist
    /// - `Err`: `SagaError::Configuration` for unreadable or invalid JSON
    pub fn load(&self) -> Result<Option<SecretConfig>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.path).map_err(|e| {
            SagaError::configuration(format!("Failed to read {}: {}", self.path.display(), e))
        })?;
        let config = serde_json::from_str(&content).map_err(|e| {
            SagaError::configuration(format!("Invalid JSON in {}: {}", self.path.display(), e))
        })?;
        Ok(Some(config))
    }

    /// Loads the file, treating a missing one as empty.
    pub fn load_or_default(&self) -> Result<SecretConfig> {
        Ok(self.load()?.unwrap_or_default())
    }

    /// Writes a template with an empty key if no file exists yet.
    ///
    /// The file is created with mode 600 on Unix.
    pub fn ensure_template(&self) -> Result<&Path> {
        if self.path.exists() {
            return Ok(&self.path);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }

        let template = SecretConfig {
            anthropic: Some(AnthropicConfig {
                api_key: String::new(),
                model_name: None,
            }),
        };
        fs::write(&self.path, serde_json::to_string_pretty(&template)?)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.path, fs::Permissions::from_mode(0o600))?;
        }

        Ok(&self.path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_secret_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.json");
        fs::write(
            &path,
            r#"{"anthropic": {"api_key": "sk-test", "model_name": "claude-sonnet-4-5"}}"#,
        )
        .unwrap();

        let secrets = SecretStorage::new(path).load().unwrap().unwrap();
        let anthropic = secrets.anthropic.unwrap();
        assert_eq!(anthropic.api_key, "sk-test");
        assert_eq!(anthropic.model_name.as_deref(), Some("claude-sonnet-4-5"));
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SecretStorage::new(temp_dir.path().join("secret.json"));
        assert!(storage.load().unwrap().is_none());
        assert!(storage.load_or_default().unwrap().anthropic.is_none());
    }

    #[test]
    fn test_invalid_json_is_configuration_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("secret.json");
        fs::write(&path, "not json").unwrap();
        assert!(SecretStorage::new(path).load().unwrap_err().is_configuration());
    }

    #[test]
    fn test_template_is_created_once() {
        let temp_dir = TempDir::new().unwrap();
        let storage = SecretStorage::new(temp_dir.path().join("cfg/secret.json"));
        storage.ensure_template().unwrap();
        let secrets = storage.load().unwrap().unwrap();
        assert_eq!(secrets.anthropic.unwrap().api_key, "");

        fs::write(storage.path(), r#"{"anthropic": {"api_key": "kept"}}"#).unwrap();
        storage.ensure_template().unwrap();
        assert_eq!(storage.load().unwrap().unwrap().anthropic.unwrap().api_key, "kept");
    }
}
