//! Client configuration.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::types::DEFAULT_PAGE_SIZE;

/// Default name under which the device root key is kept in secure storage.
pub const DEFAULT_DEVICE_KEY_NAME: &str = "device-root-key";

/// Configuration file name inside the data directory.
pub const CONFIG_FILENAME: &str = "config.json";

/// Settings shared by the key manager, the item repository and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Page size for every paginated remote endpoint.
    pub page_size: usize,
    /// Location of the SQLite item cache.
    pub database_path: PathBuf,
    /// Directory backing file-based secure key storage.
    pub key_storage_dir: PathBuf,
    /// Secure storage entry holding the device root key.
    pub device_key_name: String,
}

impl ClientConfig {
    /// Base directory for passcore data (`<data dir>/passcore`).
    pub fn default_data_dir() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("passcore")
    }

    /// Default location of the configuration file.
    pub fn default_path() -> PathBuf {
        Self::default_data_dir().join(CONFIG_FILENAME)
    }

    /// Check the configuration for values no component can work with.
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(Error::InvalidInput("page_size must be positive".to_string()));
        }
        if self.device_key_name.is_empty() {
            return Err(Error::InvalidInput(
                "device_key_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize configuration to JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize configuration from JSON. Missing fields take defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Write configuration to a file, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        let data_dir = Self::default_data_dir();
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            database_path: data_dir.join("items.sqlite"),
            key_storage_dir: data_dir.join("keys"),
            device_key_name: DEFAULT_DEVICE_KEY_NAME.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_page_size() {
        let config = ClientConfig::default();
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config = ClientConfig::from_json(r#"{"page_size": 25}"#).unwrap();
        assert_eq!(config.page_size, 25);
        assert_eq!(config.device_key_name, DEFAULT_DEVICE_KEY_NAME);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        assert!(matches!(
            ClientConfig::from_json(r#"{"page_size": 0}"#),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILENAME);
        let config = ClientConfig {
            page_size: 50,
            database_path: dir.path().join("db.sqlite"),
            key_storage_dir: dir.path().join("keys"),
            device_key_name: "k".to_string(),
        };

        config.save(&path).unwrap();
        assert_eq!(ClientConfig::load(&path).unwrap(), config);
    }
}
