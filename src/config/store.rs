//! Identifier store selection

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

use super::database::DatabaseConfig;
use super::error::ValidationError;
use super::redis::RedisConfig;

/// Backing store for session identifiers
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    #[default]
    File,
    Postgres,
    Redis,
}

/// Store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend
    #[serde(default = "default_file_path")]
    pub file_path: PathBuf,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub redis: RedisConfig,

    /// Seconds between expired-session purges
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

impl StoreConfig {
    pub fn purge_interval(&self) -> Duration {
        Duration::from_secs(self.purge_interval_secs)
    }

    /// Validate the section for the selected backend only
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self.backend {
            StoreBackend::Memory => {}
            StoreBackend::File => {
                if self.file_path.as_os_str().is_empty() {
                    return Err(ValidationError::MissingRequired("STORE__FILE_PATH"));
                }
            }
            StoreBackend::Postgres => self.database.validate()?,
            StoreBackend::Redis => self.redis.validate()?,
        }
        if self.purge_interval_secs == 0 {
            return Err(ValidationError::InvalidPurgeInterval);
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            file_path: default_file_path(),
            database: DatabaseConfig::default(),
            redis: RedisConfig::default(),
            purge_interval_secs: default_purge_interval(),
        }
    }
}

fn default_file_path() -> PathBuf {
    PathBuf::from("session.cache")
}

fn default_purge_interval() -> u64 {
    300
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.backend, StoreBackend::File);
        assert_eq!(config.file_path, PathBuf::from("session.cache"));
        assert_eq!(config.purge_interval(), Duration::from_secs(300));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_only_selected_backend_is_validated() {
        let config = StoreConfig {
            backend: StoreBackend::Memory,
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = StoreConfig {
            backend: StoreBackend::Postgres,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::MissingRequired(_))
        ));
    }

    #[test]
    fn test_zero_purge_interval_is_rejected() {
        let config = StoreConfig {
            purge_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ValidationError::InvalidPurgeInterval)
        ));
    }
}
