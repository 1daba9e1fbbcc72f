//! Configuration module.
//!
//! Provides YAML-based configuration loading and validation for:
//! - Server settings (bind address, port)
//! - Database settings (path, read pool size)
//! - Pipeline settings (buffer capacity, batch size, worker counts)

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

// =============================================================================
// Constants
// =============================================================================

/// Default ingestion buffer capacity.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1_000;

/// Default events per persistence batch.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default producer pool size.
pub const DEFAULT_PRODUCERS: usize = 2;

/// Default consumer pool size.
pub const DEFAULT_CONSUMERS: usize = 2;

/// Default pause between produced events (per producer).
pub const DEFAULT_PRODUCE_INTERVAL: Duration = Duration::from_millis(100);

/// Default read pool size.
pub const DEFAULT_POOL_SIZE: u32 = 4;

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to parse YAML configuration.
    #[error("failed to parse YAML config: {0}")]
    Parse(#[from] serde_yaml::Error),

    /// Configuration validation failed.
    #[error("config validation error: {0}")]
    Validation(String),
}

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Web server configuration.
    pub server: ServerConfig,

    /// Database configuration.
    pub database: DatabaseConfig,

    /// Ingestion pipeline configuration.
    pub pipeline: PipelineConfig,
}

/// Web server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Server bind address (default: "0.0.0.0").
    pub bind: String,

    /// Server port (default: 8080).
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file path.
    pub path: String,

    /// Connection pool size for read operations (default: 4).
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "collider.db".to_string(),
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

/// Ingestion pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Bounded buffer capacity between producers and consumers.
    pub buffer_capacity: usize,

    /// Events drained and persisted per batch. Clamped to the buffer
    /// capacity at pipeline start.
    pub batch_size: usize,

    /// Producer pool size.
    pub producers: usize,

    /// Consumer pool size.
    pub consumers: usize,

    /// Pause between produced events, per producer (default: 100ms).
    #[serde(with = "humantime_serde")]
    pub produce_interval: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            producers: DEFAULT_PRODUCERS,
            consumers: DEFAULT_CONSUMERS,
            produce_interval: DEFAULT_PRODUCE_INTERVAL,
        }
    }
}

impl AppConfig {
    /// Load configuration from a YAML file.
    ///
    /// A missing file yields the built-in defaults so the binary can
    /// run without any configuration on disk.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }

        let raw = std::fs::read_to_string(path)?;
        let config: AppConfig = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pipeline.buffer_capacity == 0 {
            return Err(ConfigError::Validation(
                "pipeline.buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.pipeline.batch_size == 0 {
            return Err(ConfigError::Validation(
                "pipeline.batch_size must be at least 1".to_string(),
            ));
        }
        if self.pipeline.consumers == 0 {
            return Err(ConfigError::Validation(
                "pipeline.consumers must be at least 1".to_string(),
            ));
        }
        if self.pipeline.batch_size > self.pipeline.buffer_capacity {
            return Err(ConfigError::Validation(format!(
                "pipeline.batch_size ({}) must not exceed buffer_capacity ({})",
                self.pipeline.batch_size, self.pipeline.buffer_capacity
            )));
        }
        if self.database.pool_size == 0 {
            return Err(ConfigError::Validation(
                "database.pool_size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.pipeline.buffer_capacity, DEFAULT_BUFFER_CAPACITY);
        assert_eq!(config.pipeline.produce_interval, DEFAULT_PRODUCE_INTERVAL);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let config = AppConfig::load("/nonexistent/collider.yaml").unwrap();
        assert_eq!(config.database.path, "collider.db");
    }

    #[test]
    fn test_parse_full_yaml() {
        let yaml = r#"
server:
  bind: "127.0.0.1"
  port: 9090
database:
  path: "/var/lib/collider/events.db"
  pool_size: 8
pipeline:
  buffer_capacity: 500
  batch_size: 25
  producers: 4
  consumers: 3
  produce_interval: "50ms"
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        config.validate().unwrap();

        assert_eq!(config.server.bind, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.pool_size, 8);
        assert_eq!(config.pipeline.buffer_capacity, 500);
        assert_eq!(config.pipeline.batch_size, 25);
        assert_eq!(config.pipeline.producers, 4);
        assert_eq!(config.pipeline.consumers, 3);
        assert_eq!(config.pipeline.produce_interval, Duration::from_millis(50));
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = r#"
pipeline:
  producers: 8
"#;
        let config: AppConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.pipeline.producers, 8);
        assert_eq!(config.pipeline.consumers, DEFAULT_CONSUMERS);
        assert_eq!(config.server.port, 8080);
    }

    #[test]
    fn test_validation_rejects_zero_capacity() {
        let mut config = AppConfig::default();
        config.pipeline.buffer_capacity = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn test_validation_rejects_batch_above_capacity() {
        let mut config = AppConfig::default();
        config.pipeline.buffer_capacity = 10;
        config.pipeline.batch_size = 20;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("batch_size"));
    }

    #[test]
    fn test_validation_rejects_zero_consumers() {
        let mut config = AppConfig::default();
        config.pipeline.consumers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_tempfile() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "server:\n  port: 3000\n").unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.server.port, 3000);
    }
}
