//! Server configuration.

use std::path::PathBuf;

use chairside_core::EngineConfig;
use config::{Config, ConfigError};
use serde::{Deserialize, Serialize};

/// Optional config file, looked up relative to the working directory.
const CONFIG_FILE: &str = "chairside.toml";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    #[serde(default)]
    pub engine: EngineConfig,
}

fn default_bind_addr() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_database_path() -> PathBuf {
    PathBuf::from("chairside.db")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            database_path: default_database_path(),
            engine: EngineConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load from `chairside.toml` (if present) overlaid with `CHAIRSIDE__*`
    /// environment variables, e.g. `CHAIRSIDE__ENGINE__SLOT_MINUTES=20`.
    pub fn load() -> Result<Self, ConfigError> {
        let settings = Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(
                config::Environment::with_prefix("CHAIRSIDE")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;
        let config: Self = settings.try_deserialize()?;
        if config.bind_addr.trim().is_empty() {
            return Err(ConfigError::Message("bind_addr is required".to_string()));
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_source() {
        let config: ServerConfig = Config::builder()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.database_path, PathBuf::from("chairside.db"));
        assert_eq!(config.engine.slot_minutes, 15);
    }

    #[test]
    fn test_toml_overrides_engine_section() {
        let config: ServerConfig = Config::builder()
            .add_source(config::File::from_str(
                r#"
                bind_addr = "0.0.0.0:9000"

                [engine]
                slot_minutes = 20

                [engine.retry]
                max_attempts = 6
                base_delay_ms = 10
                max_delay_ms = 200
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:9000");
        assert_eq!(config.engine.slot_minutes, 20);
        assert_eq!(config.engine.retry.max_attempts, 6);
        assert_eq!(config.engine.busy_timeout_ms, 5_000);
    }
}
