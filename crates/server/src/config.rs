//! Server configuration, read from a TOML file.
//!
//! Every field has a default, so an empty or missing file yields a working
//! server. Unknown keys are rejected to catch typos early.

use std::fs;
use std::path::Path;
use std::time::Duration;

use claims_engine::PlacementRules;
use serde::Deserialize;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    ReadConfigFile { path: String, message: String },

    #[error("failed to parse config file {path}: {message}")]
    ParseConfigFile { path: String, message: String },

    #[error("invalid config value for {field}: {message}")]
    InvalidValue { field: &'static str, message: String },
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClaimsConfig {
    /// Claims a player may own unless their metadata says otherwise.
    pub claim_limit: usize,
    /// Claim blocks a player may spend unless their metadata says otherwise.
    pub claim_block_limit: i64,
    /// Half-width of the square a new claim starts as, centred on its anchor.
    pub initial_claim_radius: i32,
    pub minimum_partition_size: i32,
    /// Blocks kept clear between partitions of different claims.
    pub claim_buffer: i32,
    /// How long a transfer offer stays open.
    pub transfer_request_secs: u64,
    /// How often pending transfer offers are checked for expiry.
    pub expiry_check_ms: u64,
    /// Half-width of the square world border, shared by every world.
    pub world_border_radius: i32,
    pub dashboard_port: u16,
}

impl Default for ClaimsConfig {
    fn default() -> Self {
        Self {
            claim_limit: 3,
            claim_block_limit: 10_000,
            initial_claim_radius: 5,
            minimum_partition_size: 5,
            claim_buffer: 0,
            transfer_request_secs: 300,
            expiry_check_ms: 1_000,
            world_border_radius: 29_999_984,
            dashboard_port: 8000,
        }
    }
}

impl ClaimsConfig {
    pub fn from_config_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|err| ConfigError::ReadConfigFile {
            path: path.display().to_string(),
            message: err.to_string(),
        })?;
        Self::from_toml(&content).map_err(|err| match err {
            ConfigError::ParseConfigFile { message, .. } => ConfigError::ParseConfigFile {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load `path` if it exists, otherwise fall back to the defaults.
    pub fn from_optional_file(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            return Self::from_config_file(path);
        }
        tracing::info!("No config at {}, using defaults", path.display());
        Ok(Self::default())
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|err| ConfigError::ParseConfigFile {
            path: "<inline>".to_string(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.minimum_partition_size < 1 {
            return Err(ConfigError::InvalidValue {
                field: "minimum_partition_size",
                message: "must be at least 1".into(),
            });
        }
        if self.initial_claim_radius * 2 < self.minimum_partition_size {
            return Err(ConfigError::InvalidValue {
                field: "initial_claim_radius",
                message: format!(
                    "a new claim would be narrower than minimum_partition_size ({})",
                    self.minimum_partition_size
                ),
            });
        }
        if self.claim_buffer < 0 {
            return Err(ConfigError::InvalidValue {
                field: "claim_buffer",
                message: "must not be negative".into(),
            });
        }
        if self.expiry_check_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "expiry_check_ms",
                message: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn placement_rules(&self) -> PlacementRules {
        PlacementRules {
            minimum_partition_size: self.minimum_partition_size,
            claim_buffer: self.claim_buffer,
        }
    }

    pub fn transfer_request_ttl(&self) -> chrono::TimeDelta {
        chrono::TimeDelta::seconds(self.transfer_request_secs.min(i64::MAX as u64) as i64)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_millis(self.expiry_check_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        assert_eq!(ClaimsConfig::from_toml("").unwrap(), ClaimsConfig::default());
    }

    #[test]
    fn partial_file_overrides_named_fields() {
        let config = ClaimsConfig::from_toml("claim_limit = 10\nclaim_buffer = 3\n").unwrap();
        assert_eq!(config.claim_limit, 10);
        assert_eq!(config.claim_buffer, 3);
        assert_eq!(config.claim_block_limit, 10_000);
        assert_eq!(config.placement_rules().claim_buffer, 3);
    }

    #[test]
    fn unknown_keys_and_bad_values_are_errors() {
        assert!(matches!(
            ClaimsConfig::from_toml("claim_limt = 1"),
            Err(ConfigError::ParseConfigFile { .. })
        ));
        assert!(matches!(
            ClaimsConfig::from_toml("minimum_partition_size = 0"),
            Err(ConfigError::InvalidValue { field: "minimum_partition_size", .. })
        ));
        assert!(matches!(
            ClaimsConfig::from_toml("initial_claim_radius = 1"),
            Err(ConfigError::InvalidValue { field: "initial_claim_radius", .. })
        ));
    }
}
