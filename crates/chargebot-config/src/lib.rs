//! Configuration parsing and validation for chargebot
//!
//! Supports TOML configuration with:
//! - Versioned schema
//! - Service settings (socket, dashboard address, log filter)
//! - Session timings (grace period, charge duration, warning lead)
//! - Validation that reports every problem at once

mod policy;
mod schema;
mod validation;

pub use policy::*;
pub use schema::*;
pub use validation::*;

use std::path::Path;
use thiserror::Error;
use tracing::info;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation failed: {errors:?}")]
    ValidationFailed { errors: Vec<ValidationError> },

    #[error("Unsupported config version: {0}")]
    UnsupportedVersion(u32),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Current supported config version
pub const CURRENT_CONFIG_VERSION: u32 = 1;

/// Default plug-in window: 5 minutes
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 5 * 60;

/// Default charge window: 90 minutes
pub const DEFAULT_CHARGE_DURATION_SECS: u64 = 90 * 60;

/// Default warning lead: 10 minutes
pub const DEFAULT_WARNING_LEAD_SECS: u64 = 10 * 60;

/// Longest accepted value for any timing setting: one day
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Load and validate configuration from a TOML file
pub fn load_config(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Load configuration, falling back to defaults when the file does not exist
pub fn load_config_or_default(path: impl AsRef<Path>) -> ConfigResult<Policy> {
    let path = path.as_ref();
    if !path.exists() {
        info!(config_path = %path.display(), "No config file, using defaults");
        return Ok(Policy::default());
    }
    load_config(path)
}

/// Parse and validate configuration from a TOML string
pub fn parse_config(content: &str) -> ConfigResult<Policy> {
    let raw: RawConfig = toml::from_str(content)?;

    if raw.config_version != CURRENT_CONFIG_VERSION {
        return Err(ConfigError::UnsupportedVersion(raw.config_version));
    }

    let errors = validate_config(&raw);
    if !errors.is_empty() {
        return Err(ConfigError::ValidationFailed { errors });
    }

    Policy::from_raw(raw).map_err(|errors| ConfigError::ValidationFailed { errors })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn parse_minimal_config() {
        let policy = parse_config("config_version = 1").unwrap();
        assert_eq!(policy.timing, Timing::default());
        assert!(policy.service.http_addr.is_none());
        assert_eq!(policy.service.log_level, "info");
    }

    #[test]
    fn parse_custom_timing() {
        let config = r#"
            config_version = 1

            [service]
            http_addr = "0.0.0.0:5000"

            [timing]
            grace_period_seconds = 60
            charge_duration_seconds = 1800
            warning_lead_seconds = 300
        "#;

        let policy = parse_config(config).unwrap();
        assert_eq!(policy.timing.grace_period(), Duration::from_secs(60));
        assert_eq!(policy.timing.warning_after(), Duration::from_secs(1500));
        assert_eq!(policy.service.http_addr.map(|a| a.port()), Some(5000));
    }

    #[test]
    fn reject_wrong_version() {
        let result = parse_config("config_version = 99");
        assert!(matches!(result, Err(ConfigError::UnsupportedVersion(99))));
    }

    #[test]
    fn reject_invalid_timing() {
        let config = r#"
            config_version = 1

            [timing]
            charge_duration_seconds = 300
            warning_lead_seconds = 600
        "#;

        let result = parse_config(config);
        assert!(matches!(result, Err(ConfigError::ValidationFailed { .. })));
    }

    #[test]
    fn reject_durations_past_instant_range() {
        let config = r#"
            config_version = 1

            [timing]
            grace_period_seconds = 9223372036854775807
        "#;

        match parse_config(config) {
            Err(ConfigError::ValidationFailed { errors }) => assert!(errors
                .iter()
                .any(|e| matches!(e, ValidationError::DurationTooLong { .. }))),
            other => panic!("expected validation failure, got {:?}", other),
        }
    }

    #[test]
    fn load_from_file_and_fallback() {
        let dir = tempfile::tempdir().unwrap();

        let missing = dir.path().join("missing.toml");
        assert!(load_config(&missing).is_err());
        assert_eq!(load_config_or_default(&missing).unwrap().timing, Timing::default());

        let path = dir.path().join("config.toml");
        std::fs::write(&path, "config_version = 1\n[timing]\ngrace_period_seconds = 30\n").unwrap();
        let policy = load_config(&path).unwrap();
        assert_eq!(policy.timing.grace_period(), Duration::from_secs(30));
    }
}
