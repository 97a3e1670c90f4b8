//! Raw configuration schema (as parsed from TOML)

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Raw configuration as parsed from TOML
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RawConfig {
    /// Config schema version
    pub config_version: u32,

    /// Daemon settings
    #[serde(default)]
    pub service: RawServiceConfig,

    /// Session timings
    #[serde(default)]
    pub timing: RawTiming,
}

/// Daemon-level settings
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawServiceConfig {
    /// IPC socket path
    pub socket_path: Option<PathBuf>,

    /// Address for the HTTP status dashboard ("host:port"); unset disables it
    pub http_addr: Option<String>,

    /// Log filter used when RUST_LOG is not set
    pub log_level: Option<String>,
}

/// Session timings, all in seconds
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RawTiming {
    /// Plug-in window after winning the charger
    pub grace_period_seconds: Option<u64>,

    /// Length of the charge window
    pub charge_duration_seconds: Option<u64>,

    /// How long before expiry the holder is warned
    pub warning_lead_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
            config_version = 1

            [service]
            socket_path = "/tmp/chargebot.sock"
            http_addr = "127.0.0.1:5000"
            log_level = "debug"

            [timing]
            grace_period_seconds = 120
            charge_duration_seconds = 3600
            warning_lead_seconds = 300
        "#;

        let config: RawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.service.http_addr.as_deref(), Some("127.0.0.1:5000"));
        assert_eq!(config.timing.charge_duration_seconds, Some(3600));
    }

    #[test]
    fn sections_are_optional() {
        let config: RawConfig = toml::from_str("config_version = 1").unwrap();
        assert!(config.service.socket_path.is_none());
        assert!(config.timing.grace_period_seconds.is_none());
    }
}
