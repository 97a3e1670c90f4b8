//! Default paths for chargebot components
//!
//! Paths are user-writable by default (no root required):
//! - Socket: `$XDG_RUNTIME_DIR/chargebot/chargebot.sock` or `/tmp/chargebot-$USER/chargebot.sock`
//! - Config: `$XDG_CONFIG_HOME/chargebot/config.toml` or `~/.config/chargebot/config.toml`

use std::path::PathBuf;

/// Environment variable for overriding the socket path
pub const CHARGEBOT_SOCKET_ENV: &str = "CHARGEBOT_SOCKET";

/// Socket filename within the socket directory
const SOCKET_FILENAME: &str = "chargebot.sock";

/// Config filename within the config directory
const CONFIG_FILENAME: &str = "config.toml";

/// Application subdirectory name
const APP_DIR: &str = "chargebot";

/// Get the default socket path.
///
/// Order of precedence:
/// 1. `$CHARGEBOT_SOCKET` environment variable (if set)
/// 2. `$XDG_RUNTIME_DIR/chargebot/chargebot.sock` (if XDG_RUNTIME_DIR is set)
/// 3. `/tmp/chargebot-$USER/chargebot.sock` (fallback)
pub fn default_socket_path() -> PathBuf {
    if let Ok(path) = std::env::var(CHARGEBOT_SOCKET_ENV) {
        return PathBuf::from(path);
    }

    socket_path_without_env()
}

/// Get the socket path without checking the CHARGEBOT_SOCKET env var.
/// Used for config defaults where the env var is checked separately.
pub fn socket_path_without_env() -> PathBuf {
    if let Ok(runtime_dir) = std::env::var("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir).join(APP_DIR).join(SOCKET_FILENAME);
    }

    let username = std::env::var("USER").unwrap_or_else(|_| "unknown".to_string());
    PathBuf::from(format!("/tmp/{}-{}", APP_DIR, username)).join(SOCKET_FILENAME)
}

/// Get the default config file path.
///
/// Order of precedence:
/// 1. `$XDG_CONFIG_HOME/chargebot/config.toml`
/// 2. `~/.config/chargebot/config.toml`
/// 3. `/etc/chargebot/config.toml` (no home directory)
pub fn default_config_path() -> PathBuf {
    if let Ok(config_home) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(config_home).join(APP_DIR).join(CONFIG_FILENAME);
    }

    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILENAME);
    }

    PathBuf::from("/etc").join(APP_DIR).join(CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn socket_path_contains_chargebot() {
        let path = socket_path_without_env();
        assert!(path.to_string_lossy().contains("chargebot"));
        assert!(path.to_string_lossy().ends_with(".sock"));
    }

    #[test]
    fn config_path_is_toml() {
        let path = default_config_path();
        assert!(path.to_string_lossy().contains("chargebot"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("toml"));
    }
}
