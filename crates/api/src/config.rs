//! Application Configuration
//!
//! Layers, lowest first: built-in defaults, an optional TOML file, then
//! `SYSTA_` environment variables with `__` between nested keys, e.g.
//! `SYSTA_SERVER__PORT=8081` or `SYSTA_SERVICE__LOGGER__ROOT_PATH=/data`.

use std::path::Path;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use status_service::ServiceConfig;

use crate::RateLimitConfig;

/// Config file used when neither `SYSTA_CONFIG` nor an argument names one
pub const DEFAULT_CONFIG_FILE: &str = "systa-bridge.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub log_level: String,
    pub rate_limit: RateLimitConfig,
    pub service: ServiceConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log_level: "info".to_string(),
            rate_limit: RateLimitConfig::default(),
            service: ServiceConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from `path` (if it exists) and the environment
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from(path).required(false))
            .add_source(
                Environment::with_prefix("SYSTA")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

/// `SYSTA_CONFIG`, else the first argument, else the default file name
pub fn config_path() -> String {
    std::env::var("SYSTA_CONFIG")
        .ok()
        .or_else(|| std::env::args().nth(1))
        .unwrap_or_else(|| DEFAULT_CONFIG_FILE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load(&dir.path().join("absent.toml")).unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.service.receiver.listen_addr.port(), 22460);
        assert_eq!(config.service.logger.entries_per_file, 60);
        assert!(config.service.autostart);
    }

    #[test]
    fn test_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.toml");
        std::fs::write(
            &path,
            r#"
log_level = "debug"

[server]
port = 9090

[service]
autostart = false

[service.receiver]
listen_addr = "127.0.0.1:22461"
connected_window_secs = 30

[service.logger]
root_path = "/var/log/systa"
entries_per_file = 10
"#,
        )
        .unwrap();

        let config = AppConfig::load(&path).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.host, "0.0.0.0");
        assert!(!config.service.autostart);
        assert_eq!(
            config.service.receiver.listen_addr,
            "127.0.0.1:22461".parse().unwrap()
        );
        assert_eq!(config.service.receiver.connected_window_secs, 30);
        assert_eq!(config.service.logger.entries_per_file, 10);
        assert_eq!(config.service.logger.file_prefix, "SystaREST");
    }
}
