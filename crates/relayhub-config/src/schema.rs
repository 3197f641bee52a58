//! Configuration schema definitions.

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Relay server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server identity, reported in logs and by the health endpoint.
    #[serde(default = "default_server_id")]
    pub id: String,

    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Rolling idle-read deadline.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Per-write deadline.
    #[serde(default = "default_write_timeout")]
    pub write_timeout_secs: u64,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            id: default_server_id(),
            host: default_host(),
            port: default_port(),
            read_timeout_secs: default_read_timeout(),
            write_timeout_secs: default_write_timeout(),
        }
    }
}

fn default_server_id() -> String {
    "demo".to_string()
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8088
}

fn default_read_timeout() -> u64 {
    120
}

fn default_write_timeout() -> u64 {
    10
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_level")]
    pub level: String,

    /// Directory for rolling log files.
    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,

    #[serde(default = "default_file_suffix")]
    pub file_suffix: String,

    /// Number of daily files to keep.
    #[serde(default = "default_max_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            dir: default_log_dir(),
            file_prefix: default_file_prefix(),
            file_suffix: default_file_suffix(),
            max_files: default_max_files(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "runtime/logs".to_string()
}

fn default_file_prefix() -> String {
    "relayhub".to_string()
}

fn default_file_suffix() -> String {
    "log".to_string()
}

fn default_max_files() -> usize {
    30
}
