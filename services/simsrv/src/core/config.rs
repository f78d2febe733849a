//! Service Configuration
//!
//! Layered configuration for the service binary: built-in defaults, an
//! optional config file (`yaml`/`toml`/`json`, dispatched by extension),
//! and `SIMSRV_`-prefixed environment variables, merged in that order.
//! Nested keys use `__` in the environment, e.g. `SIMSRV_CONNECTION__PORT`.

use crate::core::transport::TcpTransportConfig;
use crate::utils::error::{Result, SimSrvError};
use figment::{
    providers::{Env, Format, Json, Toml, Yaml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Simulator endpoint connection settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Simulator host
    pub host: String,
    /// Simulator port
    pub port: u16,
    /// Connect and per-receive timeout in milliseconds
    pub response_timeout_ms: u64,
    /// Receive buffer size in bytes
    pub buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 7000,
            response_timeout_ms: 5000,
            buffer_size: 512,
        }
    }
}

/// Polling cadence settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between polling passes in milliseconds
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval_ms: 100 }
    }
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter, e.g. `info` or `simsrv=debug`
    pub level: Option<String>,
    /// Directory for daily-rolling log files; stdout when unset
    pub dir: Option<PathBuf>,
}

/// Top-level service configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SimSrvConfig {
    pub connection: ConnectionConfig,
    pub polling: PollingConfig,
    /// Declaration file loaded at monitor startup
    pub declarations: Option<PathBuf>,
    pub logging: LoggingConfig,
}

impl SimSrvConfig {
    /// Load configuration, merging file and environment over defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = path {
            if !path.exists() {
                return Err(SimSrvError::ConfigError(format!(
                    "Config file not found: {}",
                    path.display()
                )));
            }

            let extension = path.extension().and_then(|s| s.to_str()).ok_or_else(|| {
                SimSrvError::ConfigError(format!(
                    "Config file has no extension: {}",
                    path.display()
                ))
            })?;

            figment = match extension {
                "json" => figment.merge(Json::file(path)),
                "toml" => figment.merge(Toml::file(path)),
                "yaml" | "yml" => figment.merge(Yaml::file(path)),
                _ => {
                    return Err(SimSrvError::ConfigError(format!(
                        "Unsupported config format: {extension}"
                    )))
                }
            };
        }

        let config: Self = figment
            .merge(Env::prefixed("SIMSRV_").split("__"))
            .extract()
            .map_err(|e| SimSrvError::ConfigError(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.connection.host.is_empty() {
            return Err(SimSrvError::ConfigError(
                "connection.host cannot be empty".to_string(),
            ));
        }
        if self.connection.port == 0 {
            return Err(SimSrvError::ConfigError(
                "connection.port cannot be zero".to_string(),
            ));
        }
        if self.connection.buffer_size == 0 {
            return Err(SimSrvError::ConfigError(
                "connection.buffer_size cannot be zero".to_string(),
            ));
        }
        if self.connection.response_timeout_ms == 0 {
            return Err(SimSrvError::ConfigError(
                "connection.response_timeout_ms cannot be zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.connection.host, self.connection.port)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.connection.response_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.polling.interval_ms)
    }

    /// Transport settings for the bundled TCP transport.
    pub fn transport_config(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            host: self.connection.host.clone(),
            port: self.connection.port,
            timeout: self.response_timeout(),
            no_delay: true,
        }
    }
}
