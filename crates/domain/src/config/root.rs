use serde::{Deserialize, Serialize};

use super::errors::ConfigError;
use super::logging::LoggingConfig;
use super::server::{ServerConfig, MAX_CONCURRENT_STREAMS_LIMIT};
use super::upstream::UpstreamConfig;
use crate::dns_protocol::DoqEndpoint;

/// Main configuration structure for Ferrous DoQ
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    /// DoQ listener configuration (bind address, port, TLS material)
    #[serde(default)]
    pub server: ServerConfig,

    /// DoQ upstream queries are forwarded to
    #[serde(default)]
    pub upstream: UpstreamConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file or use defaults
    ///
    /// Priority order:
    /// 1. Explicitly provided path
    /// 2. ferrous-doq.toml in current directory
    /// 3. /etc/ferrous-doq/config.toml
    /// 4. Default configuration
    pub fn load(path: Option<&str>, cli_overrides: CliOverrides) -> Result<Self, ConfigError> {
        let mut config = if let Some(path) = path {
            Self::from_file(path)?
        } else if std::path::Path::new("ferrous-doq.toml").exists() {
            Self::from_file("ferrous-doq.toml")?
        } else if std::path::Path::new("/etc/ferrous-doq/config.toml").exists() {
            Self::from_file("/etc/ferrous-doq/config.toml")?
        } else {
            Self::default()
        };

        config.apply_cli_overrides(cli_overrides);
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileRead(path.to_string(), e.to_string()))?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    fn apply_cli_overrides(&mut self, overrides: CliOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(bind) = overrides.bind_address {
            self.server.bind_address = bind;
        }
        if let Some(upstream) = overrides.upstream {
            self.upstream.address = upstream;
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Parsed upstream endpoint with the configured TLS name applied.
    pub fn upstream_endpoint(&self) -> Result<DoqEndpoint, ConfigError> {
        let endpoint: DoqEndpoint = self
            .upstream
            .address
            .parse()
            .map_err(ConfigError::Validation)?;
        Ok(match &self.upstream.tls_hostname {
            Some(name) => endpoint.with_tls_hostname(name.as_str()),
            None => endpoint,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("DoQ port cannot be 0".to_string()));
        }

        if self.server.max_concurrent_streams == 0 {
            return Err(ConfigError::Validation(
                "max_concurrent_streams must be at least 1".to_string(),
            ));
        }

        if self.server.max_concurrent_streams > MAX_CONCURRENT_STREAMS_LIMIT {
            return Err(ConfigError::Validation(format!(
                "max_concurrent_streams cannot exceed {}",
                MAX_CONCURRENT_STREAMS_LIMIT
            )));
        }

        match (&self.server.cert_path, &self.server.key_path) {
            (Some(_), None) => {
                return Err(ConfigError::Validation(
                    "cert_path is set but key_path is missing".to_string(),
                ))
            }
            (None, Some(_)) => {
                return Err(ConfigError::Validation(
                    "key_path is set but cert_path is missing".to_string(),
                ))
            }
            _ => {}
        }

        if self.upstream.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "upstream timeout_ms must be positive".to_string(),
            ));
        }

        self.upstream_endpoint()?;
        Ok(())
    }
}

/// Command-line overrides for configuration
#[derive(Debug, Default)]
pub struct CliOverrides {
    pub port: Option<u16>,
    pub bind_address: Option<String>,
    pub upstream: Option<String>,
    pub log_level: Option<String>,
}
