use serde::{Deserialize, Serialize};

use crate::dns_protocol::DEFAULT_DOQ_PORT;

/// Largest accepted `max_concurrent_streams`.
pub const MAX_CONCURRENT_STREAMS_LIMIT: usize = 1 << 20;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// PEM certificate chain. A self-signed certificate is generated when unset.
    #[serde(default)]
    pub cert_path: Option<String>,

    #[serde(default)]
    pub key_path: Option<String>,

    /// Upper bound on stream handlers running at once, across all sessions.
    #[serde(default = "default_max_concurrent_streams")]
    pub max_concurrent_streams: usize,
}

impl ServerConfig {
    pub fn listen_addr(&self) -> String {
        if self.bind_address.contains(':') {
            format!("[{}]:{}", self.bind_address, self.port)
        } else {
            format!("{}:{}", self.bind_address, self.port)
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            port: default_port(),
            cert_path: None,
            key_path: None,
            max_concurrent_streams: default_max_concurrent_streams(),
        }
    }
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    DEFAULT_DOQ_PORT
}

fn default_max_concurrent_streams() -> usize {
    1024
}
