use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    #[serde(default = "default_address")]
    pub address: String,

    /// TLS server name, when `address` names a literal IP.
    #[serde(default)]
    pub tls_hostname: Option<String>,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            tls_hostname: None,
            timeout_ms: default_timeout_ms(),
        }
    }
}

fn default_address() -> String {
    "quic://dns.adguard-dns.com:853".to_string()
}

fn default_timeout_ms() -> u64 {
    5000
}
