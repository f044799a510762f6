use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    #[error("DoQ protocol violation: {0}")]
    ProtocolViolation(String),

    #[error("QUIC connection to {server} closed: {reason}")]
    ConnectionClosed { server: String, reason: String },

    #[error("QUIC transport error with {server}: {reason}")]
    Transport { server: String, reason: String },

    #[error("Transport timeout connecting to {server}")]
    TransportTimeout { server: String },

    #[error("Bootstrap failed: {0}")]
    Bootstrap(String),

    #[error("Invalid DNS message: {0}")]
    InvalidDnsMessage(String),

    #[error("Query processing failed: {0}")]
    ProcessingFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl DomainError {
    /// The connection was torn down in an orderly way; a fresh exchange
    /// will dial a new one.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DomainError::ConnectionClosed { .. })
    }
}
