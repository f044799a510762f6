//! Ferrous DoQ Domain Layer
pub mod config;
pub mod dns_protocol;
pub mod errors;

pub use config::{CliOverrides, Config, ConfigError, MAX_CONCURRENT_STREAMS_LIMIT};
pub use dns_protocol::{DoqEndpoint, UpstreamAddr, DEFAULT_DOQ_PORT};
pub use errors::DomainError;
