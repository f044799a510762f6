use super::tls::{client_tls_config, webpki_root_store};
use async_trait::async_trait;
use ferrous_doq_domain::{DomainError, DoqEndpoint};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::debug;

/// Everything needed to dial a DoQ upstream.
#[derive(Clone)]
pub struct DialTarget {
    pub addr: SocketAddr,
    /// TLS server name presented in SNI and checked against the certificate.
    pub server_name: Arc<str>,
    pub tls: Arc<rustls::ClientConfig>,
}

/// Turns configured upstream coordinates into a dialable, TLS-ready target.
#[async_trait]
pub trait Bootstrapper: Send + Sync {
    async fn resolved_target(&self) -> Result<DialTarget, DomainError>;
}

/// Uses the literal address when there is one, otherwise resolves the
/// hostname once through the system resolver and keeps the first answer.
pub struct UpstreamBootstrapper {
    endpoint: DoqEndpoint,
    tls: Arc<rustls::ClientConfig>,
    resolved: OnceCell<SocketAddr>,
}

impl UpstreamBootstrapper {
    pub fn new(endpoint: DoqEndpoint) -> Self {
        Self::with_root_store(endpoint, webpki_root_store())
    }

    pub fn with_root_store(endpoint: DoqEndpoint, root_store: rustls::RootCertStore) -> Self {
        Self {
            endpoint,
            tls: client_tls_config(root_store),
            resolved: OnceCell::new(),
        }
    }

    pub fn endpoint(&self) -> &DoqEndpoint {
        &self.endpoint
    }

    async fn resolve(&self) -> Result<SocketAddr, DomainError> {
        if let Some(addr) = self.endpoint.addr.socket_addr() {
            return Ok(addr);
        }

        let (hostname, port) = self.endpoint.addr.unresolved_parts().ok_or_else(|| {
            DomainError::Bootstrap(format!("No address for {}", self.endpoint))
        })?;

        let addr = tokio::net::lookup_host((hostname, port))
            .await
            .map_err(|e| DomainError::Bootstrap(format!("Failed to resolve {}: {}", hostname, e)))?
            .next()
            .ok_or_else(|| {
                DomainError::Bootstrap(format!("No addresses found for {}", hostname))
            })?;

        debug!(hostname = %hostname, resolved = %addr, "Resolved DoQ upstream");
        Ok(addr)
    }
}

#[async_trait]
impl Bootstrapper for UpstreamBootstrapper {
    async fn resolved_target(&self) -> Result<DialTarget, DomainError> {
        let addr = *self.resolved.get_or_try_init(|| self.resolve()).await?;
        Ok(DialTarget {
            addr,
            server_name: self.endpoint.hostname.clone(),
            tls: Arc::clone(&self.tls),
        })
    }
}
