use super::bootstrap::{Bootstrapper, UpstreamBootstrapper};
use super::buffer_pool::{BytesPool, BytesPoolStats};
use super::closure::is_expected_closure;
use super::framing::{read_message, write_message, DoqFraming, StreamError};
use super::session::ClientSession;
use crate::dns::message::{decode, encode, has_tcp_keepalive, ZeroedId};
use async_trait::async_trait;
use ferrous_doq_application::ports::Upstream;
use ferrous_doq_domain::{DomainError, DoqEndpoint};
use hickory_proto::op::Message;
use std::sync::Arc;
use tracing::{debug, warn};

/// DNS-over-QUIC upstream.
///
/// All exchanges share the connection held by one [`ClientSession`]; each
/// exchange opens its own stream. An exchange that finds the connection
/// closed drops it and fails with [`DomainError::ConnectionClosed`], leaving
/// the retry to the caller.
pub struct DoqUpstream {
    address: String,
    session: ClientSession,
    pool: BytesPool,
}

impl DoqUpstream {
    pub fn new(endpoint: DoqEndpoint) -> Self {
        let address = endpoint.to_string();
        Self::with_bootstrapper(address, Arc::new(UpstreamBootstrapper::new(endpoint)))
    }

    /// Upstream trusting only the given roots, for private or test servers.
    pub fn with_root_store(endpoint: DoqEndpoint, root_store: rustls::RootCertStore) -> Self {
        let address = endpoint.to_string();
        let bootstrapper = UpstreamBootstrapper::with_root_store(endpoint, root_store);
        Self::with_bootstrapper(address, Arc::new(bootstrapper))
    }

    pub fn with_bootstrapper(address: impl Into<String>, bootstrapper: Arc<dyn Bootstrapper>) -> Self {
        Self {
            address: address.into(),
            session: ClientSession::new(bootstrapper),
            pool: BytesPool::for_dns_messages(),
        }
    }

    pub fn session(&self) -> &ClientSession {
        &self.session
    }

    pub fn pool_stats(&self) -> BytesPoolStats {
        self.pool.stats()
    }

    /// Closes the shared connection with code 0. The next exchange redials.
    pub fn close(&self) {
        self.session.close();
    }

    async fn round_trip(
        conn: &quinn::Connection,
        wire: &[u8],
        buf: &mut [u8],
    ) -> Result<usize, StreamError> {
        let framing = DoqFraming::for_connection(conn);
        let (mut send, mut recv) = conn.open_bi().await?;
        write_message(&mut send, framing, wire).await?;
        read_message(&mut recv, framing, buf).await
    }

    fn stream_failure(&self, conn: &quinn::Connection, err: StreamError) -> DomainError {
        if is_expected_closure(&err) {
            // A stream ending early on a live connection leaves it usable.
            if let Some(reason) = conn.close_reason() {
                debug!(server = %self.address, reason = %reason, "DoQ connection closed during exchange");
                self.session.invalidate(conn);
            } else {
                debug!(server = %self.address, reason = %err, "DoQ stream ended before a response");
            }
            return DomainError::ConnectionClosed {
                server: self.address.clone(),
                reason: err.to_string(),
            };
        }

        match err {
            StreamError::TooLarge(size) => DomainError::InvalidDnsMessage(format!(
                "DoQ response of {} bytes exceeds maximum message size",
                size
            )),
            other => {
                warn!(server = %self.address, error = %other, "DoQ exchange failed");
                DomainError::Transport {
                    server: self.address.clone(),
                    reason: other.to_string(),
                }
            }
        }
    }
}

#[async_trait]
impl Upstream for DoqUpstream {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn exchange(&self, query: &mut Message) -> Result<Message, DomainError> {
        if has_tcp_keepalive(query) {
            return Err(DomainError::ProtocolViolation(
                "EDNS0 TCP keepalive option is set".to_string(),
            ));
        }

        let zeroed = ZeroedId::new(query);
        let original_id = zeroed.original_id();
        let wire = encode(zeroed.message())?;

        let mut buf = self.pool.acquire();
        let conn = self.session.acquire().await?;

        let len = Self::round_trip(&conn, &wire, &mut buf)
            .await
            .map_err(|e| self.stream_failure(&conn, e))?;

        let mut response = decode(&buf[..len])?;
        response.set_id(original_id);
        debug!(
            server = %self.address,
            id = original_id,
            answers = response.answers().len(),
            "DoQ exchange completed"
        );
        Ok(response)
    }
}
