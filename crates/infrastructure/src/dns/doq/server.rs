use super::closure::is_expected_closure;
use super::framing::DoqFraming;
use super::responder::StreamResponder;
use super::{alpn_protocols, negotiated_alpn, transport_config, DOQ_NO_ERROR};
use ferrous_doq_application::ports::QueryProcessor;
use ferrous_doq_domain::DomainError;
use quinn::crypto::rustls::QuicServerConfig;
use quinn::VarInt;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

const SHUTDOWN_REASON: &[u8] = b"server shutting down";

/// Upper bound on waiting for closed connections to flush their close frames.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// DoQ listener.
///
/// Every accepted connection is served by its own task, and every stream on
/// it by a further task. Stream tasks across all connections share one
/// semaphore: when it runs dry a connection stops accepting streams until a
/// slot frees up.
pub struct DoqServer {
    endpoint: quinn::Endpoint,
    responder: Arc<StreamResponder>,
    streams: Arc<Semaphore>,
    shutdown: CancellationToken,
}

impl DoqServer {
    /// Binds the listener. Must be called from within a tokio runtime.
    pub fn bind(
        addr: SocketAddr,
        mut tls: rustls::ServerConfig,
        processor: Arc<dyn QueryProcessor>,
        max_concurrent_streams: usize,
    ) -> Result<Self, DomainError> {
        tls.alpn_protocols = alpn_protocols();
        let crypto = QuicServerConfig::try_from(tls)
            .map_err(|e| DomainError::ConfigError(format!("TLS config unusable for QUIC: {}", e)))?;

        let stream_limit = u32::try_from(max_concurrent_streams).unwrap_or(u32::MAX);
        let mut transport = transport_config();
        transport
            .max_concurrent_bidi_streams(VarInt::from_u32(stream_limit))
            .max_concurrent_uni_streams(VarInt::from_u32(0));

        let mut server_config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
        server_config.transport_config(Arc::new(transport));

        let endpoint = quinn::Endpoint::server(server_config, addr).map_err(|e| {
            DomainError::IoError(format!("Failed to bind DoQ listener on {}: {}", addr, e))
        })?;

        Ok(Self {
            endpoint,
            responder: Arc::new(StreamResponder::new(processor)),
            streams: Arc::new(Semaphore::new(
                max_concurrent_streams.min(Semaphore::MAX_PERMITS),
            )),
            shutdown: CancellationToken::new(),
        })
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, DomainError> {
        self.endpoint
            .local_addr()
            .map_err(|e| DomainError::IoError(format!("DoQ listener has no local address: {}", e)))
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Accepts connections until cancelled or the endpoint closes.
    pub async fn run(self) -> Result<(), DomainError> {
        let local_addr = self.local_addr()?;
        info!(bind = %local_addr, protocol = "DoQ", "DoQ server listening");

        let mut sessions = JoinSet::new();
        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("DoQ server: shutting down");
                    break;
                }
                incoming = self.endpoint.accept() => {
                    let Some(incoming) = incoming else {
                        debug!("DoQ endpoint closed");
                        break;
                    };
                    sessions.spawn(serve_session(
                        incoming,
                        Arc::clone(&self.responder),
                        Arc::clone(&self.streams),
                        self.shutdown.child_token(),
                    ));
                }
                Some(joined) = sessions.join_next(), if !sessions.is_empty() => {
                    if let Err(e) = joined {
                        if e.is_panic() {
                            error!(error = %e, "DoQ session task panicked");
                        }
                    }
                }
            }
        }

        self.shutdown.cancel();
        self.endpoint
            .close(VarInt::from_u32(DOQ_NO_ERROR), SHUTDOWN_REASON);
        while sessions.join_next().await.is_some() {}
        let _ = tokio::time::timeout(DRAIN_TIMEOUT, self.endpoint.wait_idle()).await;

        info!(bind = %local_addr, "DoQ server stopped");
        Ok(())
    }
}

async fn serve_session(
    incoming: quinn::Incoming,
    responder: Arc<StreamResponder>,
    streams: Arc<Semaphore>,
    cancel: CancellationToken,
) {
    let remote = incoming.remote_address();
    let conn = match handshake(incoming).await {
        Ok(conn) => conn,
        Err(e) => {
            if is_expected_closure(&e) {
                debug!(client = %remote, reason = %e, "DoQ handshake abandoned");
            } else {
                warn!(client = %remote, error = %e, "DoQ handshake failed");
            }
            return;
        }
    };

    let framing = DoqFraming::for_connection(&conn);
    debug!(
        client = %remote,
        alpn = %negotiated_alpn(&conn).map(|p| String::from_utf8_lossy(&p).into_owned()).unwrap_or_default(),
        "DoQ session accepted"
    );

    loop {
        let (send, recv) = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = conn.accept_bi() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    if is_expected_closure(&e) {
                        debug!(client = %remote, reason = %e, "DoQ session closed");
                    } else {
                        warn!(client = %remote, error = %e, "DoQ session failed");
                    }
                    break;
                }
            },
        };

        let permit = tokio::select! {
            _ = cancel.cancelled() => break,
            permit = Arc::clone(&streams).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };

        let responder = Arc::clone(&responder);
        let conn = conn.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            let _permit = permit;
            tokio::select! {
                _ = cancel.cancelled() => {}
                _ = responder.respond(&conn, framing, send, recv) => {}
            }
        });
    }

    if cancel.is_cancelled() {
        conn.close(VarInt::from_u32(DOQ_NO_ERROR), SHUTDOWN_REASON);
    }
}

async fn handshake(incoming: quinn::Incoming) -> Result<quinn::Connection, quinn::ConnectionError> {
    incoming.accept()?.await
}
