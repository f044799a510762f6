use super::bootstrap::{Bootstrapper, DialTarget};
use super::closure::is_expected_closure;
use super::{alpn_protocols, negotiated_alpn, transport_config, DOQ_NO_ERROR, HANDSHAKE_TIMEOUT};
use ferrous_doq_domain::DomainError;
use futures::future::{BoxFuture, FutureExt, Shared};
use quinn::crypto::rustls::QuicClientConfig;
use quinn::VarInt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

type DialFuture = Shared<BoxFuture<'static, Result<quinn::Connection, DomainError>>>;

enum SessionState {
    Idle,
    Dialing { generation: u64, dial: DialFuture },
    Connected(quinn::Connection),
}

/// Owner of the single QUIC connection to one upstream.
///
/// The connection is dialed lazily. Callers that find no live connection
/// while a dial is already in flight await that same dial instead of
/// starting their own. A connection found closed is discarded and the next
/// `acquire` dials a replacement.
pub struct ClientSession {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    bootstrapper: Arc<dyn Bootstrapper>,
    state: Mutex<SessionState>,
    generation: AtomicU64,
    dials: AtomicU64,
    endpoint_v4: OnceCell<quinn::Endpoint>,
    endpoint_v6: OnceCell<quinn::Endpoint>,
}

impl ClientSession {
    pub fn new(bootstrapper: Arc<dyn Bootstrapper>) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                bootstrapper,
                state: Mutex::new(SessionState::Idle),
                generation: AtomicU64::new(0),
                dials: AtomicU64::new(0),
                endpoint_v4: OnceCell::new(),
                endpoint_v6: OnceCell::new(),
            }),
        }
    }

    /// Live connection to the upstream, dialing one if needed.
    pub async fn acquire(&self) -> Result<quinn::Connection, DomainError> {
        let (generation, dial) = {
            let mut state = self.inner.lock_state();

            let stale = match &*state {
                SessionState::Connected(conn) => match conn.close_reason() {
                    None => return Ok(conn.clone()),
                    Some(reason) => Some(reason),
                },
                _ => None,
            };
            if let Some(reason) = stale {
                if is_expected_closure(&reason) {
                    debug!(reason = %reason, "QUIC connection closed, redialing");
                } else {
                    warn!(reason = %reason, "QUIC connection failed, redialing");
                }
                *state = SessionState::Idle;
            }

            match &*state {
                SessionState::Dialing { generation, dial } => (*generation, dial.clone()),
                _ => {
                    let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
                    let dial = SessionInner::dial(Arc::clone(&self.inner)).boxed().shared();
                    *state = SessionState::Dialing {
                        generation,
                        dial: dial.clone(),
                    };
                    (generation, dial)
                }
            }
        };

        let result = dial.await;

        let mut state = self.inner.lock_state();
        let current =
            matches!(&*state, SessionState::Dialing { generation: g, .. } if *g == generation);
        if current {
            *state = match &result {
                Ok(conn) => SessionState::Connected(conn.clone()),
                Err(_) => SessionState::Idle,
            };
        }
        result
    }

    /// Forgets `conn` if it is still the session's connection, so the next
    /// `acquire` dials a new one. The connection itself is left alone: other
    /// exchanges may still hold it.
    pub fn invalidate(&self, conn: &quinn::Connection) {
        let mut state = self.inner.lock_state();
        let matches_current = matches!(
            &*state,
            SessionState::Connected(current) if current.stable_id() == conn.stable_id()
        );
        if matches_current {
            *state = SessionState::Idle;
        }
    }

    pub fn close(&self) {
        let previous = std::mem::replace(&mut *self.inner.lock_state(), SessionState::Idle);
        if let SessionState::Connected(conn) = previous {
            conn.close(VarInt::from_u32(DOQ_NO_ERROR), b"");
            debug!("QUIC connection closed by client");
        }
    }

    /// Number of dials started since creation.
    pub fn dial_count(&self) -> u64 {
        self.inner.dials.load(Ordering::Relaxed)
    }
}

impl Drop for ClientSession {
    fn drop(&mut self) {
        self.close();
    }
}

impl SessionInner {
    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn dial(self: Arc<Self>) -> Result<quinn::Connection, DomainError> {
        self.dials.fetch_add(1, Ordering::Relaxed);

        let target = self.bootstrapper.resolved_target().await?;
        let endpoint = self.endpoint_for(&target.addr).await?;
        let client_config = quic_client_config(&target)?;

        let connecting = endpoint
            .connect_with(client_config, target.addr, &target.server_name)
            .map_err(|e| DomainError::Transport {
                server: target.addr.to_string(),
                reason: format!("Failed to initiate QUIC connection: {}", e),
            })?;

        let conn = tokio::time::timeout(HANDSHAKE_TIMEOUT, connecting)
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: target.addr.to_string(),
            })?
            .map_err(|e| DomainError::Transport {
                server: format!("{}({})", target.server_name, target.addr),
                reason: e.to_string(),
            })?;

        let alpn = negotiated_alpn(&conn)
            .map(|p| String::from_utf8_lossy(&p).into_owned())
            .unwrap_or_default();
        info!(
            server = %target.addr,
            server_name = %target.server_name,
            alpn = %alpn,
            "QUIC connection established"
        );
        Ok(conn)
    }

    async fn endpoint_for(&self, addr: &SocketAddr) -> Result<quinn::Endpoint, DomainError> {
        let (cell, bind_addr) = if addr.is_ipv4() {
            (&self.endpoint_v4, SocketAddr::from(([0, 0, 0, 0], 0)))
        } else {
            (&self.endpoint_v6, SocketAddr::from(([0u16; 8], 0)))
        };

        cell.get_or_try_init(|| async move {
            quinn::Endpoint::client(bind_addr).map_err(|e| {
                DomainError::IoError(format!("Failed to bind QUIC client endpoint: {}", e))
            })
        })
        .await
        .cloned()
    }
}

fn quic_client_config(target: &DialTarget) -> Result<quinn::ClientConfig, DomainError> {
    let mut tls = (*target.tls).clone();
    tls.alpn_protocols = alpn_protocols();

    let crypto = QuicClientConfig::try_from(tls)
        .map_err(|e| DomainError::Bootstrap(format!("TLS config unusable for QUIC: {}", e)))?;
    let mut config = quinn::ClientConfig::new(Arc::new(crypto));
    config.transport_config(Arc::new(transport_config()));
    Ok(config)
}
