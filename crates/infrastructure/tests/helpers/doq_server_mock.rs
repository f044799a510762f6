#![allow(dead_code)]
use super::builders::{make_response, root_store_for, ANSWER_IP};
use async_trait::async_trait;
use ferrous_doq_application::ports::{DnsContext, QueryProcessor};
use ferrous_doq_domain::DomainError;
use ferrous_doq_infrastructure::dns::doq::tls::{client_tls_config, self_signed_server_tls};
use ferrous_doq_infrastructure::dns::doq::{Bootstrapper, DialTarget};
use ferrous_doq_infrastructure::dns::{DoqServer, DoqUpstream};
use hickory_proto::op::Message;
use quinn::crypto::rustls::QuicClientConfig;
use rustls::pki_types::CertificateDer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone)]
pub struct SeenQuery {
    pub id: u16,
    pub domain: String,
    pub stream_id: Option<u64>,
    pub client_addr: SocketAddr,
}

/// Query processor that answers every A query with [`ANSWER_IP`] and keeps
/// a record of what it was asked.
pub struct RecordingProcessor {
    seen: Mutex<Vec<SeenQuery>>,
    delay: Option<Duration>,
    fail: bool,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self {
            seen: Mutex::new(Vec::new()),
            delay: None,
            fail: false,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn seen(&self) -> Vec<SeenQuery> {
        self.seen.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QueryProcessor for RecordingProcessor {
    async fn process(&self, ctx: &DnsContext) -> Result<Message, DomainError> {
        let domain = ctx
            .query
            .queries()
            .first()
            .map(|q| q.name().to_ascii())
            .unwrap_or_default();
        self.seen.lock().unwrap().push(SeenQuery {
            id: ctx.query.id(),
            domain,
            stream_id: ctx.stream_id,
            client_addr: ctx.client_addr,
        });

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if self.fail {
            return Err(DomainError::ProcessingFailed("pipeline failure".to_string()));
        }
        Ok(make_response(&ctx.query, ANSWER_IP))
    }
}

/// Bootstrapper with a fixed target that counts how often it is asked.
pub struct CountingBootstrapper {
    target: DialTarget,
    calls: AtomicUsize,
    fail: bool,
}

impl CountingBootstrapper {
    pub fn new(addr: SocketAddr, root_store: rustls::RootCertStore) -> Self {
        Self {
            target: DialTarget {
                addr,
                server_name: Arc::from("localhost"),
                tls: client_tls_config(root_store),
            },
            calls: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new(
                "127.0.0.1:9".parse().unwrap(),
                rustls::RootCertStore::empty(),
            )
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Bootstrapper for CountingBootstrapper {
    async fn resolved_target(&self) -> Result<DialTarget, DomainError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(DomainError::Bootstrap(
                "resolution failed for localhost".to_string(),
            ));
        }
        Ok(self.target.clone())
    }
}

/// Loopback DoQ listener with a self-signed certificate for `localhost`.
pub struct TestDoqServer {
    pub addr: SocketAddr,
    pub cert: CertificateDer<'static>,
    pub processor: Arc<RecordingProcessor>,
    token: CancellationToken,
    handle: JoinHandle<Result<(), DomainError>>,
}

impl TestDoqServer {
    pub fn start(processor: RecordingProcessor) -> Self {
        Self::with_budget(processor, 256)
    }

    pub fn with_budget(processor: RecordingProcessor, max_concurrent_streams: usize) -> Self {
        let processor = Arc::new(processor);
        let (tls, cert) = self_signed_server_tls(vec!["localhost".to_string()]).unwrap();
        let server = DoqServer::bind(
            "127.0.0.1:0".parse().unwrap(),
            tls,
            processor.clone(),
            max_concurrent_streams,
        )
        .unwrap();

        let addr = server.local_addr().unwrap();
        let token = server.shutdown_token();
        let handle = tokio::spawn(server.run());

        Self {
            addr,
            cert,
            processor,
            token,
            handle,
        }
    }

    pub fn bootstrapper(&self) -> Arc<CountingBootstrapper> {
        Arc::new(CountingBootstrapper::new(
            self.addr,
            root_store_for(&self.cert),
        ))
    }

    pub fn upstream(&self) -> (DoqUpstream, Arc<CountingBootstrapper>) {
        let bootstrapper = self.bootstrapper();
        let upstream = DoqUpstream::with_bootstrapper(
            format!("quic://localhost:{}", self.addr.port()),
            bootstrapper.clone(),
        );
        (upstream, bootstrapper)
    }

    pub async fn connect_raw(&self, alpn: &[&str]) -> Result<RawClient, quinn::ConnectionError> {
        RawClient::connect(self.addr, &self.cert, alpn).await
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub async fn stop(self) -> Result<(), DomainError> {
        self.token.cancel();
        tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("server did not stop")
            .unwrap()
    }
}

/// Bare quinn client offering a chosen ALPN list.
pub struct RawClient {
    pub endpoint: quinn::Endpoint,
    pub conn: quinn::Connection,
}

impl RawClient {
    pub async fn connect(
        addr: SocketAddr,
        cert: &CertificateDer<'static>,
        alpn: &[&str],
    ) -> Result<Self, quinn::ConnectionError> {
        let mut tls = (*client_tls_config(root_store_for(cert))).clone();
        tls.alpn_protocols = alpn.iter().map(|p| p.as_bytes().to_vec()).collect();
        let crypto = QuicClientConfig::try_from(tls).unwrap();

        let mut endpoint = quinn::Endpoint::client("127.0.0.1:0".parse().unwrap()).unwrap();
        endpoint.set_default_client_config(quinn::ClientConfig::new(Arc::new(crypto)));
        let conn = endpoint.connect(addr, "localhost").unwrap().await?;
        Ok(Self { endpoint, conn })
    }

    /// Sends `bytes` as-is on a new stream, finishes it and reads the reply
    /// up to the server's FIN.
    pub async fn exchange_raw(&self, bytes: &[u8]) -> Vec<u8> {
        let (mut send, mut recv) = self.conn.open_bi().await.unwrap();
        send.write_all(bytes).await.unwrap();
        send.finish().unwrap();
        recv.read_to_end(64 * 1024).await.unwrap()
    }
}
