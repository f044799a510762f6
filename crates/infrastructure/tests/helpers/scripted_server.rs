#![allow(dead_code)]
use super::builders::{make_response, root_store_for, ANSWER_IP};
use super::doq_server_mock::CountingBootstrapper;
use ferrous_doq_infrastructure::dns::doq::alpn_protocols;
use ferrous_doq_infrastructure::dns::doq::tls::self_signed_server_tls;
use ferrous_doq_infrastructure::dns::DoqUpstream;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::BinEncodable;
use quinn::crypto::rustls::QuicServerConfig;
use quinn::VarInt;
use rustls::pki_types::CertificateDer;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How long `slow.*` queries wait before being answered.
pub const SLOW_REPLY: Duration = Duration::from_millis(300);

/// Draft-framed upstream whose behaviour is picked by the query name:
///
/// - `eof.*` finishes the stream without writing anything.
/// - `slow.*` answers after [`SLOW_REPLY`].
/// - `close.*` closes the whole connection with code 0, the first time only.
/// - anything else is answered right away.
pub struct ScriptedDoqServer {
    pub addr: SocketAddr,
    pub cert: CertificateDer<'static>,
    endpoint: quinn::Endpoint,
    handle: JoinHandle<()>,
}

impl ScriptedDoqServer {
    pub fn start() -> Self {
        let (mut tls, cert) = self_signed_server_tls(vec!["localhost".to_string()]).unwrap();
        tls.alpn_protocols = alpn_protocols();
        let crypto = QuicServerConfig::try_from(tls).unwrap();
        let config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
        let endpoint = quinn::Endpoint::server(config, "127.0.0.1:0".parse().unwrap()).unwrap();
        let addr = endpoint.local_addr().unwrap();

        let closed_once = Arc::new(AtomicBool::new(false));
        let accept = endpoint.clone();
        let handle = tokio::spawn(async move {
            while let Some(incoming) = accept.accept().await {
                let closed_once = Arc::clone(&closed_once);
                tokio::spawn(async move {
                    let Ok(conn) = incoming.await else { return };
                    while let Ok((send, recv)) = conn.accept_bi().await {
                        tokio::spawn(answer(
                            conn.clone(),
                            send,
                            recv,
                            Arc::clone(&closed_once),
                        ));
                    }
                });
            }
        });

        Self {
            addr,
            cert,
            endpoint,
            handle,
        }
    }

    pub fn upstream(&self) -> (DoqUpstream, Arc<CountingBootstrapper>) {
        let bootstrapper = Arc::new(CountingBootstrapper::new(
            self.addr,
            root_store_for(&self.cert),
        ));
        let upstream = DoqUpstream::with_bootstrapper(
            format!("quic://localhost:{}", self.addr.port()),
            bootstrapper.clone(),
        );
        (upstream, bootstrapper)
    }
}

impl Drop for ScriptedDoqServer {
    fn drop(&mut self) {
        self.endpoint.close(VarInt::from_u32(0), b"");
        self.handle.abort();
    }
}

async fn answer(
    conn: quinn::Connection,
    mut send: quinn::SendStream,
    mut recv: quinn::RecvStream,
    closed_once: Arc<AtomicBool>,
) {
    let Ok(bytes) = recv.read_to_end(64 * 1024).await else { return };
    let Ok(query) = Message::from_vec(&bytes) else { return };
    let name = query
        .queries()
        .first()
        .map(|q| q.name().to_ascii())
        .unwrap_or_default();

    if name.starts_with("eof.") {
        let _ = send.finish();
        return;
    }
    if name.starts_with("close.") && !closed_once.swap(true, Ordering::SeqCst) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        conn.close(VarInt::from_u32(0), b"server closed");
        return;
    }
    if name.starts_with("slow.") {
        tokio::time::sleep(SLOW_REPLY).await;
    }

    let response = make_response(&query, ANSWER_IP).to_bytes().unwrap();
    let _ = send.write_all(&response).await;
    let _ = send.finish();
}
