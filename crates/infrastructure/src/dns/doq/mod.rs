//! DNS-over-QUIC (DoQ) client and server.
//!
//! One QUIC connection per upstream is shared by all queries; every query
//! gets its own bidirectional stream, written and then half-closed with FIN.
//! Message ids are zero on the wire.

pub mod bootstrap;
pub mod buffer_pool;
pub mod closure;
pub mod framing;
pub mod responder;
pub mod server;
pub mod session;
pub mod tls;
pub mod upstream;

use quinn::{IdleTimeout, TransportConfig, VarInt};
use std::time::Duration;

pub use bootstrap::{Bootstrapper, DialTarget, UpstreamBootstrapper};
pub use buffer_pool::{BytesPool, BytesPoolStats, PooledBuffer};
pub use closure::{is_closed_error_text, is_expected_closure};
pub use framing::{DoqFraming, StreamError};
pub use responder::StreamResponder;
pub use server::DoqServer;
pub use session::ClientSession;
pub use upstream::DoqUpstream;

/// ALPN token of the draft this implementation follows (draft-ietf-dprive-dnsoquic-02).
pub const NEXT_PROTO_DQ: &str = "doq-i02";

/// Older tokens still offered so peers built against them can connect.
/// `doq` is the RFC 9250 token.
pub const COMPAT_PROTO_DQ: [&str; 3] = ["doq-i00", "dq", "doq"];

pub const RFC9250_PROTO: &str = "doq";

pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Higher than the usual 30s: ngtcp2-based clients keep connections idle
/// for much longer and expect the server to do the same.
pub const MAX_QUIC_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Largest DNS message; size of every pooled read buffer.
pub const MAX_MESSAGE_SIZE: usize = 65535;

pub const DOQ_NO_ERROR: u32 = 0x0;
pub const DOQ_INTERNAL_ERROR: u32 = 0x1;
pub const DOQ_PROTOCOL_ERROR: u32 = 0x2;

/// ALPN list in preference order: current token first, then the compat set.
pub fn alpn_protocols() -> Vec<Vec<u8>> {
    std::iter::once(NEXT_PROTO_DQ)
        .chain(COMPAT_PROTO_DQ)
        .map(|proto| proto.as_bytes().to_vec())
        .collect()
}

pub fn transport_config() -> TransportConfig {
    let mut transport = TransportConfig::default();
    let idle_ms = MAX_QUIC_IDLE_TIMEOUT.as_millis() as u32;
    transport.max_idle_timeout(Some(IdleTimeout::from(VarInt::from_u32(idle_ms))));
    transport
}

/// ALPN token the handshake settled on, if any.
pub fn negotiated_alpn(conn: &quinn::Connection) -> Option<Vec<u8>> {
    conn.handshake_data()?
        .downcast::<quinn::crypto::rustls::HandshakeData>()
        .ok()?
        .protocol
}
