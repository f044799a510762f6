use super::buffer_pool::BytesPool;
use super::closure::is_expected_closure;
use super::framing::{read_request, write_message, DoqFraming, StreamError};
use super::{DOQ_INTERNAL_ERROR, DOQ_PROTOCOL_ERROR};
use crate::dns::message::{decode, encode, has_tcp_keepalive, servfail};
use ferrous_doq_application::ports::{DnsContext, QueryProcessor};
use hickory_proto::op::Message;
use quinn::{RecvStream, SendStream, VarInt};
use std::sync::Arc;
use tracing::{debug, warn};

/// Answers the single query carried by one DoQ stream.
pub struct StreamResponder {
    processor: Arc<dyn QueryProcessor>,
    pool: BytesPool,
}

impl StreamResponder {
    pub fn new(processor: Arc<dyn QueryProcessor>) -> Self {
        Self {
            processor,
            pool: BytesPool::for_dns_messages(),
        }
    }

    /// Reads the query up to the client's FIN, runs it through the processor
    /// and writes the answer back, finishing the stream.
    ///
    /// A stream finished without data gets no answer. A query breaking the
    /// DoQ rules aborts the whole connection with `DOQ_PROTOCOL_ERROR`.
    pub async fn respond(
        &self,
        conn: &quinn::Connection,
        framing: DoqFraming,
        mut send: SendStream,
        mut recv: RecvStream,
    ) {
        let client_addr = conn.remote_address();
        let stream_id = send.id().index();

        let decoded = {
            let mut buf = self.pool.acquire();
            match read_request(&mut recv, framing, &mut buf).await {
                Ok(len) => decode(&buf[..len]),
                Err(StreamError::Eof) => {
                    debug!(client = %client_addr, stream_id, "Empty DoQ request, closing stream");
                    let _ = send.finish();
                    return;
                }
                Err(StreamError::TooLarge(size)) => {
                    warn!(client = %client_addr, stream_id, size, "Oversized DoQ request");
                    let _ = send.reset(VarInt::from_u32(DOQ_PROTOCOL_ERROR));
                    return;
                }
                Err(StreamError::TrailingData) => {
                    warn!(client = %client_addr, stream_id, "DoQ request followed by extra data");
                    let _ = send.reset(VarInt::from_u32(DOQ_PROTOCOL_ERROR));
                    let _ = recv.stop(VarInt::from_u32(DOQ_PROTOCOL_ERROR));
                    return;
                }
                Err(e) => {
                    if is_expected_closure(&e) {
                        debug!(client = %client_addr, stream_id, reason = %e, "DoQ stream closed before request was read");
                    } else {
                        warn!(client = %client_addr, stream_id, error = %e, "Failed to read DoQ request");
                    }
                    return;
                }
            }
        };

        let query = match decoded {
            Ok(query) => query,
            Err(e) => {
                warn!(client = %client_addr, stream_id, error = %e, "Malformed DoQ request");
                let _ = send.reset(VarInt::from_u32(DOQ_PROTOCOL_ERROR));
                return;
            }
        };

        if let Some(reason) = protocol_violation(&query) {
            warn!(client = %client_addr, stream_id, reason, "DoQ protocol violation, closing connection");
            conn.close(VarInt::from_u32(DOQ_PROTOCOL_ERROR), reason.as_bytes());
            return;
        }

        let ctx = DnsContext::new(query, client_addr, "QUIC").with_stream_id(stream_id);
        let mut response = match self.processor.process(&ctx).await {
            Ok(response) => response,
            Err(e) => {
                warn!(client = %client_addr, stream_id, error = %e, "Query processing failed, answering SERVFAIL");
                servfail(&ctx.query)
            }
        };
        response.set_id(0);

        let wire = match encode(&response) {
            Ok(wire) => wire,
            Err(e) => {
                warn!(client = %client_addr, stream_id, error = %e, "Failed to encode DoQ response");
                let _ = send.reset(VarInt::from_u32(DOQ_INTERNAL_ERROR));
                return;
            }
        };

        if let Err(e) = write_message(&mut send, framing, &wire).await {
            if is_expected_closure(&e) {
                debug!(client = %client_addr, stream_id, reason = %e, "DoQ stream closed before response was written");
            } else {
                warn!(client = %client_addr, stream_id, error = %e, "Failed to write DoQ response");
            }
        }
    }
}

fn protocol_violation(query: &Message) -> Option<&'static str> {
    if has_tcp_keepalive(query) {
        return Some("EDNS0 TCP keepalive option is set");
    }
    if query.id() != 0 {
        return Some("DNS message id must be zero");
    }
    None
}
