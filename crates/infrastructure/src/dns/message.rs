//! DNS message helpers shared by the DoQ client and server.
//!
//! Wire encoding and decoding go through `hickory-proto`; this module adds
//! the two DoQ rules applied to messages: the forbidden EDNS TCP keepalive
//! option and the zeroed message id.

use ferrous_doq_domain::DomainError;
use hickory_proto::op::{Message, MessageType, ResponseCode};
use hickory_proto::rr::rdata::opt::EdnsCode;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};

/// Serialize a Message to wire format bytes
pub fn encode(message: &Message) -> Result<Vec<u8>, DomainError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);

    message.emit(&mut encoder).map_err(|e| {
        DomainError::InvalidDnsMessage(format!("Failed to serialize DNS message: {}", e))
    })?;

    Ok(buf)
}

pub fn decode(bytes: &[u8]) -> Result<Message, DomainError> {
    Message::from_vec(bytes)
        .map_err(|e| DomainError::InvalidDnsMessage(format!("Failed to parse DNS message: {}", e)))
}

/// True when the message carries the edns-tcp-keepalive option, which must
/// never be sent over QUIC.
pub fn has_tcp_keepalive(message: &Message) -> bool {
    message
        .extensions()
        .as_ref()
        .is_some_and(|edns| edns.options().get(EdnsCode::Keepalive).is_some())
}

/// SERVFAIL answer to `query`, echoing its id and question.
pub fn servfail(query: &Message) -> Message {
    let mut response = Message::error_msg(query.id(), query.op_code(), ResponseCode::ServFail);
    response
        .set_message_type(MessageType::Response)
        .set_recursion_desired(query.recursion_desired())
        .set_recursion_available(true);
    response.add_queries(query.queries().to_vec());
    response
}

/// Zeroes the id of a message for as long as the guard lives.
///
/// The original id is written back when the guard is dropped, on every exit
/// path of the exchange that owns it.
pub struct ZeroedId<'a> {
    message: &'a mut Message,
    original: u16,
}

impl<'a> ZeroedId<'a> {
    pub fn new(message: &'a mut Message) -> Self {
        let original = message.id();
        message.set_id(0);
        Self { message, original }
    }

    pub fn message(&self) -> &Message {
        self.message
    }

    pub fn original_id(&self) -> u16 {
        self.original
    }
}

impl Drop for ZeroedId<'_> {
    fn drop(&mut self) {
        self.message.set_id(self.original);
    }
}
