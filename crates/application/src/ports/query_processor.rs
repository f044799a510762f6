use async_trait::async_trait;
use ferrous_doq_domain::DomainError;
use hickory_proto::op::Message;
use std::net::SocketAddr;

/// A query received by a listener, with the facts about where it came from.
#[derive(Debug, Clone)]
pub struct DnsContext {
    pub query: Message,
    pub client_addr: SocketAddr,
    pub protocol: &'static str,
    /// QUIC stream id the query arrived on, when the transport has one.
    pub stream_id: Option<u64>,
}

impl DnsContext {
    pub fn new(query: Message, client_addr: SocketAddr, protocol: &'static str) -> Self {
        Self {
            query,
            client_addr,
            protocol,
            stream_id: None,
        }
    }

    pub fn with_stream_id(mut self, stream_id: u64) -> Self {
        self.stream_id = Some(stream_id);
        self
    }
}

/// The resolution pipeline a listener hands decoded queries to.
#[async_trait]
pub trait QueryProcessor: Send + Sync {
    async fn process(&self, ctx: &DnsContext) -> Result<Message, DomainError>;
}
