use async_trait::async_trait;
use ferrous_doq_domain::DomainError;
use hickory_proto::op::Message;

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Human-readable address, e.g. `quic://dns.adguard-dns.com:853`.
    fn address(&self) -> String;

    /// Sends `query` and returns the parsed reply.
    ///
    /// Implementations may rewrite header fields of `query` while the exchange
    /// is in flight but must leave it as they found it when they return, and
    /// the reply must carry the query's id.
    async fn exchange(&self, query: &mut Message) -> Result<Message, DomainError>;
}
