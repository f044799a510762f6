use crate::ports::{DnsContext, QueryProcessor, Upstream};
use async_trait::async_trait;
use ferrous_doq_domain::DomainError;
use hickory_proto::op::Message;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Forwards every query to a single upstream under a per-query timeout.
///
/// An exchange that fails because the upstream connection was closed is
/// retried once; the upstream redials on that second attempt.
pub struct ForwardQueryUseCase {
    upstream: Arc<dyn Upstream>,
    timeout: Duration,
}

impl ForwardQueryUseCase {
    pub fn new(upstream: Arc<dyn Upstream>, timeout: Duration) -> Self {
        Self { upstream, timeout }
    }

    pub async fn execute(&self, query: &Message) -> Result<Message, DomainError> {
        let start = Instant::now();
        let mut outgoing = query.clone();

        let exchange = async {
            match self.upstream.exchange(&mut outgoing).await {
                Err(e) if e.is_retryable() => {
                    debug!(
                        upstream = %self.upstream.address(),
                        error = %e,
                        "Retrying on a fresh connection"
                    );
                    self.upstream.exchange(&mut outgoing).await
                }
                other => other,
            }
        };

        let result = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| DomainError::TransportTimeout {
                server: self.upstream.address(),
            })?;

        match &result {
            Ok(response) => debug!(
                upstream = %self.upstream.address(),
                id = response.id(),
                answers = response.answers().len(),
                elapsed_ms = start.elapsed().as_millis() as u64,
                "Upstream answered"
            ),
            Err(e) if e.is_retryable() => debug!(
                upstream = %self.upstream.address(),
                error = %e,
                "Upstream connection closed"
            ),
            Err(e) => warn!(
                upstream = %self.upstream.address(),
                error = %e,
                "Upstream exchange failed"
            ),
        }

        result
    }
}

#[async_trait]
impl QueryProcessor for ForwardQueryUseCase {
    async fn process(&self, ctx: &DnsContext) -> Result<Message, DomainError> {
        self.execute(&ctx.query).await
    }
}
