use ferrous_doq_application::ports::{QueryProcessor, Upstream};
use ferrous_doq_application::use_cases::ForwardQueryUseCase;
use ferrous_doq_domain::Config;
use ferrous_doq_infrastructure::dns::DoqUpstream;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub struct DoqServices {
    pub upstream: Arc<DoqUpstream>,
    pub processor: Arc<dyn QueryProcessor>,
}

impl DoqServices {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let endpoint = config.upstream_endpoint()?;
        let upstream = Arc::new(DoqUpstream::new(endpoint));
        info!(
            upstream = %upstream.address(),
            timeout_ms = config.upstream.timeout_ms,
            "Forwarding queries to DoQ upstream"
        );

        let processor: Arc<dyn QueryProcessor> = Arc::new(ForwardQueryUseCase::new(
            upstream.clone(),
            Duration::from_millis(config.upstream.timeout_ms),
        ));

        Ok(Self {
            upstream,
            processor,
        })
    }
}
