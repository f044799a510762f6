use ferrous_doq_application::ports::QueryProcessor;
use ferrous_doq_infrastructure::dns::DoqServer;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub async fn start_doq_server(
    bind_addr: String,
    tls: rustls::ServerConfig,
    processor: Arc<dyn QueryProcessor>,
    max_concurrent_streams: usize,
    shutdown: CancellationToken,
) -> anyhow::Result<()> {
    let socket_addr: SocketAddr = bind_addr.parse()?;

    let server = DoqServer::bind(socket_addr, tls, processor, max_concurrent_streams)?
        .with_cancellation(shutdown);

    info!(
        bind_address = %socket_addr,
        max_concurrent_streams,
        "DoQ server ready"
    );

    server.run().await?;
    Ok(())
}
