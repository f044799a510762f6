use clap::Parser;
use ferrous_doq_domain::CliOverrides;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

mod bootstrap;
mod di;
mod server;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ferrous-doq")]
#[command(version = "0.1.0")]
#[command(about = "Ferrous DoQ - DNS-over-QUIC listener forwarding to a DoQ upstream")]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long, value_name = "FILE")]
    config: Option<String>,

    /// DoQ listener port
    #[arg(short = 'p', long)]
    port: Option<u16>,

    /// Bind address
    #[arg(short = 'b', long)]
    bind: Option<String>,

    /// Upstream DoQ server, e.g. quic://dns.adguard-dns.com
    #[arg(short = 'u', long)]
    upstream: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let cli_overrides = CliOverrides {
        port: cli.port,
        bind_address: cli.bind.clone(),
        upstream: cli.upstream.clone(),
        log_level: cli.log_level.clone(),
    };

    let config = bootstrap::load_config(cli.config.as_deref(), cli_overrides)?;

    bootstrap::init_logging(&config);

    info!("Starting Ferrous DoQ v{}", env!("CARGO_PKG_VERSION"));

    let services = di::DoqServices::new(&config)?;
    let tls = bootstrap::server_tls(&config.server)?;

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C, shutting down");
                signal_token.cancel();
            }
            Err(e) => error!(error = %e, "Failed to listen for Ctrl-C"),
        }
    });

    let result = server::start_doq_server(
        config.server.listen_addr(),
        tls,
        services.processor.clone(),
        config.server.max_concurrent_streams,
        shutdown,
    )
    .await;

    services.upstream.close();

    if let Err(e) = &result {
        error!(error = %e, "DoQ server error");
    }
    info!("Server shutdown complete");
    result
}
