use ferrous_doq_domain::config::ServerConfig;
use ferrous_doq_infrastructure::dns::doq::tls::{load_server_tls, self_signed_server_tls};
use tracing::info;

/// Listener TLS: the configured PEM pair, or a self-signed `localhost`
/// certificate when none is configured.
pub fn server_tls(server: &ServerConfig) -> anyhow::Result<rustls::ServerConfig> {
    match (&server.cert_path, &server.key_path) {
        (Some(cert), Some(key)) => Ok(load_server_tls(cert, key)?),
        _ => {
            info!("No certificate configured, generating a self-signed one");
            let (config, _) = self_signed_server_tls(vec!["localhost".to_string()])?;
            Ok(config)
        }
    }
}
