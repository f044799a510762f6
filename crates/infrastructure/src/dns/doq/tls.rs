//! TLS material for DoQ.
//!
//! The client side trusts the webpki roots unless a root store is supplied.
//! The server side loads a PEM certificate chain and key, or generates a
//! self-signed certificate when none is configured.

use ferrous_doq_domain::DomainError;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;
use tracing::{info, warn};

pub fn ensure_crypto_provider() {
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
}

pub fn webpki_root_store() -> rustls::RootCertStore {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    root_store
}

/// Client TLS config without ALPN; the session installs the DoQ tokens.
pub fn client_tls_config(root_store: rustls::RootCertStore) -> Arc<rustls::ClientConfig> {
    ensure_crypto_provider();
    let mut tls_config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();
    tls_config.resumption = rustls::client::Resumption::in_memory_sessions(64);
    Arc::new(tls_config)
}

pub fn load_server_tls(cert_path: &str, key_path: &str) -> Result<rustls::ServerConfig, DomainError> {
    let certs = load_certs(cert_path)?;
    let key = load_private_key(key_path)?;
    info!(cert = %cert_path, chain_len = certs.len(), "Loaded DoQ server certificate");
    build_server_tls(certs, key)
}

/// Server TLS config with a freshly generated certificate for `names`.
///
/// Returns the certificate too so clients can pin it.
pub fn self_signed_server_tls(
    names: Vec<String>,
) -> Result<(rustls::ServerConfig, CertificateDer<'static>), DomainError> {
    let certified = rcgen::generate_simple_self_signed(names.clone()).map_err(|e| {
        DomainError::ConfigError(format!("Failed to generate self-signed certificate: {}", e))
    })?;
    let cert = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(
        certified.key_pair.serialize_der(),
    ));

    warn!(names = ?names, "Using a self-signed certificate for the DoQ listener");
    let config = build_server_tls(vec![cert.clone()], key)?;
    Ok((config, cert))
}

fn build_server_tls(
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<rustls::ServerConfig, DomainError> {
    ensure_crypto_provider();
    rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| DomainError::ConfigError(format!("Invalid certificate or key: {}", e)))
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, DomainError> {
    let file = File::open(path)
        .map_err(|e| DomainError::ConfigError(format!("Cannot open certificate {}: {}", path, e)))?;
    let certs = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| DomainError::ConfigError(format!("Cannot parse certificate {}: {}", path, e)))?;

    if certs.is_empty() {
        return Err(DomainError::ConfigError(format!(
            "No certificates found in {}",
            path
        )));
    }
    Ok(certs)
}

fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>, DomainError> {
    let file = File::open(path)
        .map_err(|e| DomainError::ConfigError(format!("Cannot open key {}: {}", path, e)))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .map_err(|e| DomainError::ConfigError(format!("Cannot parse key {}: {}", path, e)))?
        .ok_or_else(|| DomainError::ConfigError(format!("No private key found in {}", path)))
}
