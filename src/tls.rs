//! TLS material loading
//!
//! Collaborator with a narrow interface: paths in, a ready
//! `TlsAcceptor` out. The listener wraps its sockets in the acceptor
//! whenever a private key is configured.

use crate::config::ServerConfig;
use crate::errors::{ServerError, ServerResult};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Build an acceptor from the configured chain and key. Returns `None`
/// when TLS is not enabled.
pub fn acceptor_from_config(config: &ServerConfig) -> ServerResult<Option<TlsAcceptor>> {
    let Some(key_path) = &config.private_key else {
        return Ok(None);
    };
    let chain_path = config.certificate_chain.as_deref().ok_or_else(|| {
        ServerError::tls("a certificate chain is required alongside the private key")
    })?;
    build_acceptor(chain_path, key_path, config.password.as_deref()).map(Some)
}

/// Assemble a rustls acceptor from PEM files
pub fn build_acceptor(
    chain_path: &Path,
    key_path: &Path,
    password: Option<&str>,
) -> ServerResult<TlsAcceptor> {
    let certs = load_certs(chain_path)?;
    let key = load_key(key_path, password)?;

    let mut tls_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ServerError::tls(format!("invalid certificate or key: {e}")))?;
    tls_config.alpn_protocols = vec![b"http/1.1".to_vec()];

    Ok(TlsAcceptor::from(Arc::new(tls_config)))
}

fn load_certs(path: &Path) -> ServerResult<Vec<CertificateDer<'static>>> {
    let file = File::open(path).map_err(|e| {
        ServerError::tls(format!("cannot read certificate chain {}: {e}", path.display()))
    })?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .map_err(|e| {
            ServerError::tls(format!("malformed certificate chain {}: {e}", path.display()))
        })?;
    if certs.is_empty() {
        return Err(ServerError::tls(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

fn load_key(path: &Path, password: Option<&str>) -> ServerResult<PrivateKeyDer<'static>> {
    let file = File::open(path).map_err(|e| {
        ServerError::tls(format!("cannot read private key {}: {e}", path.display()))
    })?;
    let key = rustls_pemfile::private_key(&mut BufReader::new(file)).map_err(|e| {
        ServerError::tls(format!("malformed private key {}: {e}", path.display()))
    })?;
    match key {
        Some(key) => Ok(key),
        None if password.is_some() => Err(ServerError::tls(
            "passphrase-protected private keys are not supported; provide a decrypted PKCS#8 key",
        )),
        None => Err(ServerError::tls(format!(
            "no private key found in {}",
            path.display()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn config_without_key_disables_tls() {
        let config = ServerConfig::default();
        assert!(acceptor_from_config(&config).unwrap().is_none());
    }

    #[test]
    fn key_without_chain_is_an_error() {
        let config = ServerConfig {
            private_key: Some(PathBuf::from("/tmp/key.pem")),
            ..Default::default()
        };
        assert!(matches!(
            acceptor_from_config(&config),
            Err(ServerError::Tls { .. })
        ));
    }

    #[test]
    fn missing_files_surface_as_tls_errors() {
        let result = build_acceptor(
            Path::new("/definitely/missing/chain.pem"),
            Path::new("/definitely/missing/key.pem"),
            None,
        );
        assert!(matches!(result, Err(ServerError::Tls { .. })));
    }
}
