//! TLS setup
//!
//! Builds rustls configurations from PEM files and drives the client
//! handshake. Both sides authenticate: the client presents its
//! certificate and verifies the daemon against the CA bundle and the
//! expected peer name.

use std::net::TcpStream;
use std::path::Path;
use std::sync::Arc;

use rustls::crypto::CryptoProvider;
use rustls::pki_types::pem::PemObject;
use rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use rustls::{ClientConnection, RootCertStore, StreamOwned};

use crate::config::TlsOptions;
use crate::error::{ClientError, Result};

/// A TLS client stream over TCP
pub type TlsStream = StreamOwned<ClientConnection, TcpStream>;

/// The crypto provider used for every TLS config in this crate
pub(crate) fn crypto_provider() -> Arc<CryptoProvider> {
    Arc::new(rustls::crypto::ring::default_provider())
}

/// Load every certificate from a PEM file
pub(crate) fn load_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>> {
    let certs = CertificateDer::pem_file_iter(path)
        .and_then(|iter| iter.collect::<std::result::Result<Vec<_>, _>>())
        .map_err(|e| {
            ClientError::TlsConfig(format!("unable to read certificates from {}: {}", path.display(), e))
        })?;
    if certs.is_empty() {
        return Err(ClientError::TlsConfig(format!(
            "no certificates found in {}",
            path.display()
        )));
    }
    Ok(certs)
}

/// Load the first private key from a PEM file
pub(crate) fn load_key(path: &Path) -> Result<PrivateKeyDer<'static>> {
    PrivateKeyDer::from_pem_file(path).map_err(|e| {
        ClientError::TlsConfig(format!("unable to read private key from {}: {}", path.display(), e))
    })
}

/// Load a CA bundle into a root store
pub(crate) fn load_roots(path: &Path) -> Result<RootCertStore> {
    let mut roots = RootCertStore::empty();
    for cert in load_certs(path)? {
        roots.add(cert).map_err(|e| {
            ClientError::TlsConfig(format!("invalid CA certificate in {}: {}", path.display(), e))
        })?;
    }
    Ok(roots)
}

/// Protocol versions the client offers
///
/// TLS 1.2 only: the daemon verifies the client certificate after the
/// client's Finished, and only under 1.2 does the client wait for the
/// daemon's Finished, so a rejected certificate fails the handshake
/// instead of the first command.
const PROTOCOL_VERSIONS: &[&rustls::SupportedProtocolVersion] = &[&rustls::version::TLS12];

/// Build the client side config: trusted CAs plus our certificate and key
pub fn client_config(options: &TlsOptions) -> Result<Arc<rustls::ClientConfig>> {
    let roots = load_roots(&options.ca_file)?;
    let certs = load_certs(&options.local_cert)?;
    let key = load_key(&options.local_key)?;

    let config = rustls::ClientConfig::builder_with_provider(crypto_provider())
        .with_protocol_versions(PROTOCOL_VERSIONS)
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?
        .with_root_certificates(roots)
        .with_client_auth_cert(certs, key)
        .map_err(|e| ClientError::TlsConfig(format!("client certificate rejected: {}", e)))?;

    Ok(Arc::new(config))
}

/// Wrap a connected socket and complete the handshake
///
/// Certificate and peer name verification happen here, so a stream
/// returned from this function is authenticated.
pub fn handshake(options: &TlsOptions, mut tcp: TcpStream) -> Result<TlsStream> {
    let config = client_config(options)?;
    let server_name = ServerName::try_from(options.peer_name.clone()).map_err(|e| {
        ClientError::TlsConfig(format!("invalid peer name {:?}: {}", options.peer_name, e))
    })?;

    let mut conn = ClientConnection::new(config, server_name)
        .map_err(|e| ClientError::TlsConfig(e.to_string()))?;

    while conn.is_handshaking() {
        conn.complete_io(&mut tcp)
            .map_err(|e| ClientError::TlsHandshake(e.to_string()))?;
    }

    tracing::debug!(
        "TLS established with {}: {:?} {:?}",
        options.peer_name,
        conn.protocol_version(),
        conn.negotiated_cipher_suite().map(|s| s.suite())
    );

    Ok(StreamOwned::new(conn, tcp))
}
