//! Building a STARTTLS acceptor from certificate material.

use crate::error::{Error, Result};
use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, private_key};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use tokio_rustls::TlsAcceptor;

/// Loads a PEM certificate chain and private key into an acceptor.
///
/// # Errors
///
/// Returns an error if a file cannot be read, holds no certificate or key,
/// or the key does not match the certificate.
pub fn load_acceptor(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<TlsAcceptor> {
    let cert_path = cert_path.as_ref();
    let mut cert_reader = BufReader::new(File::open(cert_path)?);
    let chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader).collect::<std::io::Result<_>>()?;

    if chain.is_empty() {
        return Err(Error::Tls(rustls::Error::General(format!(
            "no certificates found in {}",
            cert_path.display()
        ))));
    }
    tracing::info!(count = chain.len(), path = %cert_path.display(), "Loaded certificates");

    let key_path = key_path.as_ref();
    let mut key_reader = BufReader::new(File::open(key_path)?);
    let key = private_key(&mut key_reader)?.ok_or_else(|| {
        Error::Tls(rustls::Error::General(format!(
            "no private key found in {}",
            key_path.display()
        )))
    })?;

    acceptor_from_der(chain, key)
}

/// Builds an acceptor from DER-encoded material.
///
/// # Errors
///
/// Returns an error if the key does not match the certificate.
pub fn acceptor_from_der(
    chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
) -> Result<TlsAcceptor> {
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(chain, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}
