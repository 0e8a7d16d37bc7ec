//! TLS transport setup.
//!
//! Builds the acceptor once at startup from PEM-encoded certificate and key
//! paths. The resulting listener is interchangeable with the plain TCP one;
//! the rest of the server only sees a stream plus a transport tag.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use anyhow::{Context, bail};
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::server::WebPkiClientVerifier;
use rustls::{RootCertStore, ServerConfig};
use tokio_rustls::TlsAcceptor;

use crate::config::TlsConfig;

/// Builds a TLS acceptor from the configured cert/key pair. When a root CA
/// bundle is configured it becomes the trust anchor set for verifying
/// client certificates.
pub fn build_acceptor(config: &TlsConfig) -> anyhow::Result<TlsAcceptor> {
    let certs = load_certs(&config.cert)?;
    let key = load_key(&config.key)?;

    let builder = if config.root_ca.is_empty() {
        ServerConfig::builder().with_no_client_auth()
    } else {
        let mut roots = RootCertStore::empty();
        for cert in load_certs(&config.root_ca)? {
            roots
                .add(cert)
                .context("unable to use the supplied root CA certificate")?;
        }
        let verifier = WebPkiClientVerifier::builder(Arc::new(roots))
            .build()
            .context("unable to build a client verifier from the root CA bundle")?;
        ServerConfig::builder().with_client_cert_verifier(verifier)
    };

    let server_config = builder
        .with_single_cert(certs, key)
        .context("invalid x509 certificate/key pair")?;

    Ok(TlsAcceptor::from(Arc::new(server_config)))
}

fn load_certs(path: &str) -> anyhow::Result<Vec<CertificateDer<'static>>> {
    let file = File::open(path).with_context(|| format!("could not read {}", path))?;
    let certs: Vec<_> = rustls_pemfile::certs(&mut BufReader::new(file))
        .collect::<Result<_, _>>()
        .with_context(|| format!("invalid PEM certificate in {}", path))?;
    if certs.is_empty() {
        bail!("no certificates found in {}", path);
    }
    Ok(certs)
}

fn load_key(path: &str) -> anyhow::Result<PrivateKeyDer<'static>> {
    let file = File::open(path).with_context(|| format!("could not read {}", path))?;
    rustls_pemfile::private_key(&mut BufReader::new(file))
        .with_context(|| format!("invalid PEM key in {}", path))?
        .with_context(|| format!("no private key found in {}", path))
}
