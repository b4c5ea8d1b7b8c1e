// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::path::Path;
use std::sync::{Arc, Once};

use rustls::RootCertStore;
use rustls_pki_types::pem::PemObject;
use rustls_pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use serde::{Deserialize, Serialize};
use tokio_rustls::{TlsAcceptor, TlsConnector};

use crate::error::RpcError;

static RUSTLS: Once = Once::new();

pub fn initialize_crypto_provider() {
    RUSTLS.call_once(|| {
        // aws-lc is the default provider; another one may already be installed
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    });
}

/// Certificate and key presented by the server
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct TlsServerConfig {
    /// PEM file holding the certificate chain
    pub cert_file: String,
    /// PEM file holding the private key
    pub key_file: String,
}

impl TlsServerConfig {
    pub fn new(cert_file: impl Into<String>, key_file: impl Into<String>) -> Self {
        Self {
            cert_file: cert_file.into(),
            key_file: key_file.into(),
        }
    }

    pub fn load_acceptor(&self) -> Result<TlsAcceptor, RpcError> {
        initialize_crypto_provider();

        let certs = load_certs(&self.cert_file)?;
        let key = PrivateKeyDer::from_pem_file(Path::new(&self.key_file))
            .map_err(|e| RpcError::Tls(format!("invalid key file {}: {}", self.key_file, e)))?;

        let config = rustls::ServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)
            .map_err(|e| RpcError::Tls(e.to_string()))?;

        Ok(TlsAcceptor::from(Arc::new(config)))
    }
}

/// Trust settings used by the client
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct TlsClientConfig {
    /// PEM file with the CA certificates to trust. The platform roots are
    /// used when unset.
    #[serde(default)]
    pub ca_file: Option<String>,

    /// Name to verify the server certificate against. Defaults to the host
    /// part of the endpoint.
    #[serde(default)]
    pub server_name: Option<String>,
}

impl TlsClientConfig {
    pub fn with_ca_file(mut self, ca_file: impl Into<String>) -> Self {
        self.ca_file = Some(ca_file.into());
        self
    }

    pub fn with_server_name(mut self, server_name: impl Into<String>) -> Self {
        self.server_name = Some(server_name.into());
        self
    }

    pub fn load_connector(&self) -> Result<TlsConnector, RpcError> {
        initialize_crypto_provider();

        let mut root_store = RootCertStore::empty();
        match &self.ca_file {
            Some(ca_file) => {
                for cert in load_certs(ca_file)? {
                    root_store
                        .add(cert)
                        .map_err(|e| RpcError::Tls(format!("invalid CA certificate: {}", e)))?;
                }
            }
            None => {
                let native = rustls_native_certs::load_native_certs();
                for error in &native.errors {
                    tracing::warn!(%error, "failed to load a platform certificate");
                }
                root_store.add_parsable_certificates(native.certs);
            }
        }

        let config = rustls::ClientConfig::builder()
            .with_root_certificates(root_store)
            .with_no_client_auth();

        Ok(TlsConnector::from(Arc::new(config)))
    }

    /// Name checked against the server certificate
    pub fn server_name(&self, host: &str) -> Result<ServerName<'static>, RpcError> {
        let name = self.server_name.as_deref().unwrap_or(host).to_string();
        ServerName::try_from(name)
            .map_err(|e| RpcError::Tls(format!("invalid server name: {}", e)))
    }
}

fn load_certs(file: &str) -> Result<Vec<CertificateDer<'static>>, RpcError> {
    let certs = CertificateDer::pem_file_iter(Path::new(file))
        .map_err(|e| RpcError::Tls(format!("invalid certificate file {}: {}", file, e)))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| RpcError::Tls(format!("invalid certificate file {}: {}", file, e)))?;

    if certs.is_empty() {
        return Err(RpcError::Tls(format!("no certificate found in {}", file)));
    }

    Ok(certs)
}
