//! Where TLS material comes from on each connect attempt

use super::identity::{build_secure_transport, IdentityError, SecureTransport};
use crate::config::TlsSection;
use std::path::Path;

/// Raw PEM blobs for one TLS context
#[derive(Clone, Default)]
pub struct TlsMaterial {
    pub ca_bundle: Vec<u8>,
    pub client_cert: Option<Vec<u8>>,
    pub client_key: Option<Vec<u8>>,
}

impl TlsMaterial {
    pub fn new(ca_bundle: impl Into<Vec<u8>>) -> Self {
        Self {
            ca_bundle: ca_bundle.into(),
            client_cert: None,
            client_key: None,
        }
    }

    pub fn with_client_identity(
        mut self,
        cert: impl Into<Vec<u8>>,
        key: impl Into<Vec<u8>>,
    ) -> Self {
        self.client_cert = Some(cert.into());
        self.client_key = Some(key.into());
        self
    }

    pub fn build(&self) -> Result<SecureTransport, IdentityError> {
        build_secure_transport(
            &self.ca_bundle,
            self.client_cert.as_deref(),
            self.client_key.as_deref(),
        )
    }
}

// Key bytes never reach logs
impl std::fmt::Debug for TlsMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TlsMaterial")
            .field("ca_bundle_len", &self.ca_bundle.len())
            .field("client_cert", &self.client_cert.is_some())
            .field("client_key", &self.client_key.is_some())
            .finish()
    }
}

/// Supplies [`TlsMaterial`] per connect attempt
#[derive(Debug, Clone)]
pub enum TlsMaterialSource {
    InMemory(TlsMaterial),
    /// Re-read from disk every time, so replaced files apply on the next attempt
    Files(TlsSection),
}

impl TlsMaterialSource {
    pub fn load(&self) -> Result<TlsMaterial, IdentityError> {
        match self {
            TlsMaterialSource::InMemory(material) => Ok(material.clone()),
            TlsMaterialSource::Files(section) => Ok(TlsMaterial {
                ca_bundle: read_file(&section.ca_bundle)?,
                client_cert: section.client_cert.as_deref().map(read_file).transpose()?,
                client_key: section.client_key.as_deref().map(read_file).transpose()?,
            }),
        }
    }

    pub fn build(&self) -> Result<SecureTransport, IdentityError> {
        self.load()?.build()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>, IdentityError> {
    std::fs::read(path).map_err(|source| IdentityError::Io {
        path: path.to_path_buf(),
        source,
    })
}
