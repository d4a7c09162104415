//! Certificate entity

use crate::tenant::EntityId;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A tenant-scoped certificate. `content` is opaque to everything but the
/// PEM validator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    pub id: EntityId,
    pub name: String,
    pub content: Vec<u8>,
}

impl Certificate {
    /// Hex SHA-256 of the content, used wherever the content itself
    /// should not be echoed (audit payloads, logs).
    pub fn fingerprint(&self) -> String {
        content_fingerprint(&self.content)
    }
}

/// Creation request for a certificate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateModel {
    pub name: String,
    pub content: Vec<u8>,
}

impl CertificateModel {
    pub fn new(name: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn into_certificate(self, id: EntityId) -> Certificate {
        Certificate {
            id,
            name: self.name,
            content: self.content,
        }
    }
}

pub fn content_fingerprint(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}
