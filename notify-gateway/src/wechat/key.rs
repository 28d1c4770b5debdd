//! Key material loaded once at startup.

use std::fmt;
use std::path::Path;

use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs1v15::VerifyingKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::RsaPublicKey;
use sha2::Sha256;
use thiserror::Error;
use tracing::info;

use crate::config::{ConfigError, API_V3_KEY_LEN};

/// Why a public key file could not be used.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("{0}")]
    Read(#[from] std::io::Error),

    #[error("not an RSA public key in SPKI or PKCS#1 PEM form: {0}")]
    Pem(#[from] rsa::pkcs1::Error),
}

/// WeChat Pay platform public key and the identifier it is published under.
#[derive(Clone)]
pub struct VerificationKey {
    id: String,
    key: VerifyingKey<Sha256>,
}

impl VerificationKey {
    pub fn new(id: impl Into<String>, public_key: RsaPublicKey) -> Self {
        Self {
            id: id.into(),
            key: VerifyingKey::new(public_key),
        }
    }

    /// Parse a PEM public key, SPKI (`BEGIN PUBLIC KEY`) or PKCS#1
    /// (`BEGIN RSA PUBLIC KEY`).
    pub fn from_pem(id: impl Into<String>, pem: &str) -> Result<Self, KeyError> {
        let public_key = RsaPublicKey::from_public_key_pem(pem)
            .or_else(|_| RsaPublicKey::from_pkcs1_pem(pem))?;
        Ok(Self::new(id, public_key))
    }

    /// Load the public key file named in the config.
    pub fn load(id: impl Into<String>, path: &Path) -> Result<Self, ConfigError> {
        let key = std::fs::read_to_string(path)
            .map_err(KeyError::from)
            .and_then(|pem| Self::from_pem(id, &pem))
            .map_err(|source| ConfigError::PublicKey {
                path: path.to_path_buf(),
                source,
            })?;

        info!(path = %path.display(), key_id = %key.id, "wechat_public_key_loaded");

        Ok(key)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn verifying_key(&self) -> &VerifyingKey<Sha256> {
        &self.key
    }
}

impl fmt::Debug for VerificationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VerificationKey")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}

/// The merchant's 32-byte API v3 key.
#[derive(Clone)]
pub struct ApiV3Key([u8; API_V3_KEY_LEN]);

impl ApiV3Key {
    pub fn as_bytes(&self) -> &[u8; API_V3_KEY_LEN] {
        &self.0
    }
}

impl TryFrom<&str> for ApiV3Key {
    type Error = ConfigError;

    fn try_from(raw: &str) -> Result<Self, Self::Error> {
        let bytes: [u8; API_V3_KEY_LEN] = raw
            .as_bytes()
            .try_into()
            .map_err(|_| ConfigError::InvalidApiV3Key { len: raw.len() })?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ApiV3Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiV3Key(<redacted>)")
    }
}
