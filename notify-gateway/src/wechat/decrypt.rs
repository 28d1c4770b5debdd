//! AEAD_AES_256_GCM decryption of notification resources.

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use super::error::VerificationError;
use super::key::ApiV3Key;
use super::types::{EncryptedResource, AEAD_AES_256_GCM};

const NONCE_LEN: usize = 12;

/// Decrypt a notification resource with the merchant's API v3 key.
pub fn decrypt_resource(
    key: &ApiV3Key,
    resource: &EncryptedResource,
) -> Result<Vec<u8>, VerificationError> {
    if resource.algorithm != AEAD_AES_256_GCM {
        return Err(VerificationError::MalformedPayload(format!(
            "unsupported resource algorithm {:?}",
            resource.algorithm
        )));
    }

    if resource.nonce.len() != NONCE_LEN {
        return Err(VerificationError::DecryptFailed(format!(
            "nonce must be {NONCE_LEN} bytes, got {}",
            resource.nonce.len()
        )));
    }

    let ciphertext = STANDARD
        .decode(&resource.ciphertext)
        .map_err(|e| VerificationError::DecryptFailed(format!("ciphertext is not base64: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| VerificationError::DecryptFailed(e.to_string()))?;

    let aad = resource.associated_data.as_deref().unwrap_or_default();

    cipher
        .decrypt(
            Nonce::from_slice(resource.nonce.as_bytes()),
            Payload {
                msg: &ciphertext,
                aad: aad.as_bytes(),
            },
        )
        .map_err(|_| VerificationError::DecryptFailed("authentication tag mismatch".to_string()))
}
