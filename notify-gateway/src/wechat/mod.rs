//! WeChat Pay API v3 notification verification.
//!
//! ## Verification Flow
//!
//! ```text
//! headers + raw body → signature check → envelope JSON → AES-256-GCM → Transaction
//! ```
//!
//! The raw body is only borrowed. Whatever is forwarded afterwards is the
//! exact byte stream that was signed.

pub mod decrypt;
pub mod error;
pub mod key;
pub mod signature;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

use axum::http::HeaderMap;
use tracing::{debug, warn};

pub use decrypt::decrypt_resource;
pub use error::VerificationError;
pub use key::{ApiV3Key, KeyError, VerificationKey};
pub use signature::{verify_signature, SignatureHeaders};
pub use types::{NotifyEnvelope, Transaction, VerifiedNotification};

/// Verifies and decrypts notifications with process-wide key material.
///
/// Built once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct NotifyVerifier {
    key: VerificationKey,
    api_v3_key: ApiV3Key,
    max_age_seconds: u64,
}

impl NotifyVerifier {
    pub fn new(key: VerificationKey, api_v3_key: ApiV3Key, max_age_seconds: u64) -> Self {
        Self {
            key,
            api_v3_key,
            max_age_seconds,
        }
    }

    pub fn key_id(&self) -> &str {
        self.key.id()
    }

    /// Verify a notification against the current wall clock.
    pub fn verify(
        &self,
        headers: &HeaderMap,
        body: &[u8],
    ) -> Result<VerifiedNotification, VerificationError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();
        self.verify_at(headers, body, i64::try_from(now).unwrap_or(i64::MAX))
    }

    /// Verify a notification as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        headers: &HeaderMap,
        body: &[u8],
        now: i64,
    ) -> Result<VerifiedNotification, VerificationError> {
        let signature_headers = SignatureHeaders::from_headers(headers)?;
        verify_signature(
            &self.key,
            &signature_headers,
            body,
            now,
            self.max_age_seconds,
        )?;

        let envelope: NotifyEnvelope = serde_json::from_slice(body)
            .map_err(|e| VerificationError::MalformedPayload(e.to_string()))?;

        let plaintext = decrypt_resource(&self.api_v3_key, &envelope.resource).map_err(|e| {
            warn!(
                notification_id = %envelope.id,
                error = %e,
                "wechat_resource_decrypt_failed"
            );
            e
        })?;

        let transaction: Transaction = serde_json::from_slice(&plaintext)
            .map_err(|e| VerificationError::MalformedPayload(format!("transaction: {e}")))?;

        debug!(
            notification_id = %envelope.id,
            event_type = envelope.event_type.as_deref().unwrap_or_default(),
            out_trade_no = transaction.out_trade_no.as_deref().unwrap_or_default(),
            trade_state = transaction.trade_state.as_deref().unwrap_or_default(),
            "wechat_notification_verified"
        );

        Ok(VerifiedNotification::new(envelope, transaction))
    }
}
