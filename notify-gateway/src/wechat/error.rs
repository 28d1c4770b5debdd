use thiserror::Error;

/// Reasons a notification is rejected before anything is forwarded.
///
/// All variants are terminal for the request. WeChat Pay redelivers the
/// notification on its own schedule.
#[derive(Debug, Error)]
pub enum VerificationError {
    #[error("missing or invalid header {0}")]
    MissingHeader(&'static str),

    #[error("no public key found for serial {serial:?}")]
    UnknownKeyId { serial: String },

    #[error("timestamp {timestamp} is outside the allowed {max_age_seconds}s window")]
    StaleTimestamp { timestamp: i64, max_age_seconds: u64 },

    #[error("signature verification failed: {0}")]
    SignatureMismatch(String),

    #[error("failed to decrypt notification resource: {0}")]
    DecryptFailed(String),

    #[error("malformed notification payload: {0}")]
    MalformedPayload(String),
}

impl VerificationError {
    /// Stable snake_case label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingHeader(_) => "missing_header",
            Self::UnknownKeyId { .. } => "unknown_key_id",
            Self::StaleTimestamp { .. } => "stale_timestamp",
            Self::SignatureMismatch(_) => "signature_mismatch",
            Self::DecryptFailed(_) => "decrypt_failed",
            Self::MalformedPayload(_) => "malformed_payload",
        }
    }
}
