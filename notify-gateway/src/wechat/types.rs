//! WeChat Pay API v3 notification payload types.
//!
//! The outer envelope arrives in plaintext; the `resource` holds the
//! AES-256-GCM encrypted transaction.

use serde::{Deserialize, Serialize};

/// The only resource encryption algorithm WeChat Pay API v3 uses.
pub const AEAD_AES_256_GCM: &str = "AEAD_AES_256_GCM";

/// Plaintext notification envelope as posted by WeChat Pay.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyEnvelope {
    pub id: String,
    #[serde(default)]
    pub create_time: Option<String>,
    #[serde(default)]
    pub event_type: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    pub resource: EncryptedResource,
}

/// Encrypted payload carried by a notification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptedResource {
    pub algorithm: String,
    /// Base64 ciphertext followed by the 16-byte GCM tag
    pub ciphertext: String,
    #[serde(default)]
    pub associated_data: Option<String>,
    /// 12-character nonce, used as raw bytes
    pub nonce: String,
    #[serde(default)]
    pub original_type: Option<String>,
}

/// Decrypted payment transaction.
///
/// WeChat Pay may omit any field depending on the trade state, so all of
/// them are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    #[serde(default)]
    pub appid: Option<String>,
    #[serde(default)]
    pub mchid: Option<String>,
    #[serde(default)]
    pub out_trade_no: Option<String>,
    #[serde(default)]
    pub transaction_id: Option<String>,
    #[serde(default)]
    pub trade_type: Option<String>,
    #[serde(default)]
    pub trade_state: Option<String>,
    #[serde(default)]
    pub trade_state_desc: Option<String>,
    #[serde(default)]
    pub bank_type: Option<String>,
    /// Merchant-supplied free-form data, echoed back by WeChat Pay
    #[serde(default)]
    pub attach: Option<String>,
    #[serde(default)]
    pub success_time: Option<String>,
    #[serde(default)]
    pub payer: Option<Payer>,
    #[serde(default)]
    pub amount: Option<Amount>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Payer {
    #[serde(default)]
    pub openid: Option<String>,
}

/// Amounts are in the smallest currency unit (fen for CNY).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Amount {
    #[serde(default)]
    pub total: Option<i64>,
    #[serde(default)]
    pub payer_total: Option<i64>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub payer_currency: Option<String>,
}

/// A notification that passed signature verification and decryption.
///
/// Only [`NotifyVerifier`](super::NotifyVerifier) produces these.
#[derive(Debug, Clone)]
pub struct VerifiedNotification {
    id: String,
    event_type: Option<String>,
    create_time: Option<String>,
    summary: Option<String>,
    transaction: Transaction,
}

impl VerifiedNotification {
    pub(crate) fn new(envelope: NotifyEnvelope, transaction: Transaction) -> Self {
        Self {
            id: envelope.id,
            event_type: envelope.event_type,
            create_time: envelope.create_time,
            summary: envelope.summary,
            transaction,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> Option<&str> {
        self.event_type.as_deref()
    }

    pub fn create_time(&self) -> Option<&str> {
        self.create_time.as_deref()
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn transaction(&self) -> &Transaction {
        &self.transaction
    }

    pub fn attach(&self) -> Option<&str> {
        self.transaction.attach.as_deref()
    }
}
