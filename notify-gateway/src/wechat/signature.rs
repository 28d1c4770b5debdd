//! WeChat Pay API v3 response/notification signature verification.
//!
//! WeChat Pay signs `timestamp\nnonce\nbody\n` with SHA256-RSA2048
//! (RSASSA-PKCS1-v1_5) and sends the base64 signature in headers.
//! Reference: https://pay.weixin.qq.com/doc/v3/merchant/4012365342

use axum::http::HeaderMap;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::Signature;
use rsa::signature::Verifier;
use tracing::warn;

use super::error::VerificationError;
use super::key::VerificationKey;

pub const HEADER_TIMESTAMP: &str = "Wechatpay-Timestamp";
pub const HEADER_NONCE: &str = "Wechatpay-Nonce";
pub const HEADER_SIGNATURE: &str = "Wechatpay-Signature";
pub const HEADER_SERIAL: &str = "Wechatpay-Serial";

/// Signature metadata borrowed from the inbound request headers.
#[derive(Debug, Clone, Copy)]
pub struct SignatureHeaders<'a> {
    pub timestamp: &'a str,
    pub nonce: &'a str,
    pub signature: &'a str,
    pub serial: &'a str,
}

impl<'a> SignatureHeaders<'a> {
    pub fn from_headers(headers: &'a HeaderMap) -> Result<Self, VerificationError> {
        Ok(Self {
            timestamp: required(headers, HEADER_TIMESTAMP)?,
            nonce: required(headers, HEADER_NONCE)?,
            signature: required(headers, HEADER_SIGNATURE)?,
            serial: required(headers, HEADER_SERIAL)?,
        })
    }
}

fn required<'a>(headers: &'a HeaderMap, name: &'static str) -> Result<&'a str, VerificationError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(VerificationError::MissingHeader(name))
}

/// Build the exact byte string WeChat Pay signs.
pub fn build_message(timestamp: &str, nonce: &str, body: &[u8]) -> Vec<u8> {
    let mut message = Vec::with_capacity(timestamp.len() + nonce.len() + body.len() + 3);
    message.extend_from_slice(timestamp.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(nonce.as_bytes());
    message.push(b'\n');
    message.extend_from_slice(body);
    message.push(b'\n');
    message
}

/// Verify the signature headers of a notification against `key`.
///
/// `now` is unix seconds; the timestamp may deviate by at most
/// `max_age_seconds` in either direction.
pub fn verify_signature(
    key: &VerificationKey,
    headers: &SignatureHeaders<'_>,
    body: &[u8],
    now: i64,
    max_age_seconds: u64,
) -> Result<(), VerificationError> {
    if headers.serial != key.id() {
        warn!(
            serial = %headers.serial,
            expected_serial = %key.id(),
            "wechat_signature_unknown_serial"
        );
        return Err(VerificationError::UnknownKeyId {
            serial: headers.serial.to_string(),
        });
    }

    let timestamp: i64 = headers
        .timestamp
        .parse()
        .map_err(|_| VerificationError::MissingHeader(HEADER_TIMESTAMP))?;

    let age = now.abs_diff(timestamp);
    if age > max_age_seconds {
        warn!(
            timestamp = timestamp,
            current_time = now,
            age_seconds = age,
            max_age_seconds = max_age_seconds,
            "wechat_signature_stale"
        );
        return Err(VerificationError::StaleTimestamp {
            timestamp,
            max_age_seconds,
        });
    }

    let raw_signature = STANDARD
        .decode(headers.signature)
        .map_err(|e| VerificationError::SignatureMismatch(format!("signature is not base64: {e}")))?;

    let signature = Signature::try_from(raw_signature.as_slice())
        .map_err(|e| VerificationError::SignatureMismatch(e.to_string()))?;

    let message = build_message(headers.timestamp, headers.nonce, body);

    key.verifying_key()
        .verify(&message, &signature)
        .map_err(|e| {
            warn!(
                serial = %headers.serial,
                body_length = body.len(),
                "wechat_signature_mismatch"
            );
            VerificationError::SignatureMismatch(e.to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use rsa::pkcs1v15::SigningKey;
    use rsa::signature::{SignatureEncoding, Signer};
    use rsa::RsaPrivateKey;
    use sha2::Sha256;

    const NOW: i64 = 1_700_000_000;
    const BODY: &[u8] = br#"{"id":"EV-1"}"#;

    fn keypair() -> (SigningKey<Sha256>, VerificationKey) {
        let mut rng = rand::thread_rng();
        let private = RsaPrivateKey::new(&mut rng, 1024).unwrap();
        let public = private.to_public_key();
        (
            SigningKey::<Sha256>::new(private),
            VerificationKey::new("PUB_KEY_ID_1", public),
        )
    }

    fn sign(signer: &SigningKey<Sha256>, timestamp: &str, nonce: &str, body: &[u8]) -> String {
        let signature = signer.sign(&build_message(timestamp, nonce, body));
        STANDARD.encode(signature.to_bytes())
    }

    fn headers<'a>(timestamp: &'a str, signature: &'a str, serial: &'a str) -> SignatureHeaders<'a> {
        SignatureHeaders {
            timestamp,
            nonce: "5K8264ILTKCH16CQ2502SI8ZNMTM67VS",
            signature,
            serial,
        }
    }

    #[test]
    fn test_build_message() {
        assert_eq!(
            build_message("1554208460", "593BEC0C930BF1AFEB40B4A08C8FB242", b"{}"),
            b"1554208460\n593BEC0C930BF1AFEB40B4A08C8FB242\n{}\n".to_vec()
        );
    }

    #[test]
    fn test_verify_signature_valid() {
        let (signer, key) = keypair();
        let ts = NOW.to_string();
        let sig = sign(&signer, &ts, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);

        assert!(verify_signature(&key, &headers(&ts, &sig, "PUB_KEY_ID_1"), BODY, NOW, 300).is_ok());
    }

    #[test]
    fn test_verify_signature_tampered_body() {
        let (signer, key) = keypair();
        let ts = NOW.to_string();
        let sig = sign(&signer, &ts, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);

        let err = verify_signature(
            &key,
            &headers(&ts, &sig, "PUB_KEY_ID_1"),
            br#"{"id":"EV-2"}"#,
            NOW,
            300,
        )
        .unwrap_err();
        assert!(matches!(err, VerificationError::SignatureMismatch(_)));
    }

    #[test]
    fn test_verify_signature_wrong_key() {
        let (signer, _) = keypair();
        let (_, other_key) = keypair();
        let ts = NOW.to_string();
        let sig = sign(&signer, &ts, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);

        let err = verify_signature(&other_key, &headers(&ts, &sig, "PUB_KEY_ID_1"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::SignatureMismatch(_)));
    }

    #[test]
    fn test_verify_signature_unknown_serial() {
        let (signer, key) = keypair();
        let ts = NOW.to_string();
        let sig = sign(&signer, &ts, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);

        let err = verify_signature(&key, &headers(&ts, &sig, "PUB_KEY_ID_9"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::UnknownKeyId { .. }));
    }

    #[test]
    fn test_verify_signature_stale() {
        let (signer, key) = keypair();
        let ts = (NOW - 301).to_string();
        let sig = sign(&signer, &ts, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);

        let err = verify_signature(&key, &headers(&ts, &sig, "PUB_KEY_ID_1"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::StaleTimestamp { .. }));

        let future = (NOW + 301).to_string();
        let sig = sign(&signer, &future, "5K8264ILTKCH16CQ2502SI8ZNMTM67VS", BODY);
        let err = verify_signature(&key, &headers(&future, &sig, "PUB_KEY_ID_1"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::StaleTimestamp { .. }));
    }

    #[test]
    fn test_verify_signature_not_base64() {
        let (_, key) = keypair();
        let ts = NOW.to_string();

        let err = verify_signature(&key, &headers(&ts, "%%%", "PUB_KEY_ID_1"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::SignatureMismatch(_)));
    }

    #[test]
    fn test_verify_signature_non_numeric_timestamp() {
        let (_, key) = keypair();
        let err = verify_signature(&key, &headers("yesterday", "c2ln", "PUB_KEY_ID_1"), BODY, NOW, 300)
            .unwrap_err();
        assert!(matches!(err, VerificationError::MissingHeader(HEADER_TIMESTAMP)));
    }

    #[test]
    fn test_signature_headers_missing() {
        let mut map = HeaderMap::new();
        map.insert(HEADER_TIMESTAMP, HeaderValue::from_static("1554208460"));
        map.insert(HEADER_NONCE, HeaderValue::from_static("abc"));
        map.insert(HEADER_SERIAL, HeaderValue::from_static("PUB_KEY_ID_1"));

        let err = SignatureHeaders::from_headers(&map).unwrap_err();
        assert!(matches!(err, VerificationError::MissingHeader(HEADER_SIGNATURE)));

        map.insert(HEADER_SIGNATURE, HeaderValue::from_static("  "));
        let err = SignatureHeaders::from_headers(&map).unwrap_err();
        assert!(matches!(err, VerificationError::MissingHeader(HEADER_SIGNATURE)));

        map.insert(HEADER_SIGNATURE, HeaderValue::from_static("c2ln"));
        let parsed = SignatureHeaders::from_headers(&map).unwrap();
        assert_eq!(parsed.serial, "PUB_KEY_ID_1");
    }
}
