//! Shared fixtures: a signing "WeChat Pay" and a running gateway.
//! Recording downstreams come from `relay::testing`.

#![allow(dead_code, unused_imports)]

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rsa::pkcs1v15::SigningKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::{RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

use notify_gateway::config::ForwardConfig;
pub use notify_gateway::relay::testing::{spawn_spy, unused_url, RecordedRequest, Spy, SpyConfig};
use notify_gateway::wechat::signature::build_message;
use notify_gateway::{router, ApiV3Key, AppState, Forwarder, NotifyVerifier, VerificationKey};

pub const KEY_ID: &str = "PUB_KEY_ID_0114232134912410000000000000";
pub const API_V3_KEY: &str = "0123456789abcdef0123456789abcdef";

/// One RSA key per test binary; generation dominates test time otherwise.
pub fn private_key() -> &'static RsaPrivateKey {
    static KEY: OnceLock<RsaPrivateKey> = OnceLock::new();
    KEY.get_or_init(|| {
        let mut rng = rand::thread_rng();
        RsaPrivateKey::new(&mut rng, 2048).unwrap()
    })
}

pub fn public_key() -> RsaPublicKey {
    private_key().to_public_key()
}

// =============================================================================
// Signed notifications
// =============================================================================

/// A notification exactly as WeChat Pay would post it.
pub struct SignedNotify {
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

/// Build and sign a TRANSACTION.SUCCESS notification carrying `attach`.
pub fn signed_notify(attach: Option<&str>) -> SignedNotify {
    let mut transaction = serde_json::json!({
        "appid": "wxd678efh567hg6787",
        "mchid": "1230000109",
        "out_trade_no": "1217752501201407033233368018",
        "transaction_id": "1217752501201407033233368018",
        "trade_type": "JSAPI",
        "trade_state": "SUCCESS",
        "trade_state_desc": "paid",
        "bank_type": "CMC",
        "success_time": "2018-06-08T10:34:56+08:00",
        "payer": {"openid": "oUpF8uMuAJO_M2pxb1Q9zNjWeS6o"},
        "amount": {"total": 100, "payer_total": 100, "currency": "CNY", "payer_currency": "CNY"}
    });
    if let Some(attach) = attach {
        transaction["attach"] = serde_json::Value::String(attach.to_string());
    }

    let nonce = "fdasflkja484";
    let aad = "transaction";
    let cipher = Aes256Gcm::new_from_slice(API_V3_KEY.as_bytes()).unwrap();
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(nonce.as_bytes()),
            Payload {
                msg: transaction.to_string().as_bytes(),
                aad: aad.as_bytes(),
            },
        )
        .unwrap();

    // Deliberately not what serde_json would produce, to catch re-encoding.
    let body = format!(
        concat!(
            "{{\"id\": \"EV-2018022511223320873\",\n",
            "  \"create_time\": \"2015-05-20T13:29:35+08:00\",\n",
            "  \"resource_type\": \"encrypt-resource\",\n",
            "  \"event_type\": \"TRANSACTION.SUCCESS\",\n",
            "  \"summary\": \"支付成功\",\n",
            "  \"resource\": {{\"original_type\": \"transaction\", \"algorithm\": \"AEAD_AES_256_GCM\",",
            " \"ciphertext\": \"{}\", \"associated_data\": \"{}\", \"nonce\": \"{}\"}}}}"
        ),
        STANDARD.encode(sealed),
        aad,
        nonce
    )
    .into_bytes();

    sign(body)
}

/// Sign an arbitrary body with the test key.
pub fn sign(body: Vec<u8>) -> SignedNotify {
    let timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap()
        .as_secs()
        .to_string();
    let nonce = "593BEC0C930BF1AFEB40B4A08C8FB242";

    let signer = SigningKey::<Sha256>::new(private_key().clone());
    let signature = STANDARD.encode(signer.sign(&build_message(&timestamp, nonce, &body)).to_bytes());

    SignedNotify {
        headers: vec![
            ("Content-Type", "application/json".to_string()),
            ("Wechatpay-Timestamp", timestamp),
            ("Wechatpay-Nonce", nonce.to_string()),
            ("Wechatpay-Signature", signature),
            ("Wechatpay-Serial", KEY_ID.to_string()),
            ("Wechatpay-Signature-Type", "WECHATPAY2-SHA256-RSA2048".to_string()),
        ],
        body,
    }
}

impl SignedNotify {
    pub fn set_header(&mut self, name: &'static str, value: &str) {
        for (key, existing) in &mut self.headers {
            if *key == name {
                *existing = value.to_string();
                return;
            }
        }
        self.headers.push((name, value.to_string()));
    }
}

// =============================================================================
// Gateway under test
// =============================================================================

pub struct Gateway {
    pub addr: SocketAddr,
    server: JoinHandle<()>,
}

impl Gateway {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// POST a signed notification to `/notify`.
    pub async fn post(&self, notify: &SignedNotify) -> reqwest::Response {
        let mut request = reqwest::Client::new()
            .post(self.url("/notify"))
            .body(notify.body.clone());
        for (name, value) in &notify.headers {
            request = request.header(*name, value.as_str());
        }
        request.send().await.unwrap()
    }
}

impl Drop for Gateway {
    fn drop(&mut self) {
        self.server.abort();
    }
}

pub fn fast_forward_config() -> ForwardConfig {
    ForwardConfig {
        timeout_ms: 1000,
        retries: 1,
        retry_wait_ms: 10,
        retry_max_wait_ms: 20,
    }
}

pub fn verifier() -> NotifyVerifier {
    NotifyVerifier::new(
        VerificationKey::new(KEY_ID, public_key()),
        ApiV3Key::try_from(API_V3_KEY).unwrap(),
        300,
    )
}

pub async fn spawn_gateway(targets: &[Url]) -> Gateway {
    let targets = targets.to_vec();
    let forwarder = Forwarder::new(&fast_forward_config()).unwrap();
    spawn_with_state(AppState::new(verifier(), forwarder, targets)).await
}

pub async fn spawn_with_state(state: AppState) -> Gateway {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(state);
    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Gateway { addr, server }
}
