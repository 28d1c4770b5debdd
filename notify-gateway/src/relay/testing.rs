//! Recording downstream server for forwarding tests.
//!
//! Compiled for unit tests and, behind the `testing` feature, for the
//! integration suite.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, Uri};
use axum::Router;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use url::Url;

/// Arrival counter shared by every spy in the process.
static SEQUENCE: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    /// Position in the process-wide arrival order; compare across spies
    pub sequence: u64,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub struct SpyConfig {
    status: StatusCode,
    body: &'static str,
    delay: Duration,
}

impl SpyConfig {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            body: "",
            delay: Duration::ZERO,
        }
    }

    pub fn with_body(mut self, body: &'static str) -> Self {
        self.body = body;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Clone)]
struct SpyState {
    config: SpyConfig,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

pub struct Spy {
    base: Url,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    server: JoinHandle<()>,
}

impl Spy {
    pub fn url(&self, path: &str) -> Url {
        self.base.join(path).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for Spy {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn record(
    State(state): State<SpyState>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, &'static str) {
    state.requests.lock().unwrap().push(RecordedRequest {
        sequence: SEQUENCE.fetch_add(1, Ordering::SeqCst),
        path: uri.path().to_string(),
        headers,
        body,
    });

    if !state.config.delay.is_zero() {
        tokio::time::sleep(state.config.delay).await;
    }

    (state.config.status, state.config.body)
}

pub async fn spawn_spy(config: SpyConfig) -> Spy {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = SpyState {
        config,
        requests: Arc::clone(&requests),
    };

    let app = Router::new().fallback(record).with_state(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    Spy {
        base: Url::parse(&format!("http://{addr}/")).unwrap(),
        requests,
        server,
    }
}

/// A localhost URL nothing is listening on.
pub async fn unused_url() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Url::parse(&format!("http://{addr}/notify")).unwrap()
}
