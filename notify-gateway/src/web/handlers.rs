//! Notification endpoint handlers.
//!
//! The notify handler runs the whole pipeline inline:
//! 1. Verify the signature and decrypt the resource
//! 2. Resolve forward targets
//! 3. Forward the untouched request to each target, in order
//! 4. Answer 204 only if every forward succeeded

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};
use url::Url;

use crate::relay::{dispatch, resolve, Forwarder};
use crate::wechat::NotifyVerifier;

use super::response::RelayError;

/// Shared application state.
///
/// Everything here is built once at startup and never mutated.
#[derive(Clone)]
pub struct AppState {
    pub verifier: Arc<NotifyVerifier>,
    pub forwarder: Forwarder,
    pub targets: Arc<[Url]>,
}

impl AppState {
    pub fn new(verifier: NotifyVerifier, forwarder: Forwarder, targets: Vec<Url>) -> Self {
        Self {
            verifier: Arc::new(verifier),
            forwarder,
            targets: targets.into(),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// WeChat Pay Notify
// =============================================================================

/// WeChat Pay notification endpoint.
///
/// The body is taken as raw bytes so the signed payload is forwarded
/// exactly as received.
pub async fn notify(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<StatusCode, RelayError> {
    info!(
        body_length = body.len(),
        has_signature = headers.contains_key("wechatpay-signature"),
        "notify_received"
    );

    let notification = state.verifier.verify(&headers, &body).map_err(|e| {
        warn!(kind = e.kind(), error = %e, "notify_verification_failed");
        e
    })?;

    let plan = resolve(&notification, &state.targets);

    info!(
        notification_id = %notification.id(),
        event_type = notification.event_type().unwrap_or_default(),
        source = plan.source(),
        target_count = plan.targets().len(),
        "notify_verified"
    );

    let deliveries = dispatch(&state.forwarder, &plan, &body, &headers).await?;

    info!(
        notification_id = %notification.id(),
        delivered = deliveries.len(),
        "notify_relayed"
    );

    Ok(StatusCode::NO_CONTENT)
}
