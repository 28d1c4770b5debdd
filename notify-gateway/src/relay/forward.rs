//! Outbound forwarding of a notification to a single target.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::HeaderMap;
use rand::prelude::*;
use reqwest::Client;
use thiserror::Error;
use tokio::time::sleep;
use tracing::{info, warn};
use url::Url;

use crate::config::ForwardConfig;

/// Longest downstream response body carried into diagnostics.
const MAX_DIAGNOSTIC_BODY: usize = 4096;

/// Headers owned by the connection, not by the notification.
const HOP_BY_HOP: &[&str] = &[
    "host",
    "content-length",
    "connection",
    "keep-alive",
    "proxy-connection",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// A target accepted the notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub target: Url,
    pub status: u16,
    pub attempts: u32,
}

/// A target did not accept the notification.
#[derive(Debug, Error)]
pub enum ForwardError {
    /// No HTTP response after every attempt (connect error, timeout, I/O)
    #[error("failed to forward request to {target}: {message}")]
    Transport {
        target: Url,
        attempts: u32,
        message: String,
    },

    /// The target answered with a status of 400 or above
    #[error("target server responded with status {status}: {body}")]
    Rejected { target: Url, status: u16, body: String },
}

impl ForwardError {
    pub fn target(&self) -> &Url {
        match self {
            Self::Transport { target, .. } | Self::Rejected { target, .. } => target,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transport { .. } => "transport_error",
            Self::Rejected { .. } => "upstream_4xx_5xx",
        }
    }
}

/// Result of forwarding to one target.
pub type ForwardOutcome = Result<Delivery, ForwardError>;

/// HTTP client wrapper that forwards raw notifications.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: Client,
    retries: u32,
    retry_wait: Duration,
    retry_max_wait: Duration,
}

impl Forwarder {
    pub fn new(config: &ForwardConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            client,
            retries: config.retries,
            retry_wait: config.retry_wait(),
            retry_max_wait: config.retry_max_wait(),
        })
    }

    /// POST `body` with `headers` to `target`.
    ///
    /// Transport failures are retried up to the configured count. Any HTTP
    /// status ends the exchange: below 400 is a delivery, 400 and above a
    /// rejection.
    pub async fn forward(&self, target: &Url, body: &Bytes, headers: &HeaderMap) -> ForwardOutcome {
        let headers = forwardable_headers(headers);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;

            let result = self
                .client
                .post(target.clone())
                .headers(headers.clone())
                .body(body.clone())
                .send()
                .await;

            let response = match result {
                Ok(response) => response,
                Err(e) => {
                    let message = error_chain(&e);
                    let retryable = !e.is_builder() && attempt <= self.retries;

                    warn!(
                        url = %target,
                        attempt = attempt,
                        is_timeout = e.is_timeout(),
                        is_connect = e.is_connect(),
                        will_retry = retryable,
                        error = %message,
                        "forward_attempt_failed"
                    );

                    if !retryable {
                        return Err(ForwardError::Transport {
                            target: target.clone(),
                            attempts: attempt,
                            message,
                        });
                    }

                    sleep(self.backoff(attempt)).await;
                    continue;
                }
            };

            let status = response.status().as_u16();

            if status >= 400 {
                let body = match response.text().await {
                    Ok(text) => truncate(text, MAX_DIAGNOSTIC_BODY),
                    Err(e) => format!("<unreadable response body: {e}>"),
                };

                warn!(
                    url = %target,
                    status_code = status,
                    attempt = attempt,
                    body_length = body.len(),
                    "forward_rejected"
                );

                return Err(ForwardError::Rejected {
                    target: target.clone(),
                    status,
                    body,
                });
            }

            info!(
                url = %target,
                status_code = status,
                attempts = attempt,
                "forward_delivered"
            );

            return Ok(Delivery {
                target: target.clone(),
                status,
                attempts: attempt,
            });
        }
    }

    /// Exponential backoff with jitter, in `[cap / 2, cap]`.
    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32
            .checked_shl(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        let cap = self.retry_wait.saturating_mul(factor).min(self.retry_max_wait);
        let half = cap / 2;
        half + half.mul_f64(thread_rng().gen::<f64>())
    }
}

/// Copy of the inbound headers minus those the client must set itself.
pub fn forwardable_headers(inbound: &HeaderMap) -> HeaderMap {
    let mut headers = inbound.clone();
    for name in HOP_BY_HOP {
        headers.remove(*name);
    }
    headers
}

fn truncate(mut text: String, max: usize) -> String {
    if text.len() > max {
        let mut end = max;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        text.truncate(end);
    }
    text
}

fn error_chain(e: &(dyn std::error::Error + 'static)) -> String {
    let mut message = e.to_string();
    let mut source = e.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
