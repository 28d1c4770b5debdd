//! Provider-facing responses.
//!
//! WeChat Pay treats anything but a 2xx as "not received" and redelivers
//! the notification later, so every failure in the relay surfaces here.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::relay::ForwardError;
use crate::wechat::VerificationError;

/// Failure body in the shape WeChat Pay documents for notify replies.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailureResponse {
    pub code: String,
    pub message: String,
}

impl FailureResponse {
    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            code: "FAIL".to_string(),
            message: message.into(),
        }
    }
}

/// Everything that can stop a notification from being acknowledged.
#[derive(Debug, Error)]
pub enum RelayError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Forward(#[from] ForwardError),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Verification(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Forward(ForwardError::Transport { .. }) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Forward(ForwardError::Rejected { .. }) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        let message = match &self {
            Self::Verification(e) => e.to_string(),
            Self::Forward(e @ ForwardError::Transport { .. }) => {
                format!("failed to forward request: {e}")
            }
            Self::Forward(e @ ForwardError::Rejected { .. }) => e.to_string(),
        };

        (self.status(), Json(FailureResponse::fail(message))).into_response()
    }
}
