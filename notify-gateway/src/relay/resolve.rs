//! Forward target resolution.
//!
//! A notification is routed either to the URL its payer-side caller put in
//! `attach`, or to every statically configured target. Never both.

use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::wechat::VerifiedNotification;

/// Why a string was not accepted as a forward target.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("not an absolute URL: {0}")]
    Parse(#[from] url::ParseError),

    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    #[error("missing host")]
    MissingHost,
}

/// Parse an absolute `http`/`https` URL with a host.
pub fn parse_target(raw: &str) -> Result<Url, TargetError> {
    let url = Url::parse(raw.trim())?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(TargetError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(TargetError::MissingHost);
    }

    Ok(url)
}

/// Where a single notification goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForwardPlan {
    /// Payload-directed: only the URL carried in `attach`
    Attach(Url),
    /// Broadcast to every configured target, in order
    Static(Vec<Url>),
}

impl ForwardPlan {
    pub fn targets(&self) -> &[Url] {
        match self {
            Self::Attach(url) => std::slice::from_ref(url),
            Self::Static(urls) => urls,
        }
    }

    pub fn source(&self) -> &'static str {
        match self {
            Self::Attach(_) => "attach",
            Self::Static(_) => "static",
        }
    }
}

/// Decide the forward targets for a verified notification.
///
/// `static_targets` is validated non-empty at startup.
pub fn resolve(notification: &VerifiedNotification, static_targets: &[Url]) -> ForwardPlan {
    let attach = notification.attach().map(str::trim).filter(|a| !a.is_empty());

    if let Some(raw) = attach {
        match parse_target(raw) {
            Ok(url) => return ForwardPlan::Attach(url),
            Err(e) => debug!(
                notification_id = %notification.id(),
                attach_length = raw.len(),
                reason = %e,
                "attach_not_a_target"
            ),
        }
    }

    ForwardPlan::Static(static_targets.to_vec())
}
