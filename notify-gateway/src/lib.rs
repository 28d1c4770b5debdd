//! Notify Gateway - verifying relay for WeChat Pay payment notifications.
//!
//! The gateway receives a signed WeChat Pay API v3 notification, verifies
//! and decrypts it, then forwards the untouched request to one or more
//! downstream services. WeChat Pay only sees success once every downstream
//! accepted the notification.
//!
//! ## Architecture
//!
//! ```text
//! WeChat Pay → POST /notify → NotifyVerifier → resolve() → dispatch() → targets
//! ```

pub mod config;
pub mod relay;
pub mod web;
pub mod wechat;

// Re-export commonly used types
pub use config::{Config, ConfigError};
pub use relay::{Delivery, ForwardError, ForwardPlan, Forwarder};
pub use web::{router, AppState};
pub use wechat::{ApiV3Key, NotifyVerifier, VerificationError, VerificationKey, VerifiedNotification};
