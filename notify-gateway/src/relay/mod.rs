//! Relay module: where a verified notification goes and how it gets there.
//!
//! ## Relay Flow
//!
//! ```text
//! VerifiedNotification → resolve() → ForwardPlan → dispatch() → Vec<Delivery> | ForwardError
//! ```

pub mod dispatch;
pub mod forward;
pub mod resolve;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use dispatch::dispatch;
pub use forward::{forwardable_headers, Delivery, ForwardError, ForwardOutcome, Forwarder};
pub use resolve::{parse_target, resolve, ForwardPlan, TargetError};
