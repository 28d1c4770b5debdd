//! Sequential, fail-fast fan-out of one notification.

use axum::body::Bytes;
use axum::http::HeaderMap;
use tracing::{info, warn};

use super::forward::{Delivery, ForwardError, Forwarder};
use super::resolve::ForwardPlan;

/// Forward to every target of `plan`, in order.
///
/// Stops at the first target that fails; later targets are not contacted.
/// Returns one [`Delivery`] per target when all of them succeed.
pub async fn dispatch(
    forwarder: &Forwarder,
    plan: &ForwardPlan,
    body: &Bytes,
    headers: &HeaderMap,
) -> Result<Vec<Delivery>, ForwardError> {
    let targets = plan.targets();
    let mut deliveries = Vec::with_capacity(targets.len());

    for (index, target) in targets.iter().enumerate() {
        match forwarder.forward(target, body, headers).await {
            Ok(delivery) => deliveries.push(delivery),
            Err(e) => {
                warn!(
                    url = %target,
                    source = plan.source(),
                    target_index = index,
                    target_count = targets.len(),
                    skipped = targets.len() - index - 1,
                    kind = e.kind(),
                    "dispatch_aborted"
                );
                return Err(e);
            }
        }
    }

    info!(
        source = plan.source(),
        target_count = targets.len(),
        "dispatch_complete"
    );

    Ok(deliveries)
}
