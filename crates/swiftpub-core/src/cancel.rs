//! Cancellation plumbing shared by the network and subprocess layers.

use std::future::Future;

use tokio_util::sync::CancellationToken;

/// Drive `fut` to completion unless `cancel` fires first.
///
/// Returns `None` on cancellation; the future is dropped, which aborts an
/// in-flight request or kills a `kill_on_drop` child.
pub(crate) async fn or_cancel<F: Future>(cancel: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => None,
        out = fut => Some(out),
    }
}
