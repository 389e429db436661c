//! Graceful shutdown primitives (§5): a `watch<bool>` broadcasts the
//! shutting-down flag to every long-running task, and `with_graceful_shutdown`
//! on the HTTP server waits on the same signal.

use tokio::sync::watch;

/// Resolves once `rx` observes `true`, for `axum::serve::with_graceful_shutdown`.
pub async fn wait_for_true(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow() {
            return;
        }
        if rx.changed().await.is_err() {
            return;
        }
    }
}
