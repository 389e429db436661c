//! Leader-election loop over the fenced chat-leader lease (§4.5).

use std::sync::Arc;

use async_trait::async_trait;
use ttsrelay_protocol::LEASE_RENEW_INTERVAL_SECS;
use ttsrelay_store::SqliteLeaseStore;

/// What the lease loop drives on acquisition/loss: starting/stopping the
/// chat client. A trait boundary keeps this module ignorant of the
/// transport/recovery state machine it controls.
#[async_trait]
pub trait LeaseHolder: Send + Sync {
    async fn on_acquired(&self);
    async fn on_lost(&self);
}

/// Every [`LEASE_RENEW_INTERVAL_SECS`], attempt to acquire or renew the
/// lease; call back on acquisition and loss transitions. Runs until the
/// given cancellation signal resolves.
pub async fn run_lease_loop(
    store: Arc<SqliteLeaseStore>,
    holder_id: String,
    holder: Arc<dyn LeaseHolder>,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut held = false;
    let mut interval = tokio::time::interval(std::time::Duration::from_secs(LEASE_RENEW_INTERVAL_SECS));

    loop {
        tokio::select! {
            _ = interval.tick() => {
                let acquired = store.try_acquire_or_renew(&holder_id).await.unwrap_or(false);
                if acquired && !held {
                    tracing::info!(holder_id = %holder_id, "chat leader lease acquired");
                    holder.on_acquired().await;
                } else if !acquired && held {
                    tracing::warn!(holder_id = %holder_id, "chat leader lease lost");
                    holder.on_lost().await;
                }
                held = acquired;
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    if held {
                        let _ = store.release(&holder_id).await;
                        holder.on_lost().await;
                    }
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use sqlx::SqlitePool;

    use super::*;

    struct CountingHolder {
        acquired: AtomicUsize,
        lost: AtomicUsize,
    }

    #[async_trait]
    impl LeaseHolder for CountingHolder {
        async fn on_acquired(&self) {
            self.acquired.fetch_add(1, Ordering::SeqCst);
        }

        async fn on_lost(&self) {
            self.lost.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn acquires_lease_on_first_tick_and_releases_on_shutdown() {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        ttsrelay_store::schema::init(&pool).await.unwrap();
        let store = Arc::new(SqliteLeaseStore::new(pool));
        let holder = Arc::new(CountingHolder { acquired: AtomicUsize::new(0), lost: AtomicUsize::new(0) });
        let (tx, rx) = tokio::sync::watch::channel(false);

        let task = tokio::spawn(run_lease_loop(store.clone(), "replica-a".to_string(), holder.clone(), rx));

        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        let _ = task.await;

        assert_eq!(holder.acquired.load(Ordering::SeqCst), 1);
        assert_eq!(holder.lost.load(Ordering::SeqCst), 1);
        assert!(store.current_holder().await.unwrap().is_none());
    }
}
