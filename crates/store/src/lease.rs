use sqlx::SqlitePool;
use ttsrelay_protocol::LEASE_TTL_SECS;

use crate::error::Result;

/// Transactional `system/chatLeader` lease (§3, §4.5). Acquisition succeeds
/// if the record is missing, expired, or already owned by `holder_id`;
/// otherwise it fails and the caller must stop its chat client.
pub struct SqliteLeaseStore {
    pool: SqlitePool,
}

impl SqliteLeaseStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Attempt to acquire or renew the lease for `holder_id`. Returns `true`
    /// iff this replica now holds the lease.
    pub async fn try_acquire_or_renew(&self, holder_id: &str) -> Result<bool> {
        let now = ttsrelay_common::time::now_secs();
        let expires_at = now + LEASE_TTL_SECS;

        let mut tx = self.pool.begin().await?;
        let existing: Option<(String, i64)> =
            sqlx::query_as("SELECT holder_id, expires_at FROM chat_leader_lease WHERE id = 1")
                .fetch_optional(&mut *tx)
                .await?;

        let may_acquire = match &existing {
            None => true,
            Some((holder, expires)) => holder == holder_id || now >= *expires,
        };

        if !may_acquire {
            tx.commit().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"INSERT INTO chat_leader_lease (id, holder_id, updated_at, expires_at)
               VALUES (1, ?, ?, ?)
               ON CONFLICT(id) DO UPDATE SET
                 holder_id = excluded.holder_id,
                 updated_at = excluded.updated_at,
                 expires_at = excluded.expires_at"#,
        )
        .bind(holder_id)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(true)
    }

    /// Release the lease if still held by `holder_id`, for a clean shutdown.
    pub async fn release(&self, holder_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM chat_leader_lease WHERE id = 1 AND holder_id = ?")
            .bind(holder_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn current_holder(&self) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT holder_id FROM chat_leader_lease WHERE id = 1")
                .fetch_optional(&self.pool)
                .await?;
        Ok(row.map(|(h,)| h))
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::schema::init(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn first_acquirer_wins() {
        let store = SqliteLeaseStore::new(test_pool().await);
        assert!(store.try_acquire_or_renew("replica-a").await.unwrap());
        assert_eq!(
            store.current_holder().await.unwrap().as_deref(),
            Some("replica-a")
        );
    }

    #[tokio::test]
    async fn second_replica_cannot_acquire_live_lease() {
        let store = SqliteLeaseStore::new(test_pool().await);
        store.try_acquire_or_renew("replica-a").await.unwrap();
        assert!(!store.try_acquire_or_renew("replica-b").await.unwrap());
    }

    #[tokio::test]
    async fn owner_can_renew() {
        let store = SqliteLeaseStore::new(test_pool().await);
        store.try_acquire_or_renew("replica-a").await.unwrap();
        assert!(store.try_acquire_or_renew("replica-a").await.unwrap());
    }

    #[tokio::test]
    async fn release_allows_other_replica_to_acquire() {
        let store = SqliteLeaseStore::new(test_pool().await);
        store.try_acquire_or_renew("replica-a").await.unwrap();
        store.release("replica-a").await.unwrap();
        assert!(store.try_acquire_or_renew("replica-b").await.unwrap());
    }
}
