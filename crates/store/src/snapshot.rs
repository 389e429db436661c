use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use ttsrelay_protocol::TtsWorkItem;

use crate::error::Result;

/// Per-channel `ttsQueuePersistence/{login}` record (§3), written on
/// graceful shutdown and consumed-then-deleted on startup restore.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub items: Vec<TtsWorkItem>,
    pub paused: bool,
}

#[derive(sqlx::FromRow)]
struct SnapshotRow {
    login: String,
    snapshot: String,
}

pub struct SqliteSnapshotStore {
    pool: SqlitePool,
}

impl SqliteSnapshotStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn save(&self, login: &str, snapshot: &QueueSnapshot) -> Result<()> {
        let json = serde_json::to_string(snapshot)?;
        let now = ttsrelay_common::time::now_secs();
        sqlx::query(
            r#"INSERT INTO tts_queue_persistence (login, snapshot, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(login) DO UPDATE SET
                 snapshot = excluded.snapshot,
                 updated_at = excluded.updated_at"#,
        )
        .bind(login.to_lowercase())
        .bind(json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Read and delete the snapshot for `login`, as restore-on-startup does.
    pub async fn take(&self, login: &str) -> Result<Option<QueueSnapshot>> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, SnapshotRow>(
            "SELECT login, snapshot FROM tts_queue_persistence WHERE login = ?",
        )
        .bind(login.to_lowercase())
        .fetch_optional(&mut *tx)
        .await?;

        let snapshot = match row {
            Some(r) => Some(serde_json::from_str(&r.snapshot)?),
            None => None,
        };

        if snapshot.is_some() {
            sqlx::query("DELETE FROM tts_queue_persistence WHERE login = ?")
                .bind(login.to_lowercase())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(snapshot)
    }

    /// Read and delete every persisted snapshot, as a full-restore pass does
    /// at process startup.
    pub async fn take_all(&self) -> Result<Vec<(String, QueueSnapshot)>> {
        let mut tx = self.pool.begin().await?;
        let rows =
            sqlx::query_as::<_, SnapshotRow>("SELECT login, snapshot FROM tts_queue_persistence")
                .fetch_all(&mut *tx)
                .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push((row.login, serde_json::from_str::<QueueSnapshot>(&row.snapshot)?));
        }
        sqlx::query("DELETE FROM tts_queue_persistence")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(out)
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use ttsrelay_protocol::{VoiceParams, WorkItemType};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        crate::schema::init(&pool).await.unwrap();
        pool
    }

    fn sample_item() -> TtsWorkItem {
        TtsWorkItem::new(
            "hello",
            "viewer1",
            WorkItemType::Chat,
            VoiceParams::system_default(),
            1,
        )
    }

    #[tokio::test]
    async fn save_then_take_round_trips_and_deletes() {
        let store = SqliteSnapshotStore::new(test_pool().await);
        let snapshot = QueueSnapshot {
            items: vec![sample_item()],
            paused: false,
        };
        store.save("c", &snapshot).await.unwrap();

        let got = store.take("c").await.unwrap().unwrap();
        assert_eq!(got, snapshot);
        assert!(store.take("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn take_all_drains_every_channel() {
        let store = SqliteSnapshotStore::new(test_pool().await);
        store
            .save("a", &QueueSnapshot { items: vec![], paused: false })
            .await
            .unwrap();
        store
            .save("b", &QueueSnapshot { items: vec![sample_item()], paused: true })
            .await
            .unwrap();

        let mut all = store.take_all().await.unwrap();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0, "a");
        assert_eq!(all[1].1.paused, true);
        assert!(store.take_all().await.unwrap().is_empty());
    }
}
