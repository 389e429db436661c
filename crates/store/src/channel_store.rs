use sqlx::SqlitePool;
use ttsrelay_protocol::Channel;

use crate::error::Result;

#[derive(sqlx::FromRow)]
struct ChannelRow {
    login: String,
    config: String,
    #[allow(dead_code)]
    updated_at: i64,
}

impl TryFrom<ChannelRow> for Channel {
    type Error = crate::error::Error;

    fn try_from(row: ChannelRow) -> Result<Self> {
        let mut channel: Channel = serde_json::from_str(&row.config)?;
        channel.login = row.login;
        Ok(channel)
    }
}

/// SQLite-backed `ttsChannelConfigs/{login}` collection (§6).
pub struct SqliteChannelStore {
    pool: SqlitePool,
}

impl SqliteChannelStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, login: &str) -> Result<Option<Channel>> {
        let row = sqlx::query_as::<_, ChannelRow>(
            "SELECT login, config, updated_at FROM tts_channel_configs WHERE login = ?",
        )
        .bind(login.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        row.map(TryInto::try_into).transpose()
    }

    pub async fn upsert(&self, channel: &Channel) -> Result<()> {
        let config_json = serde_json::to_string(channel)?;
        let now = ttsrelay_common::time::now_secs();
        sqlx::query(
            r#"INSERT INTO tts_channel_configs (login, config, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(login) DO UPDATE SET
                 config = excluded.config,
                 updated_at = excluded.updated_at"#,
        )
        .bind(channel.login.to_lowercase())
        .bind(config_json)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, login: &str) -> Result<()> {
        sqlx::query("DELETE FROM tts_channel_configs WHERE login = ?")
            .bind(login.to_lowercase())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<Channel>> {
        let rows = sqlx::query_as::<_, ChannelRow>(
            "SELECT login, config, updated_at FROM tts_channel_configs ORDER BY login",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TryInto::try_into).collect()
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
    async fn upsert_then_get_round_trips() {
        let store = SqliteChannelStore::new(test_pool().await);
        let mut ch = Channel::new("SomeStreamer");
        ch.engine_enabled = true;
        store.upsert(&ch).await.unwrap();

        let got = store.get("somestreamer").await.unwrap().unwrap();
        assert_eq!(got.login, "somestreamer");
        assert!(got.engine_enabled);
    }

    #[tokio::test]
    async fn upsert_updates_existing_row() {
        let store = SqliteChannelStore::new(test_pool().await);
        let mut ch = Channel::new("s");
        store.upsert(&ch).await.unwrap();
        ch.engine_enabled = true;
        store.upsert(&ch).await.unwrap();

        let got = store.get("s").await.unwrap().unwrap();
        assert!(got.engine_enabled);
        assert_eq!(store.list().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let store = SqliteChannelStore::new(test_pool().await);
        let ch = Channel::new("s");
        store.upsert(&ch).await.unwrap();
        store.delete("s").await.unwrap();
        assert!(store.get("s").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn get_nonexistent_is_none() {
        let store = SqliteChannelStore::new(test_pool().await);
        assert!(store.get("nope").await.unwrap().is_none());
    }
}
