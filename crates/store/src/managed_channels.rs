use sqlx::SqlitePool;

use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ManagedChannel {
    pub login: String,
    pub is_active: bool,
    pub overlay_token: Option<String>,
}

#[derive(sqlx::FromRow)]
struct ManagedChannelRow {
    login: String,
    is_active: i64,
    overlay_token: Option<String>,
}

impl From<ManagedChannelRow> for ManagedChannel {
    fn from(r: ManagedChannelRow) -> Self {
        Self {
            login: r.login,
            is_active: r.is_active != 0,
            overlay_token: r.overlay_token,
        }
    }
}

/// SQLite-backed `managedChannels/{login}` collection (§6). The chat-ingress
/// channel sync (§4.5) polls [`list_active`] on a short interval to emulate
/// the document store's live add/modify listener, since SQLite has no native
/// change feed.
pub struct SqliteManagedChannelsStore {
    pool: SqlitePool,
}

impl SqliteManagedChannelsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn set_active(&self, login: &str, is_active: bool) -> Result<()> {
        let now = ttsrelay_common::time::now_secs();
        sqlx::query(
            r#"INSERT INTO managed_channels (login, is_active, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(login) DO UPDATE SET
                 is_active = excluded.is_active,
                 updated_at = excluded.updated_at"#,
        )
        .bind(login.to_lowercase())
        .bind(is_active as i64)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list_active(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT login FROM managed_channels WHERE is_active = 1")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().map(|(l,)| l).collect())
    }

    pub async fn list_all(&self) -> Result<Vec<ManagedChannel>> {
        let rows = sqlx::query_as::<_, ManagedChannelRow>(
            "SELECT login, is_active, overlay_token FROM managed_channels",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(&self, login: &str) -> Result<Option<ManagedChannel>> {
        let row = sqlx::query_as::<_, ManagedChannelRow>(
            "SELECT login, is_active, overlay_token FROM managed_channels WHERE login = ?",
        )
        .bind(login.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Into::into))
    }

    pub async fn set_overlay_token(&self, login: &str, overlay_token: Option<&str>) -> Result<()> {
        let now = ttsrelay_common::time::now_secs();
        sqlx::query(
            r#"INSERT INTO managed_channels (login, is_active, overlay_token, updated_at)
               VALUES (?, 1, ?, ?)
               ON CONFLICT(login) DO UPDATE SET
                 overlay_token = excluded.overlay_token,
                 updated_at = excluded.updated_at"#,
        )
        .bind(login.to_lowercase())
        .bind(overlay_token)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
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
    async fn list_active_excludes_inactive() {
        let store = SqliteManagedChannelsStore::new(test_pool().await);
        store.set_active("alice", true).await.unwrap();
        store.set_active("bob", false).await.unwrap();

        let active = store.list_active().await.unwrap();
        assert_eq!(active, vec!["alice".to_string()]);
    }

    #[tokio::test]
    async fn set_active_is_idempotent_upsert() {
        let store = SqliteManagedChannelsStore::new(test_pool().await);
        store.set_active("alice", true).await.unwrap();
        store.set_active("alice", false).await.unwrap();

        assert!(store.list_active().await.unwrap().is_empty());
        assert_eq!(store.list_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn overlay_token_defaults_to_none_and_can_be_set() {
        let store = SqliteManagedChannelsStore::new(test_pool().await);
        store.set_active("alice", true).await.unwrap();
        assert_eq!(store.get("alice").await.unwrap().unwrap().overlay_token, None);

        store.set_overlay_token("alice", Some("secret-token")).await.unwrap();
        let channel = store.get("alice").await.unwrap().unwrap();
        assert_eq!(channel.overlay_token.as_deref(), Some("secret-token"));
        assert!(channel.is_active);
    }

    #[tokio::test]
    async fn get_on_unknown_login_is_none() {
        let store = SqliteManagedChannelsStore::new(test_pool().await);
        assert!(store.get("nobody").await.unwrap().is_none());
    }
}
