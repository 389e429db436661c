use sqlx::SqlitePool;
use ttsrelay_protocol::VoiceOverride;

use crate::error::Result;

#[derive(sqlx::FromRow)]
struct PrefsRow {
    prefs: String,
}

/// SQLite-backed `ttsUserPreferences/{login}` collection (§6), global across
/// channels per the data model in §3.
pub struct SqliteViewerPrefsStore {
    pool: SqlitePool,
}

impl SqliteViewerPrefsStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, username: &str) -> Result<Option<VoiceOverride>> {
        let row = sqlx::query_as::<_, PrefsRow>(
            "SELECT prefs FROM tts_user_preferences WHERE username = ?",
        )
        .bind(username.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        match row {
            Some(r) => Ok(Some(serde_json::from_str(&r.prefs)?)),
            None => Ok(None),
        }
    }

    pub async fn upsert(&self, username: &str, prefs: &VoiceOverride) -> Result<()> {
        let json = serde_json::to_string(prefs)?;
        let now = ttsrelay_common::time::now_secs();
        sqlx::query(
            r#"INSERT INTO tts_user_preferences (username, prefs, updated_at)
               VALUES (?, ?, ?)
               ON CONFLICT(username) DO UPDATE SET
                 prefs = excluded.prefs,
                 updated_at = excluded.updated_at"#,
        )
        .bind(username.to_lowercase())
        .bind(json)
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
    async fn get_missing_prefs_is_none() {
        let store = SqliteViewerPrefsStore::new(test_pool().await);
        assert!(store.get("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upsert_then_get_round_trips() {
        let store = SqliteViewerPrefsStore::new(test_pool().await);
        let prefs = VoiceOverride {
            voice_id: Some("Wise_Woman".into()),
            ..Default::default()
        };
        store.upsert("Viewer1", &prefs).await.unwrap();

        let got = store.get("viewer1").await.unwrap().unwrap();
        assert_eq!(got.voice_id.as_deref(), Some("Wise_Woman"));
    }
}
