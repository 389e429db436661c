use sqlx::SqlitePool;

use crate::error::Result;

/// Create the backing tables for the state-store collections named in §6.
/// Schema is also shipped as sqlx migrations for production deployments;
/// this is retained so in-memory test pools can self-initialize.
#[doc(hidden)]
pub async fn init(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS tts_channel_configs (
            login      TEXT    PRIMARY KEY,
            config     TEXT    NOT NULL,
            updated_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS tts_user_preferences (
            username   TEXT    PRIMARY KEY,
            prefs      TEXT    NOT NULL,
            updated_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS managed_channels (
            login         TEXT    PRIMARY KEY,
            is_active     INTEGER NOT NULL DEFAULT 1,
            overlay_token TEXT,
            updated_at    INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS chat_leader_lease (
            id         INTEGER PRIMARY KEY CHECK (id = 1),
            holder_id  TEXT    NOT NULL,
            updated_at INTEGER NOT NULL,
            expires_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS tts_queue_persistence (
            login      TEXT    PRIMARY KEY,
            snapshot   TEXT    NOT NULL,
            updated_at INTEGER NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
