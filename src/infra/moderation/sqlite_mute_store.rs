// SQLite-backed mute store.
//
// Tables:
// - mutes: one row per muted sender. `end_time` is epoch milliseconds and only
//   meaningful when `is_paused` is false; `paused_time_remaining` (ms) only
//   when it is true.

use crate::core::moderation::{
    MuteRecord, MuteState, MuteStore, SenderId, StoreError, MAX_DURATION_SECS,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Pool, Row, Sqlite};
use std::collections::HashMap;
use std::path::Path;
use uuid::Uuid;

fn db_err(e: sqlx::Error) -> StoreError {
    StoreError::Database(e.to_string())
}

pub struct SqliteMuteStore {
    pool: Pool<Sqlite>,
}

impl SqliteMuteStore {
    /// Open (creating if needed) a database file and run migrations.
    pub async fn new(database_url: &str) -> Result<Self, StoreError> {
        // Ensure the file exists if it's a file path
        let path_str = database_url.trim_start_matches("sqlite://");
        if !database_url.contains(":memory:") && !Path::new(path_str).exists() {
            if let Some(parent) = Path::new(path_str).parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::File::create(path_str)?;
        }

        let conn_str = if database_url.starts_with("sqlite:") {
            database_url.to_string()
        } else {
            format!("sqlite://{}", database_url)
        };

        let pool = SqlitePoolOptions::new()
            .connect(&conn_str)
            .await
            .map_err(db_err)?;

        let store = Self::from_pool(pool);
        store.migrate().await?;
        Ok(store)
    }

    pub fn from_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS mutes (
                uuid TEXT PRIMARY KEY,
                end_time INTEGER NOT NULL,
                original_duration INTEGER NOT NULL,
                is_paused BOOLEAN NOT NULL,
                paused_time_remaining INTEGER NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    /// Delete running mutes whose end time has passed. Returns rows removed.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM mutes WHERE end_time <= ? AND is_paused = 0")
            .bind(now.timestamp_millis())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected())
    }
}

#[async_trait]
impl MuteStore for SqliteMuteStore {
    async fn save(&self, sender: SenderId, record: MuteRecord) -> Result<(), StoreError> {
        let (end_time, is_paused, paused_remaining) = match record.state {
            MuteState::Active { ends_at } => (ends_at.timestamp_millis(), false, 0),
            MuteState::Paused { remaining_ms } => (0, true, remaining_ms),
        };

        sqlx::query(
            r#"
            INSERT INTO mutes (uuid, end_time, original_duration, is_paused, paused_time_remaining)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(uuid) DO UPDATE SET
                end_time = excluded.end_time,
                original_duration = excluded.original_duration,
                is_paused = excluded.is_paused,
                paused_time_remaining = excluded.paused_time_remaining
            "#,
        )
        .bind(sender.to_string())
        .bind(end_time)
        .bind(record.original_duration_secs.min(MAX_DURATION_SECS) as i64)
        .bind(is_paused)
        .bind(paused_remaining)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    async fn delete(&self, sender: SenderId) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM mutes WHERE uuid = ?")
            .bind(sender.to_string())
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn load_all(&self) -> Result<HashMap<SenderId, MuteRecord>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT uuid, end_time, original_duration, is_paused, paused_time_remaining
            FROM mutes
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        let mut mutes = HashMap::new();
        for row in rows {
            let key: String = row.get("uuid");
            let Ok(sender) = Uuid::parse_str(&key) else {
                tracing::warn!("Invalid UUID in mutes table: {}", key);
                continue;
            };

            let is_paused: bool = row.get("is_paused");
            let state = if is_paused {
                MuteState::Paused {
                    remaining_ms: row.get::<i64, _>("paused_time_remaining"),
                }
            } else {
                let end_time: i64 = row.get("end_time");
                let Some(ends_at) = DateTime::from_timestamp_millis(end_time) else {
                    tracing::warn!("Invalid end time for {} in mutes table", key);
                    continue;
                };
                MuteState::Active { ends_at }
            };

            mutes.insert(
                sender,
                MuteRecord {
                    original_duration_secs: row
                        .get::<i64, _>("original_duration")
                        .clamp(0, MAX_DURATION_SECS as i64)
                        as u64,
                    state,
                },
            );
        }
        Ok(mutes)
    }
}
