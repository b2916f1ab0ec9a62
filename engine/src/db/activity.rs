/// SQLite-backed activity log
///
/// All queries use bound parameters.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sdk::errors::UpdateError;
use sdk::types::{ActivityEntry, ActivityResult};
use sqlx::{Row, SqlitePool};

use crate::activity_log::ActivityLog;

/// Activity log stored in the `activity_log` table
#[derive(Clone)]
pub struct SqliteActivityLog {
    pool: SqlitePool,
}

impl SqliteActivityLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert one entry, returning the database error if any
    pub async fn insert(&self, entry: &ActivityEntry) -> Result<(), UpdateError> {
        sqlx::query(
            "INSERT INTO activity_log (timestamp, action, result, message) VALUES (?, ?, ?, ?)",
        )
        .bind(entry.timestamp.timestamp_millis())
        .bind(&entry.action)
        .bind(entry.result.as_str())
        .bind(&entry.message)
        .execute(&self.pool)
        .await
        .map_err(|e| UpdateError::Database(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl ActivityLog for SqliteActivityLog {
    async fn record(&self, entry: ActivityEntry) {
        if let Err(e) = self.insert(&entry).await {
            tracing::warn!(
                "Failed to persist activity entry '{}': {}",
                entry.action,
                e
            );
        }
    }

    async fn recent(&self, limit: usize) -> Result<Vec<ActivityEntry>, UpdateError> {
        let rows = sqlx::query(
            "SELECT timestamp, action, result, message FROM activity_log ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| UpdateError::Database(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let millis: i64 = row.get("timestamp");
            let result: String = row.get("result");
            entries.push(ActivityEntry {
                timestamp: DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or_default(),
                action: row.get("action"),
                result: ActivityResult::parse(&result).unwrap_or(ActivityResult::Failure),
                message: row.get("message"),
            });
        }

        Ok(entries)
    }
}
