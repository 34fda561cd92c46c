use anyhow::Result;

use super::schema::Store;
use super::types::{HistoryRecord, HistoryRow};

/// Meta key holding the unix timestamp of the last successful full refresh.
pub(crate) const LAST_REFRESH_KEY: &str = "refresh.last_completed_at";

impl Store {
    // ========================================================================
    // Cooldown Marker
    // ========================================================================

    /// Timestamp of the last successful full refresh, if any.
    pub async fn last_refresh_at(&self) -> Result<Option<i64>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM meta WHERE key = ?")
            .bind(LAST_REFRESH_KEY)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.and_then(|(value,)| value.parse().ok()))
    }

    /// Clear the cooldown marker (the `force` path of a refresh).
    pub async fn clear_last_refresh(&self) -> Result<()> {
        sqlx::query("DELETE FROM meta WHERE key = ?")
            .bind(LAST_REFRESH_KEY)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Refresh History
    // ========================================================================

    /// Most recent refresh runs, newest first.
    pub async fn recent_history(&self, limit: i64) -> Result<Vec<HistoryRecord>> {
        let rows = sqlx::query_as::<_, HistoryRow>(
            r#"
            SELECT id, started_at, finished_at, error_message, added_titles
            FROM refresh_history
            ORDER BY started_at DESC
            LIMIT ?
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(HistoryRow::into_record).collect())
    }
}
