use anyhow::Result;
use url::Url;

use super::schema::Store;
use super::types::{FeedUpdate, NewEntry, RunRecord, StoredEntry, StoredFeed};
use crate::util::url::{canonicalize, CanonicalUrl};

impl Store {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert a feed, or update its metadata if the URL is already known.
    /// Returns the feed's id either way.
    pub async fn insert_feed(
        &self,
        url: &Url,
        title: &str,
        page_url: Option<&str>,
        overview: Option<&str>,
        image_url: Option<&str>,
    ) -> Result<i64> {
        let canonical = canonicalize(url);
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (url, canonical_url, title, page_url, overview, image_url)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                title = excluded.title,
                page_url = excluded.page_url,
                overview = excluded.overview,
                image_url = excluded.image_url
            RETURNING id
        "#,
        )
        .bind(url.as_str())
        .bind(canonical.as_str())
        .bind(title)
        .bind(page_url)
        .bind(overview)
        .bind(image_url)
        .fetch_one(&self.pool)
        .await?;
        Ok(row.0)
    }

    /// All subscribed feeds, ordered by title.
    pub async fn all_feeds(&self) -> Result<Vec<StoredFeed>> {
        let feeds = sqlx::query_as::<_, StoredFeed>(
            r#"
            SELECT id, url, canonical_url, title, page_url, overview, image_url
            FROM feeds
            ORDER BY title
        "#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(feeds)
    }

    /// Look up a feed by its canonical URL ("already subscribed" check).
    pub async fn find_feed_by_canonical(&self, key: &CanonicalUrl) -> Result<Option<StoredFeed>> {
        let feed = sqlx::query_as::<_, StoredFeed>(
            r#"
            SELECT id, url, canonical_url, title, page_url, overview, image_url
            FROM feeds
            WHERE canonical_url = ?
        "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(feed)
    }

    /// Delete a feed; entries cascade. Returns the number of feed rows removed.
    pub async fn delete_feed(&self, feed_id: i64) -> Result<u64> {
        let result = sqlx::query("DELETE FROM feeds WHERE id = ?")
            .bind(feed_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Entry Operations
    // ========================================================================

    /// A feed's entries, newest first (the order merge comparisons expect).
    pub async fn entries_for_feed(&self, feed_id: i64) -> Result<Vec<StoredEntry>> {
        let entries = sqlx::query_as::<_, StoredEntry>(
            r#"
            SELECT id, feed_id, url, canonical_url, title, published, content, read
            FROM entries
            WHERE feed_id = ?
            ORDER BY published DESC
        "#,
        )
        .bind(feed_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// Insert entries for a feed outside a refresh cycle (initial subscribe).
    /// Returns the number actually inserted.
    pub async fn insert_entries(&self, feed_id: i64, entries: &[NewEntry]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let inserted = insert_entries_tx(&mut tx, feed_id, entries).await?;
        tx.commit().await?;
        Ok(inserted)
    }

    /// Mark an entry as read. Read state only influences dedup tie-breaks.
    pub async fn mark_entry_read(&self, entry_id: i64) -> Result<()> {
        sqlx::query("UPDATE entries SET read = 1 WHERE id = ?")
            .bind(entry_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // ========================================================================
    // Refresh Commit
    // ========================================================================

    /// Persist an entire refresh cycle atomically: metadata updates and new
    /// entries for every fetched feed, the run's history record, and the
    /// cooldown marker. A failure anywhere rolls the whole cycle back,
    /// leaving the store at its pre-refresh snapshot with the marker unset.
    ///
    /// Returns the number of entries actually inserted.
    pub async fn commit_refresh(
        &self,
        updates: &[FeedUpdate],
        record: &RunRecord,
    ) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0usize;

        for update in updates {
            sqlx::query(
                r#"
                UPDATE feeds
                SET title = ?, page_url = ?, overview = ?,
                    image_url = COALESCE(?, image_url)
                WHERE id = ?
            "#,
            )
            .bind(&update.title)
            .bind(&update.page_url)
            .bind(&update.overview)
            .bind(&update.image_url)
            .bind(update.feed_id)
            .execute(&mut *tx)
            .await?;

            inserted += insert_entries_tx(&mut tx, update.feed_id, &update.additions).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO refresh_history (started_at, finished_at, error_message, added_titles)
            VALUES (?, ?, ?, ?)
        "#,
        )
        .bind(record.started_at)
        .bind(record.finished_at)
        .bind(&record.error_message)
        .bind(serde_json::to_string(&record.added_titles)?)
        .execute(&mut *tx)
        .await?;

        // Marker lands in the same transaction, so it exists only when the
        // save succeeded
        sqlx::query(
            r#"
            INSERT INTO meta (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
        )
        .bind(super::history::LAST_REFRESH_KEY)
        .bind(record.finished_at.to_string())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(inserted)
    }
}

async fn insert_entries_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    feed_id: i64,
    entries: &[NewEntry],
) -> Result<usize> {
    let mut inserted = 0usize;
    for entry in entries {
        let result = sqlx::query(
            r#"
            INSERT INTO entries (feed_id, url, canonical_url, title, published, content)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(feed_id, canonical_url) DO NOTHING
        "#,
        )
        .bind(feed_id)
        .bind(&entry.url)
        .bind(&entry.canonical_url)
        .bind(&entry.title)
        .bind(entry.published)
        .bind(&entry.content)
        .execute(&mut **tx)
        .await?;

        if result.rows_affected() > 0 {
            inserted += 1;
        }
    }
    Ok(inserted)
}
