use anyhow::Result;
use std::collections::HashMap;

use super::schema::Store;

/// What a dedup pass removed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DedupReport {
    pub feeds_removed: usize,
    pub entries_removed: usize,
    pub orphans_removed: usize,
}

impl DedupReport {
    pub fn is_clean(&self) -> bool {
        self.feeds_removed == 0 && self.entries_removed == 0 && self.orphans_removed == 0
    }
}

/// Row shapes the pass groups over.
#[derive(sqlx::FromRow)]
struct FeedKeyRow {
    id: i64,
    canonical_url: String,
}

#[derive(sqlx::FromRow)]
struct EntryKeyRow {
    id: i64,
    canonical_url: String,
    read: bool,
}

impl Store {
    /// Collapse duplicate feed and entry records by canonical URL.
    ///
    /// Feed groups keep the member with the most entries; entry groups keep
    /// a read member over unread ones (read state marks the record the user
    /// interacted with), smallest id as the deterministic tie-break. Entries
    /// left without an owning feed are swept last. The whole pass commits
    /// atomically; any failure rolls everything back.
    pub async fn deduplicate(&self) -> Result<DedupReport> {
        let mut tx = self.pool.begin().await?;
        let mut report = DedupReport::default();

        // --- duplicate feeds ---
        let feeds: Vec<FeedKeyRow> =
            sqlx::query_as("SELECT id, canonical_url FROM feeds ORDER BY id")
                .fetch_all(&mut *tx)
                .await?;

        let counts: Vec<(i64, i64)> =
            sqlx::query_as("SELECT feed_id, COUNT(*) FROM entries GROUP BY feed_id")
                .fetch_all(&mut *tx)
                .await?;
        let entry_counts: HashMap<i64, i64> = counts.into_iter().collect();

        let mut feed_groups: HashMap<String, Vec<i64>> = HashMap::new();
        for feed in feeds {
            feed_groups.entry(feed.canonical_url).or_default().push(feed.id);
        }

        let mut doomed_feeds = Vec::new();
        for (_, ids) in feed_groups {
            if ids.len() < 2 {
                continue;
            }
            let Some(keep) = ids
                .iter()
                .copied()
                .max_by_key(|id| (entry_counts.get(id).copied().unwrap_or(0), -id))
            else {
                continue;
            };
            doomed_feeds.extend(ids.into_iter().filter(|&id| id != keep));
        }

        for feed_id in &doomed_feeds {
            // ON DELETE CASCADE removes the loser's entries with it
            sqlx::query("DELETE FROM feeds WHERE id = ?")
                .bind(feed_id)
                .execute(&mut *tx)
                .await?;
        }
        report.feeds_removed = doomed_feeds.len();

        // --- duplicate entries (grouped store-wide, post feed-dedup) ---
        let entries: Vec<EntryKeyRow> =
            sqlx::query_as("SELECT id, canonical_url, read FROM entries ORDER BY id")
                .fetch_all(&mut *tx)
                .await?;

        let mut entry_groups: HashMap<String, Vec<(i64, bool)>> = HashMap::new();
        for entry in entries {
            entry_groups
                .entry(entry.canonical_url)
                .or_default()
                .push((entry.id, entry.read));
        }

        let mut doomed_entries = Vec::new();
        for (_, members) in entry_groups {
            if members.len() < 2 {
                continue;
            }
            // Any read member beats any unread one; then smallest id
            let Some(keep) = members
                .iter()
                .max_by_key(|(id, read)| (*read, -id))
                .map(|(id, _)| *id)
            else {
                continue;
            };
            doomed_entries.extend(members.into_iter().filter(|(id, _)| *id != keep).map(|(id, _)| id));
        }

        for entry_id in &doomed_entries {
            sqlx::query("DELETE FROM entries WHERE id = ?")
                .bind(entry_id)
                .execute(&mut *tx)
                .await?;
        }
        report.entries_removed = doomed_entries.len();

        // --- orphan sweep ---
        let result = sqlx::query("DELETE FROM entries WHERE feed_id NOT IN (SELECT id FROM feeds)")
            .execute(&mut *tx)
            .await?;
        report.orphans_removed = result.rows_affected() as usize;

        tx.commit().await?;

        if !report.is_clean() {
            tracing::info!(
                feeds_removed = report.feeds_removed,
                entries_removed = report.entries_removed,
                orphans_removed = report.orphans_removed,
                "store dedup pass removed duplicates"
            );
        }

        Ok(report)
    }
}
