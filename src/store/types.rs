use crate::feed::Entry;
use crate::util::url::canonicalize;
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Store-specific errors with user-facing messages
#[derive(Debug, Error)]
pub enum StoreError {
    /// Another process has the database locked
    #[error("another rivulet instance appears to be running; close it and try again")]
    InstanceLocked,

    /// Migration failed
    #[error("store migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("store error: {0}")]
    Other(#[from] sqlx::Error),
}

impl StoreError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let message = err.to_string().to_lowercase();

        // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
        if message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
        {
            return StoreError::InstanceLocked;
        }

        StoreError::Other(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// Feed row as persisted.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredFeed {
    pub id: i64,
    pub url: String,
    /// Identity key; unique across the store after a dedup pass
    pub canonical_url: String,
    pub title: String,
    pub page_url: Option<String>,
    pub overview: Option<String>,
    pub image_url: Option<String>,
}

/// Entry row as persisted. `published` is a unix timestamp; `read` exists
/// so the dedup pass can prefer the record the user has interacted with.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEntry {
    pub id: i64,
    pub feed_id: i64,
    pub url: String,
    pub canonical_url: String,
    pub title: String,
    pub published: i64,
    pub content: Option<String>,
    pub read: bool,
}

/// Entry staged for insertion during a refresh commit.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub url: String,
    pub canonical_url: String,
    pub title: String,
    pub published: i64,
    pub content: Option<String>,
}

impl From<Entry> for NewEntry {
    fn from(entry: Entry) -> Self {
        let canonical_url = canonicalize(&entry.url).into_string();
        NewEntry {
            url: entry.url.into(),
            canonical_url,
            title: entry.title,
            published: entry.published_at.timestamp(),
            content: entry.content,
        }
    }
}

/// One feed's outcome of the fetch phase, applied by `commit_refresh`.
#[derive(Debug, Clone)]
pub struct FeedUpdate {
    pub feed_id: i64,
    pub title: String,
    pub page_url: Option<String>,
    pub overview: Option<String>,
    pub image_url: Option<String>,
    pub additions: Vec<NewEntry>,
}

/// Summary of a refresh run, written alongside its mutations.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub started_at: i64,
    pub finished_at: i64,
    pub error_message: Option<String>,
    pub added_titles: Vec<String>,
}

/// Refresh history row for operator visibility.
#[derive(Debug, Clone)]
pub struct HistoryRecord {
    pub id: i64,
    pub started_at: i64,
    pub finished_at: i64,
    pub error_message: Option<String>,
    pub added_titles: Vec<String>,
}

/// Internal row type for history queries; `added_titles` is stored as JSON.
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct HistoryRow {
    pub id: i64,
    pub started_at: i64,
    pub finished_at: i64,
    pub error_message: Option<String>,
    pub added_titles: String,
}

impl HistoryRow {
    pub(crate) fn into_record(self) -> HistoryRecord {
        let added_titles = serde_json::from_str(&self.added_titles).unwrap_or_default();
        HistoryRecord {
            id: self.id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            error_message: self.error_message,
            added_titles,
        }
    }
}
