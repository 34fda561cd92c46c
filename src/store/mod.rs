//! Persistent feed/entry store backed by SQLite.
//!
//! The store is the engine's single mutable collaborator. All refresh
//! mutations land through [`Store::commit_refresh`] in one transaction per
//! cycle; a failed save rolls the cycle back and leaves the cooldown marker
//! untouched. [`Store::deduplicate`] is the maintenance pass that collapses
//! duplicate feed and entry records by canonical URL.

mod feeds;
mod history;
mod maintenance;
mod schema;
mod types;

pub use maintenance::DedupReport;
pub use schema::Store;
pub use types::{FeedUpdate, HistoryRecord, NewEntry, RunRecord, StoreError, StoredEntry, StoredFeed};
