//! Concurrent refresh orchestration.
//!
//! A refresh cycle fetches every subscribed feed through a bounded-width
//! window, merges new entries in memory, and persists the whole cycle in a
//! single transaction. Cycles are rate-limited by a cooldown marker that is
//! only written when the save succeeds, so a failed cycle can be retried
//! immediately.

mod race;

pub use race::{with_deadline, RaceOutcome};

use anyhow::Result;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::mem;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use url::Url;

use crate::error::FeedError;
use crate::feed;
use crate::store::{FeedUpdate, RunRecord, Store, StoredFeed};

/// Time source for cooldown decisions. Injected so tests can steer the
/// clock without sleeping through a real cooldown window.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-feed result of one refresh cycle.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Feed fetched and merged; `added` entries were new.
    Success { added: usize },
    /// Feed exceeded its time budget on every attempt.
    Timeout,
    /// Feed failed with a non-timeout error on its final attempt.
    Error(FeedError),
}

/// Summary of a completed refresh cycle.
#[derive(Debug)]
pub struct RefreshRun {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Per-feed outcomes keyed by the feed's URL, in completion order.
    pub outcomes: Vec<(String, FetchOutcome)>,
    pub successes: usize,
    pub timeouts: usize,
    pub errors: usize,
    pub entries_added: usize,
}

/// Tunables for a refresh cycle.
#[derive(Debug, Clone)]
pub struct RefreshOptions {
    /// Maximum feeds fetched concurrently.
    pub batch_size: usize,
    /// Minimum gap between successful cycles.
    pub cooldown: Duration,
    /// How long to wait for an external sync gate before proceeding anyway.
    pub sync_wait: Duration,
}

impl Default for RefreshOptions {
    fn default() -> Self {
        Self {
            batch_size: 8,
            cooldown: Duration::from_secs(600),
            sync_wait: Duration::from_secs(2),
        }
    }
}

/// Drives refresh cycles against a store.
///
/// Clone-cheap: the store pool, HTTP client, and guard state are all
/// shared handles.
pub struct Refresher {
    store: Store,
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    options: RefreshOptions,
    refreshing: Arc<AtomicBool>,
    progress: watch::Sender<f32>,
    sync_settled: Option<Arc<Notify>>,
}

/// Resets the in-flight flag when a cycle exits, including on early
/// return or panic unwind.
struct RunGuard {
    refreshing: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.refreshing.store(false, Ordering::Release);
    }
}

impl Refresher {
    pub fn new(store: Store, client: reqwest::Client) -> Self {
        let (progress, _) = watch::channel(0.0);
        Self {
            store,
            client,
            clock: Arc::new(SystemClock),
            options: RefreshOptions::default(),
            refreshing: Arc::new(AtomicBool::new(false)),
            progress,
            sync_settled: None,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: RefreshOptions) -> Self {
        self.options = options;
        self
    }

    /// Gate the cycle on an external synchronization signal. The cycle
    /// waits up to `sync_wait` for the notify; a missed signal is logged
    /// and the cycle proceeds.
    pub fn with_sync_gate(mut self, settled: Arc<Notify>) -> Self {
        self.sync_settled = Some(settled);
        self
    }

    /// Fraction of the current cycle's feeds that have completed, 0.0 to 1.0.
    pub fn progress(&self) -> watch::Receiver<f32> {
        self.progress.subscribe()
    }

    /// Run one refresh cycle.
    ///
    /// Returns `Ok(None)` when the cycle was skipped: either another cycle
    /// is already in flight, or the cooldown window since the last
    /// successful cycle has not elapsed. `force` clears the cooldown marker
    /// first. `timeout` bounds each individual feed fetch; `retry_count` is
    /// the number of attempts per feed (minimum one, no backoff between
    /// attempts).
    pub async fn refresh(
        &self,
        force: bool,
        timeout: Duration,
        retry_count: u32,
    ) -> Result<Option<RefreshRun>> {
        if self
            .refreshing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("refresh already in flight, skipping");
            return Ok(None);
        }
        let _guard = RunGuard {
            refreshing: self.refreshing.clone(),
        };

        if force {
            self.store.clear_last_refresh().await?;
        } else if let Some(last) = self.store.last_refresh_at().await? {
            let elapsed = self.clock.now().timestamp().saturating_sub(last);
            if elapsed >= 0 && (elapsed as u64) < self.options.cooldown.as_secs() {
                tracing::info!(
                    elapsed_secs = elapsed,
                    cooldown_secs = self.options.cooldown.as_secs(),
                    "refresh still cooling down, skipping"
                );
                return Ok(None);
            }
        }

        if let Some(settled) = &self.sync_settled {
            if with_deadline(settled.notified(), self.options.sync_wait)
                .await
                .timed_out()
            {
                tracing::warn!(
                    wait_secs = self.options.sync_wait.as_secs(),
                    "sync gate did not settle in time, refreshing anyway"
                );
            }
        }

        let feeds = self.store.all_feeds().await?;
        let feeds = dedup_by_canonical(feeds);
        let started_at = self.clock.now();
        let total = feeds.len();
        let _ = self.progress.send(0.0);

        let retries = retry_count.max(1);
        let completed = Arc::new(AtomicUsize::new(0));
        let outcomes: Vec<(StoredFeed, FetchOutcome, Option<FeedUpdate>)> =
            run_window(feeds, self.options.batch_size, |feed| {
                let client = self.client.clone();
                let store = self.store.clone();
                let completed = completed.clone();
                let progress = self.progress.clone();
                async move {
                    let (outcome, update) =
                        fetch_with_retries(&client, &store, &feed, timeout, retries).await;
                    let done = completed.fetch_add(1, Ordering::Relaxed).saturating_add(1);
                    if total > 0 {
                        let _ = progress.send(done as f32 / total as f32);
                    }
                    (feed, outcome, update)
                }
            })
            .await;

        let finished_at = self.clock.now();
        let mut run = RefreshRun {
            started_at,
            finished_at,
            outcomes: Vec::with_capacity(outcomes.len()),
            successes: 0,
            timeouts: 0,
            errors: 0,
            entries_added: 0,
        };
        let mut updates = Vec::new();
        let mut added_titles = Vec::new();
        for (stored, outcome, update) in outcomes {
            match &outcome {
                FetchOutcome::Success { added } => {
                    run.successes += 1;
                    run.entries_added += added;
                }
                FetchOutcome::Timeout => run.timeouts += 1,
                FetchOutcome::Error(error) => {
                    tracing::warn!(url = %stored.url, error = %error, "feed refresh failed");
                    run.errors += 1;
                }
            }
            run.outcomes.push((stored.url, outcome));
            if let Some(update) = update {
                for entry in &update.additions {
                    added_titles.push(entry.title.clone());
                }
                updates.push(update);
            }
        }

        let record = RunRecord {
            started_at: started_at.timestamp(),
            finished_at: finished_at.timestamp(),
            error_message: if run.timeouts + run.errors > 0 {
                Some(format!(
                    "{} of {} feeds failed ({} timed out)",
                    run.timeouts + run.errors,
                    total,
                    run.timeouts
                ))
            } else {
                None
            },
            added_titles,
        };
        // A failed save rolls the cycle back; surface it under the same
        // taxonomy callers see for per-feed store failures
        self.store
            .commit_refresh(&updates, &record)
            .await
            .map_err(|e| FeedError::MergeConflict(e.to_string()))?;

        let _ = self.progress.send(1.0);
        tracing::info!(
            feeds = total,
            successes = run.successes,
            timeouts = run.timeouts,
            errors = run.errors,
            entries_added = run.entries_added,
            elapsed_secs = (finished_at - started_at).num_seconds(),
            "refresh cycle complete"
        );
        Ok(Some(run))
    }
}

/// Run `f` over `items` with at most `width` futures in flight, collecting
/// results in completion order.
pub(crate) async fn run_window<T, F, Fut, R>(items: Vec<T>, width: usize, f: F) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: Future<Output = R>,
{
    stream::iter(items)
        .map(f)
        .buffer_unordered(width.max(1))
        .collect()
        .await
}

/// Fetch one feed with a bounded retry loop. Each attempt races the per-feed
/// time budget; there is no backoff between attempts.
async fn fetch_with_retries(
    client: &reqwest::Client,
    store: &Store,
    feed: &StoredFeed,
    timeout: Duration,
    retries: u32,
) -> (FetchOutcome, Option<FeedUpdate>) {
    let mut attempt = 0;
    loop {
        attempt += 1;
        match with_deadline(fetch_and_merge(client, store, feed), timeout).await {
            RaceOutcome::Completed(Ok(update)) => {
                let added = update.additions.len();
                return (FetchOutcome::Success { added }, Some(update));
            }
            RaceOutcome::Completed(Err(error)) => {
                if attempt >= retries {
                    return (FetchOutcome::Error(error), None);
                }
                tracing::debug!(url = %feed.url, attempt = attempt, error = %error, "retrying feed");
            }
            RaceOutcome::TimedOut => {
                if attempt >= retries {
                    return (FetchOutcome::Timeout, None);
                }
                tracing::debug!(url = %feed.url, attempt = attempt, "feed timed out, retrying");
            }
        }
    }
}

/// Fetch a feed and plan its merge against the stored entries. Read-only:
/// the resulting [`FeedUpdate`] carries everything the commit needs.
async fn fetch_and_merge(
    client: &reqwest::Client,
    store: &Store,
    stored: &StoredFeed,
) -> Result<FeedUpdate, FeedError> {
    let url = Url::parse(&stored.url).map_err(|e| FeedError::Parse(e.to_string()))?;
    let mut fetched = feed::fetch_feed(client, &url).await?;
    let existing = store
        .entries_for_feed(stored.id)
        .await
        .map_err(|e| FeedError::MergeConflict(e.to_string()))?;
    let entries = mem::take(&mut fetched.entries);
    let additions = feed::plan_new_entries(&existing, entries)
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(FeedUpdate {
        feed_id: stored.id,
        title: fetched.title,
        page_url: fetched.page_url.map(|u| u.to_string()),
        overview: fetched.overview,
        image_url: fetched.image_url.map(|u| u.to_string()),
        additions,
    })
}

/// Collapse feeds that share a canonical URL, keeping the first by id order.
fn dedup_by_canonical(feeds: Vec<StoredFeed>) -> Vec<StoredFeed> {
    let mut seen = std::collections::HashSet::new();
    feeds
        .into_iter()
        .filter(|feed| seen.insert(feed.canonical_url.clone()))
        .collect()
}
