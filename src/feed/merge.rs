use crate::feed::Entry;
use crate::store::StoredEntry;
use crate::util::url::canonicalize;
use std::collections::HashSet;

/// Decides which fetched entries are new relative to a feed's stored entries.
///
/// An entry is new when it is published strictly after the newest stored
/// entry (epoch zero when the feed is empty) **and** its canonical URL has
/// never been seen in the feed. Both filters are required: the date bounds
/// the candidate set cheaply, while the URL guard catches feeds that
/// re-publish old entries with a bumped timestamp. An entry older than the
/// newest stored one is dropped even when its URL is unseen.
///
/// Never removes anything; merging the same fetched set twice adds nothing
/// the second time. Returns exactly the entries that should be added.
pub fn plan_new_entries(existing: &[StoredEntry], fetched: Vec<Entry>) -> Vec<Entry> {
    let latest_existing = existing.iter().map(|e| e.published).max().unwrap_or(0);
    let seen: HashSet<&str> = existing.iter().map(|e| e.canonical_url.as_str()).collect();

    fetched
        .into_iter()
        .filter(|entry| entry.published_at.timestamp() > latest_existing)
        .filter(|entry| !seen.contains(canonicalize(&entry.url).as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use url::Url;

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn stored(url: &str, published: i64) -> StoredEntry {
        let parsed = Url::parse(url).unwrap();
        StoredEntry {
            id: 0,
            feed_id: 1,
            url: url.to_owned(),
            canonical_url: canonicalize(&parsed).into_string(),
            title: "stored".to_owned(),
            published,
            content: None,
            read: false,
        }
    }

    fn fetched(url: &str, published: i64) -> Entry {
        Entry {
            url: Url::parse(url).unwrap(),
            title: "fetched".to_owned(),
            published_at: ts(published),
            content: None,
        }
    }

    #[test]
    fn only_the_strictly_newer_unseen_entry_is_added() {
        let existing = vec![
            stored("https://example.com/1", 100),
            stored("https://example.com/2", 200),
        ];
        let incoming = vec![
            fetched("https://example.com/1", 100),
            fetched("https://example.com/2", 200),
            fetched("https://example.com/3", 300),
        ];

        let added = plan_new_entries(&existing, incoming);
        assert_eq!(added.len(), 1);
        assert_eq!(added[0].url.as_str(), "https://example.com/3");
    }

    #[test]
    fn empty_feed_accepts_everything() {
        let incoming = vec![
            fetched("https://example.com/1", 1),
            fetched("https://example.com/2", 2),
        ];
        assert_eq!(plan_new_entries(&[], incoming).len(), 2);
    }

    #[test]
    fn republished_entry_with_bumped_timestamp_is_not_added() {
        let existing = vec![stored("https://example.com/1", 100)];
        let incoming = vec![fetched("https://example.com/1", 500)];
        assert!(plan_new_entries(&existing, incoming).is_empty());
    }

    #[test]
    fn url_match_ignores_query_order_and_trailing_slash() {
        let existing = vec![stored("https://example.com/post?a=1&b=2", 100)];
        let incoming = vec![fetched("https://example.com/post/?b=2&a=1", 500)];
        assert!(plan_new_entries(&existing, incoming).is_empty());
    }

    #[test]
    fn old_entry_with_unseen_url_is_dropped() {
        // Deliberate: the date filter applies even to never-seen URLs
        let existing = vec![stored("https://example.com/new", 1000)];
        let incoming = vec![fetched("https://example.com/backfill", 50)];
        assert!(plan_new_entries(&existing, incoming).is_empty());
    }

    #[test]
    fn remerging_already_merged_entries_adds_nothing() {
        let existing = vec![stored("https://example.com/1", 100)];
        let incoming = vec![
            fetched("https://example.com/1", 100),
            fetched("https://example.com/2", 200),
        ];

        let added = plan_new_entries(&existing, incoming.clone());
        assert_eq!(added.len(), 1);

        // Simulate persisting the addition, then merge the same set again
        let mut after: Vec<StoredEntry> = existing;
        after.push(stored("https://example.com/2", 200));
        assert!(plan_new_entries(&after, incoming).is_empty());
    }
}
