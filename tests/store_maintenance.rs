//! Dedup pass tests: duplicate feed collapse, entry read-preference, and
//! the orphan sweep report.

use chrono::{TimeZone, Utc};
use url::Url;

use rivulet::store::{NewEntry, Store};

fn entry(slug: &str, day: u32) -> NewEntry {
    let url = format!("https://blog.example.com/{slug}");
    NewEntry {
        url: url.clone(),
        canonical_url: url,
        title: slug.to_string(),
        published: Utc
            .with_ymd_and_hms(2026, 1, day, 8, 0, 0)
            .unwrap()
            .timestamp(),
        content: None,
    }
}

#[tokio::test]
async fn duplicate_feeds_keep_the_member_with_the_most_entries() {
    let store = Store::open(":memory:").await.unwrap();

    // Same feed subscribed twice under URL variants: both canonicalize to
    // the same key
    let sparse = store
        .insert_feed(
            &Url::parse("https://a.example/feed").unwrap(),
            "Sparse copy",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    let rich = store
        .insert_feed(
            &Url::parse("https://a.example/feed/").unwrap(),
            "Rich copy",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    let unrelated = store
        .insert_feed(
            &Url::parse("https://b.example/feed").unwrap(),
            "Unrelated",
            None,
            None,
            None,
        )
        .await
        .unwrap();

    store
        .insert_entries(sparse, &[entry("one", 1), entry("two", 2)])
        .await
        .unwrap();
    let rich_entries: Vec<NewEntry> = (1..=5)
        .map(|day| entry(&format!("rich-{day}"), day))
        .collect();
    store.insert_entries(rich, &rich_entries).await.unwrap();
    store
        .insert_entries(unrelated, &[entry("other", 3)])
        .await
        .unwrap();

    let report = store.deduplicate().await.unwrap();
    assert_eq!(report.feeds_removed, 1);

    let feeds = store.all_feeds().await.unwrap();
    assert_eq!(feeds.len(), 2);
    assert!(feeds.iter().any(|f| f.id == rich), "rich copy survives");
    assert!(!feeds.iter().any(|f| f.id == sparse));
    assert!(feeds.iter().any(|f| f.id == unrelated));

    // The sparse copy's entries went with it
    assert_eq!(store.entries_for_feed(rich).await.unwrap().len(), 5);
}

#[tokio::test]
async fn duplicate_entries_prefer_the_read_member() {
    let store = Store::open(":memory:").await.unwrap();

    // Two distinct feeds that both syndicate the same article
    let first = store
        .insert_feed(
            &Url::parse("https://a.example/feed").unwrap(),
            "First",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    let second = store
        .insert_feed(
            &Url::parse("https://b.example/feed").unwrap(),
            "Second",
            None,
            None,
            None,
        )
        .await
        .unwrap();

    store
        .insert_entries(first, &[entry("shared", 1)])
        .await
        .unwrap();
    store
        .insert_entries(second, &[entry("shared", 1)])
        .await
        .unwrap();

    // Mark the second feed's copy read
    let read_copy = store.entries_for_feed(second).await.unwrap()[0].id;
    store.mark_entry_read(read_copy).await.unwrap();

    let report = store.deduplicate().await.unwrap();
    assert_eq!(report.feeds_removed, 0);
    assert_eq!(report.entries_removed, 1);

    assert!(store.entries_for_feed(first).await.unwrap().is_empty());
    let survivors = store.entries_for_feed(second).await.unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].id, read_copy);
    assert!(survivors[0].read);
}

#[tokio::test]
async fn unread_duplicates_break_ties_on_smallest_id() {
    let store = Store::open(":memory:").await.unwrap();

    let first = store
        .insert_feed(
            &Url::parse("https://a.example/feed").unwrap(),
            "First",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    let second = store
        .insert_feed(
            &Url::parse("https://b.example/feed").unwrap(),
            "Second",
            None,
            None,
            None,
        )
        .await
        .unwrap();

    store
        .insert_entries(first, &[entry("shared", 1)])
        .await
        .unwrap();
    store
        .insert_entries(second, &[entry("shared", 1)])
        .await
        .unwrap();

    let oldest = store.entries_for_feed(first).await.unwrap()[0].id;

    let report = store.deduplicate().await.unwrap();
    assert_eq!(report.entries_removed, 1);
    let survivors = store.entries_for_feed(first).await.unwrap();
    assert_eq!(survivors.len(), 1);
    assert_eq!(survivors[0].id, oldest);
}

#[tokio::test]
async fn clean_store_reports_nothing_removed() {
    let store = Store::open(":memory:").await.unwrap();

    let feed = store
        .insert_feed(
            &Url::parse("https://a.example/feed").unwrap(),
            "Only",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    store
        .insert_entries(feed, &[entry("one", 1), entry("two", 2)])
        .await
        .unwrap();

    let report = store.deduplicate().await.unwrap();
    assert!(report.is_clean());
    assert_eq!(store.entries_for_feed(feed).await.unwrap().len(), 2);
}

#[tokio::test]
async fn deleting_a_feed_cascades_to_its_entries() {
    let store = Store::open(":memory:").await.unwrap();

    let feed = store
        .insert_feed(
            &Url::parse("https://a.example/feed").unwrap(),
            "Doomed",
            None,
            None,
            None,
        )
        .await
        .unwrap();
    store
        .insert_entries(feed, &[entry("one", 1)])
        .await
        .unwrap();

    assert_eq!(store.delete_feed(feed).await.unwrap(), 1);
    assert!(store.entries_for_feed(feed).await.unwrap().is_empty());

    // Nothing left behind for the orphan sweep
    let report = store.deduplicate().await.unwrap();
    assert_eq!(report.orphans_removed, 0);
}
