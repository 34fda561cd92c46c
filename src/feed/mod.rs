//! Canonical feed model, format normalization, discovery, and merge planning.
//!
//! [`fetch_feed`] is the front door: given any URL it produces a canonical
//! [`Feed`], following HTML pages to their linked feed documents and
//! resolving a site icon when the feed itself supplies no image.

mod discovery;
mod merge;
mod normalize;

pub use discovery::{discover_feed, find_feed_link, find_icon_link, resolve_icon};
pub use merge::plan_new_entries;
pub use normalize::normalize;

use crate::error::FeedError;
use crate::fetch::{self, PayloadKind};
use chrono::{DateTime, Utc};
use url::Url;

/// Normalized representation of a syndication source.
///
/// `url` is the feed's identity within the store; `entries` are sorted by
/// publish time descending when materialized for merge comparisons.
#[derive(Debug, Clone)]
pub struct Feed {
    /// URL of the feed document itself (identity)
    pub url: Url,
    pub title: String,
    /// Home page of the site, when the document or its origin yields one
    pub page_url: Option<Url>,
    pub overview: Option<String>,
    pub image_url: Option<Url>,
    pub entries: Vec<Entry>,
}

/// Normalized representation of one feed item.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Item URL (identity within its feed, not globally)
    pub url: Url,
    pub title: String,
    pub published_at: DateTime<Utc>,
    /// Plain-text preview, at most 500 characters after sanitization
    pub content: Option<String>,
}

/// Fetches a URL and normalizes it into a canonical [`Feed`].
///
/// Feed documents normalize directly. HTML pages go through discovery: the
/// first `<link rel="alternate">` feed URL is fetched and must itself
/// classify as a feed, else the fetch fails with [`FeedError::Discovery`].
/// Either way, a feed without an image gets the icon-resolution cascade
/// before being returned.
pub async fn fetch_feed(client: &reqwest::Client, url: &Url) -> Result<Feed, FeedError> {
    let (bytes, kind) = fetch::fetch_and_classify(client, url).await?;

    let (mut feed, page_html) = match kind {
        PayloadKind::Feed => (normalize(&bytes, url)?, None),
        PayloadKind::Html => {
            let (feed_bytes, feed_url) = discover_feed(client, &bytes, url).await?;
            (normalize(&feed_bytes, &feed_url)?, Some(bytes))
        }
    };

    resolve_icon(client, &mut feed, page_html.as_deref()).await;

    Ok(feed)
}
