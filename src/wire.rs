//! JSON wire representation of fetched feeds.
//!
//! A storeless bulk-fetch surface: callers hand over a list of URLs and get
//! back a map of per-URL results, each either a serialized feed or an error
//! string. Keys are the request URLs verbatim so callers can correlate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use url::Url;

use crate::feed::{self, Entry, Feed};
use crate::refresh::run_window;

/// Bulk fetch request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchRequest {
    pub urls: Vec<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Bulk fetch response, keyed by request URL. BTreeMap keeps the JSON
/// output stable across runs.
#[derive(Debug, Serialize, Deserialize)]
pub struct FetchResponse {
    pub feeds: BTreeMap<String, FeedResult>,
}

/// Per-URL outcome: exactly one of `feed` or `error` is present.
#[derive(Debug, Serialize, Deserialize)]
pub struct FeedResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed: Option<WireFeed>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FeedResult {
    fn ok(feed: WireFeed) -> Self {
        Self {
            feed: Some(feed),
            error: None,
        }
    }

    fn err(message: String) -> Self {
        Self {
            feed: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireFeed {
    pub url: String,
    pub title: String,
    // URL reads as one unit in these keys, not a camelCase word pair
    #[serde(rename = "pageURL", skip_serializing_if = "Option::is_none")]
    pub page_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overview: Option<String>,
    #[serde(rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub entries: Vec<WireEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireEntry {
    pub url: String,
    pub title: String,
    pub published_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl From<Feed> for WireFeed {
    fn from(feed: Feed) -> Self {
        Self {
            url: feed.url.to_string(),
            title: feed.title,
            page_url: feed.page_url.map(|u| u.to_string()),
            overview: feed.overview,
            image_url: feed.image_url.map(|u| u.to_string()),
            entries: feed.entries.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<Entry> for WireEntry {
    fn from(entry: Entry) -> Self {
        Self {
            url: entry.url.to_string(),
            title: entry.title,
            published_at: entry.published_at,
            content: entry.content,
        }
    }
}

/// Fetch every requested URL concurrently and serialize the outcomes.
///
/// Invalid URLs and fetch failures land in the response as error strings
/// rather than failing the whole batch.
pub async fn fetch_feeds(
    client: &reqwest::Client,
    request: &FetchRequest,
    batch_size: usize,
) -> FetchResponse {
    let results = run_window(request.urls.clone(), batch_size, |raw| {
        let client = client.clone();
        async move {
            let result = match Url::parse(&raw) {
                Ok(url) => match feed::fetch_feed(&client, &url).await {
                    Ok(feed) => FeedResult::ok(feed.into()),
                    Err(error) => FeedResult::err(error.to_string()),
                },
                Err(error) => FeedResult::err(format!("invalid URL: {error}")),
            };
            (raw, result)
        }
    })
    .await;

    FetchResponse {
        feeds: results.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn force_refresh_defaults_to_false() {
        let request: FetchRequest =
            serde_json::from_str(r#"{"urls": ["https://example.com/feed"]}"#).unwrap();
        assert!(!request.force_refresh);
        assert_eq!(request.urls.len(), 1);
    }

    #[test]
    fn request_round_trips_through_its_wire_key() {
        let request: FetchRequest = serde_json::from_str(
            r#"{"urls": ["https://example.com/feed"], "forceRefresh": true}"#,
        )
        .unwrap();
        assert!(request.force_refresh);

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["forceRefresh"], true);
        assert!(json.get("force_refresh").is_none());
    }

    #[test]
    fn feed_serializes_with_its_wire_keys() {
        let feed = WireFeed {
            url: "https://example.com/feed".to_string(),
            title: "Example".to_string(),
            page_url: Some("https://example.com/".to_string()),
            overview: None,
            image_url: Some("https://example.com/icon.png".to_string()),
            entries: vec![WireEntry {
                url: "https://example.com/post".to_string(),
                title: "Post".to_string(),
                published_at: "2026-01-15T08:30:00Z".parse().unwrap(),
                content: None,
            }],
        };
        let json = serde_json::to_value(&feed).unwrap();
        assert_eq!(json["pageURL"], "https://example.com/");
        assert_eq!(json["imageURL"], "https://example.com/icon.png");
        assert_eq!(json["entries"][0]["publishedAt"], "2026-01-15T08:30:00Z");
        // absent optionals are omitted, not null
        assert!(json.get("overview").is_none());
        assert!(json.get("pageUrl").is_none());
        assert!(json["entries"][0].get("content").is_none());
    }

    #[test]
    fn timestamps_parse_with_and_without_fractional_seconds() {
        let plain: WireEntry = serde_json::from_str(
            r#"{"url": "https://e.com/a", "title": "a", "publishedAt": "2026-01-15T08:30:00Z"}"#,
        )
        .unwrap();
        let fractional: WireEntry = serde_json::from_str(
            r#"{"url": "https://e.com/a", "title": "a", "publishedAt": "2026-01-15T08:30:00.250Z"}"#,
        )
        .unwrap();
        assert_eq!(plain.published_at.timestamp(), fractional.published_at.timestamp());
    }

    #[test]
    fn error_result_omits_the_feed_key() {
        let result = FeedResult::err("HTTP error: status 404".to_string());
        let json = serde_json::to_value(&result).unwrap();
        assert!(json.get("feed").is_none());
        assert_eq!(json["error"], "HTTP error: status 404");
    }
}
