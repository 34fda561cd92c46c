use crate::error::FeedError;
use crate::feed::{Entry, Feed};
use crate::util::text::sanitize_content;
use crate::util::url::{base_origin, canonicalize, resolve_relative};
use url::Url;

/// Parses a feed document (RSS, Atom, JSON Feed, or RDF) into the canonical
/// model.
///
/// Metadata falls back through format-specific fields: the page URL prefers
/// the first document link that isn't the feed itself, then the request
/// URL's origin; the image prefers the logo over the icon. Items missing a
/// resolvable URL or a publish timestamp are silently dropped; that filter
/// is deliberate and lossy, not an error.
pub fn normalize(bytes: &[u8], request_url: &Url) -> Result<Feed, FeedError> {
    let parsed =
        feed_rs::parser::parse(bytes).map_err(|e| FeedError::Parse(e.to_string()))?;

    let title = parsed
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_owned());

    let overview = parsed
        .description
        .map(|d| d.content)
        .filter(|d| !d.trim().is_empty());

    let self_key = canonicalize(request_url);
    let page_url = parsed
        .links
        .iter()
        .filter_map(|link| resolve_relative(&link.href, request_url))
        .find(|candidate| canonicalize(candidate) != self_key)
        .or_else(|| base_origin(request_url));

    let image_url = parsed
        .logo
        .or(parsed.icon)
        .and_then(|image| resolve_relative(&image.uri, request_url));

    let mut entries = Vec::with_capacity(parsed.entries.len());
    let mut dropped = 0usize;
    for item in parsed.entries {
        match normalize_entry(item, request_url) {
            Some(entry) => entries.push(entry),
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::debug!(
            feed = %request_url,
            dropped = dropped,
            "items missing a link or publish date were dropped"
        );
    }

    entries.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    Ok(Feed {
        url: request_url.clone(),
        title,
        page_url,
        overview,
        image_url,
        entries,
    })
}

/// Converts one feed-rs entry, or `None` when it lacks a URL or timestamp.
///
/// The publish time falls back from `published` to `updated`, which covers
/// RSS `pubDate`, Dublin-Core dates, Atom `published`/`updated`, and JSON
/// Feed `date_published`. Content is the longer of the content body and the
/// summary by character count, sanitized to a plain-text preview.
fn normalize_entry(item: feed_rs::model::Entry, request_url: &Url) -> Option<Entry> {
    let url = item
        .links
        .first()
        .and_then(|link| resolve_relative(&link.href, request_url))?;
    let published_at = item.published.or(item.updated)?;

    let title = item
        .title
        .map(|t| t.content)
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| "Untitled".to_owned());

    let body = item.content.and_then(|c| c.body);
    let summary = item.summary.map(|s| s.content);
    let raw = match (body, summary) {
        (Some(b), Some(s)) => Some(if b.chars().count() >= s.chars().count() { b } else { s }),
        (Some(b), None) => Some(b),
        (None, Some(s)) => Some(s),
        (None, None) => None,
    };
    let content = raw
        .map(|r| sanitize_content(&r))
        .filter(|c| !c.is_empty());

    Some(Entry {
        url,
        title,
        published_at,
        content,
    })
}
