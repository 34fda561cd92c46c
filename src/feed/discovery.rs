use crate::error::FeedError;
use crate::feed::Feed;
use crate::fetch::{self, PayloadKind};
use crate::util::url::{base_origin, resolve_relative};
use url::Url;

/// Locates the feed document behind an HTML page.
///
/// Scans the page for the first `<link rel="alternate">` with an RSS or
/// Atom type, resolves it against the request URL, and fetches it. The
/// discovered URL must itself classify as a feed, else discovery fails.
/// Returns the feed bytes and the URL they came from.
pub async fn discover_feed(
    client: &reqwest::Client,
    html_bytes: &[u8],
    request_url: &Url,
) -> Result<(Vec<u8>, Url), FeedError> {
    let html = String::from_utf8_lossy(html_bytes);
    let feed_url = find_feed_link(&html, request_url)
        .ok_or_else(|| FeedError::Discovery("no feed link on page".to_owned()))?;

    let (bytes, kind) = fetch::fetch_and_classify(client, &feed_url).await?;
    if kind != PayloadKind::Feed {
        return Err(FeedError::Discovery(format!(
            "linked document at {feed_url} is not a feed"
        )));
    }

    Ok((bytes, feed_url))
}

/// Fills in a missing feed image by probing icon candidates.
///
/// The cascade: icon links in the originating page's HTML (when available),
/// then the same scan over a freshly fetched copy of the page URL, then
/// `origin/favicon.ico`. Every candidate must answer a verification GET
/// with 2xx before it is accepted. Exhausting the cascade leaves the image
/// unset, which is expected and not an error.
pub async fn resolve_icon(client: &reqwest::Client, feed: &mut Feed, page_html: Option<&[u8]>) {
    if feed.image_url.is_some() {
        return;
    }

    let base = feed.page_url.clone().unwrap_or_else(|| feed.url.clone());

    if let Some(html) = page_html {
        if let Some(candidate) = icon_from_bytes(html, &base) {
            if probe(client, &candidate).await {
                feed.image_url = Some(candidate);
                return;
            }
        }
    }

    if let Some(page) = &feed.page_url {
        if let Ok((bytes, PayloadKind::Html)) = fetch::fetch_and_classify(client, page).await {
            if let Some(candidate) = icon_from_bytes(&bytes, &base) {
                if probe(client, &candidate).await {
                    feed.image_url = Some(candidate);
                    return;
                }
            }
        }
    }

    if let Some(origin) = base_origin(&base) {
        if let Ok(candidate) = origin.join("favicon.ico") {
            if probe(client, &candidate).await {
                feed.image_url = Some(candidate);
            }
        }
    }
}

fn icon_from_bytes(html_bytes: &[u8], base: &Url) -> Option<Url> {
    let html = String::from_utf8_lossy(html_bytes);
    find_icon_link(&html, base)
}

/// Verification GET: a candidate URL counts only if it answers 2xx.
async fn probe(client: &reqwest::Client, url: &Url) -> bool {
    match client.get(url.clone()).send().await {
        Ok(response) => response.status().is_success(),
        Err(_) => false,
    }
}

/// Scans HTML for `<link rel="alternate">` tags with an RSS/Atom type.
///
/// Simple string scanning, no HTML parser dependency. Handles attribute
/// ordering variations and both quote styles, and resolves relative hrefs
/// against the base URL. Returns the first match.
pub fn find_feed_link(html: &str, base: &Url) -> Option<Url> {
    scan_link_tags(html, base, |tag| {
        contains_attr(tag, "rel", "alternate") && is_feed_type(tag)
    })
}

/// Scans HTML for `<link rel="icon">` / `<link rel="shortcut icon">` tags.
///
/// SVG candidates are excluded: the lightweight image consumers downstream
/// cannot render them.
pub fn find_icon_link(html: &str, base: &Url) -> Option<Url> {
    scan_link_tags(html, base, |tag| {
        (contains_attr(tag, "rel", "icon") || contains_attr(tag, "rel", "shortcut icon"))
            && !tag.contains("image/svg+xml")
    })
    .filter(|url| !url.path().to_ascii_lowercase().ends_with(".svg"))
}

/// Walks `<link>` tags, returning the resolved href of the first tag the
/// predicate accepts. The predicate sees the lowercased tag; the href is
/// extracted from the original HTML to preserve URL case.
fn scan_link_tags(html: &str, base: &Url, accept: impl Fn(&str) -> bool) -> Option<Url> {
    let html_lower = html.to_lowercase();
    let mut search_from = 0;

    while let Some(link_start) = html_lower[search_from..].find("<link") {
        let abs_start = search_from + link_start;
        let remaining = &html_lower[abs_start..];

        let tag_end = remaining.find('>')?;
        let tag = &remaining[..=tag_end];

        if accept(tag) {
            let original_tag = &html[abs_start..abs_start + tag_end + 1];
            if let Some(href) = extract_attr_value(original_tag, "href") {
                if let Some(resolved) = resolve_relative(href, base) {
                    return Some(resolved);
                }
            }
        }

        search_from = abs_start + tag_end + 1;
    }

    None
}

/// Checks if a lowercased tag contains an attribute with the given value.
fn contains_attr(tag: &str, attr_name: &str, attr_value: &str) -> bool {
    let pattern_double = format!("{attr_name}=\"{attr_value}\"");
    let pattern_single = format!("{attr_name}='{attr_value}'");
    tag.contains(&pattern_double) || tag.contains(&pattern_single)
}

fn is_feed_type(tag: &str) -> bool {
    tag.contains("application/rss+xml") || tag.contains("application/atom+xml")
}

/// Extracts the value of an attribute from a tag string (case-preserving).
fn extract_attr_value<'a>(tag: &'a str, attr_name: &str) -> Option<&'a str> {
    let tag_lower = tag.to_lowercase();
    let attr_prefix = format!("{attr_name}=");

    let attr_start = tag_lower.find(&attr_prefix)?;
    let value_start = attr_start + attr_prefix.len();

    if value_start >= tag.len() {
        return None;
    }

    let rest = &tag[value_start..];
    let quote = rest.as_bytes().first()?;
    if *quote != b'"' && *quote != b'\'' {
        return None;
    }

    let quote_char = *quote as char;
    let inner = &rest[1..];
    let end = inner.find(quote_char)?;

    Some(&inner[..end])
}
