//! HTTP retrieval and payload classification.
//!
//! Everything the engine downloads (feed documents, HTML pages, icon
//! probes) goes through one GET primitive. [`fetch_and_classify`] decides
//! whether a payload is an HTML page or a feed document: response headers
//! first, content sniffing as a fallback, because many feed hosts mislabel
//! or omit `Content-Type`.

use crate::error::FeedError;
use futures::StreamExt;
use url::Url;

/// Response bodies larger than this are rejected rather than buffered.
const MAX_BODY_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// What a fetched payload turned out to be.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadKind {
    /// An HTML page; a feed URL may be discoverable in its `<link>` tags
    Html,
    /// A feed document (RSS, Atom, JSON Feed, or RDF)
    Feed,
}

/// Fetches a URL and classifies the payload.
///
/// Requires a 2xx status. The `Content-Type` header is consulted first:
/// "html" means [`PayloadKind::Html`]; "xml", "json", or "rss+xml" mean
/// [`PayloadKind::Feed`]. An absent or ambiguous header falls back to
/// sniffing the leading bytes of the body; if neither tier recognizes the
/// payload, the fetch fails with [`FeedError::UnknownContentType`].
pub async fn fetch_and_classify(
    client: &reqwest::Client,
    url: &Url,
) -> Result<(Vec<u8>, PayloadKind), FeedError> {
    let response = client.get(url.clone()).send().await?;

    if !response.status().is_success() {
        return Err(FeedError::HttpStatus(response.status().as_u16()));
    }

    let header_kind = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(classify_content_type);

    let bytes = read_limited_bytes(response, MAX_BODY_SIZE).await?;

    match header_kind.or_else(|| sniff_payload(&bytes)) {
        Some(kind) => Ok((bytes, kind)),
        None => Err(FeedError::UnknownContentType),
    }
}

fn classify_content_type(value: &str) -> Option<PayloadKind> {
    let value = value.to_ascii_lowercase();
    if value.contains("html") {
        Some(PayloadKind::Html)
    } else if value.contains("rss+xml") || value.contains("xml") || value.contains("json") {
        Some(PayloadKind::Feed)
    } else {
        None
    }
}

/// Case-insensitive sniff of the first bytes of a body.
fn sniff_payload(bytes: &[u8]) -> Option<PayloadKind> {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]);
    let head = head
        .trim_start_matches('\u{feff}')
        .trim_start()
        .to_ascii_lowercase();

    if head.starts_with("<!doctype html") || head.starts_with("<html") {
        Some(PayloadKind::Html)
    } else if head.starts_with("<?xml")
        || head.starts_with("<rss")
        || head.starts_with("<feed")
        || head.starts_with('{')
    {
        Some(PayloadKind::Feed)
    } else {
        None
    }
}

/// Reads a response body through its stream, failing fast once `limit`
/// bytes are exceeded (checking `Content-Length` first when present).
pub(crate) async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FeedError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FeedError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FeedError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FeedError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}
