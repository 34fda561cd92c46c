use std::fmt;
use url::Url;

/// Identity-normalized form of a URL, used for all equality and dedup
/// comparisons.
///
/// Two URLs refer to the same feed or entry iff their canonical forms are
/// equal. The canonical form keeps scheme, host, path (trailing slash
/// stripped), and query parameters sorted by key; fragment, userinfo, and
/// port are excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CanonicalUrl(String);

impl CanonicalUrl {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derives the canonical identity key for a URL.
///
/// Idempotent: canonicalizing an already-canonical URL yields the same key.
/// Query components are sorted byte-wise without decoding, so parameter
/// order never affects equality and percent-encoding survives round-trips.
pub fn canonicalize(url: &Url) -> CanonicalUrl {
    let mut out = format!(
        "{}://{}{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.path().trim_end_matches('/'),
    );

    if let Some(query) = url.query() {
        let mut params: Vec<&str> = query.split('&').filter(|p| !p.is_empty()).collect();
        params.sort_unstable();
        if !params.is_empty() {
            out.push('?');
            out.push_str(&params.join("&"));
        }
    }

    CanonicalUrl(out)
}

/// Resolves a possibly-relative link against a reference URL.
///
/// A candidate that already carries scheme and host is returned as-is.
/// Anything else is treated as a path and re-based onto the *origin*
/// (scheme + host, no path or query) of `reference`, so `/feed.xml` seen on
/// `https://example.com/blog/post` resolves to `https://example.com/feed.xml`.
pub fn resolve_relative(candidate: &str, reference: &Url) -> Option<Url> {
    if let Ok(absolute) = Url::parse(candidate) {
        if absolute.has_host() {
            return Some(absolute);
        }
    }

    base_origin(reference)?.join(candidate).ok()
}

/// Strips path, query, fragment, and userinfo from a URL, yielding just
/// `scheme://host/` (a nonstandard port is kept so the origin stays
/// reachable). Used as the last-resort page URL when a feed document
/// carries no home-page link.
pub fn base_origin(url: &Url) -> Option<Url> {
    let host = url.host_str()?;
    let origin = match url.port() {
        Some(port) => format!("{}://{}:{}/", url.scheme(), host, port),
        None => format!("{}://{}/", url.scheme(), host),
    };
    Url::parse(&origin).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn canon(s: &str) -> CanonicalUrl {
        canonicalize(&Url::parse(s).unwrap())
    }

    #[test]
    fn trailing_slash_is_ignored() {
        assert_eq!(canon("https://x.com"), canon("https://x.com/"));
        assert_eq!(
            canon("https://x.com/feed/"),
            canon("https://x.com/feed"),
        );
    }

    #[test]
    fn query_order_does_not_affect_equality() {
        assert_eq!(
            canon("https://x.com/feed?b=2&a=1"),
            canon("https://x.com/feed?a=1&b=2"),
        );
    }

    #[test]
    fn fragment_userinfo_and_port_are_excluded() {
        assert_eq!(canon("https://x.com/feed#latest"), canon("https://x.com/feed"));
        assert_eq!(canon("https://user:pw@x.com/feed"), canon("https://x.com/feed"));
        assert_eq!(canon("https://x.com:443/feed"), canon("https://x.com/feed"));
    }

    #[test]
    fn scheme_and_host_are_exact() {
        assert_ne!(canon("http://x.com/feed"), canon("https://x.com/feed"));
        assert_ne!(canon("https://x.com/feed"), canon("https://y.com/feed"));
        assert_ne!(canon("https://x.com/feed"), canon("https://x.com/rss"));
    }

    #[test]
    fn canonicalization_is_idempotent() {
        for raw in [
            "https://x.com",
            "https://x.com/a/b/?z=9&a=1",
            "http://x.com:8080/path#frag",
            "https://u:p@x.com/feed?q=hello%20world",
        ] {
            let once = canon(raw);
            let twice = canonicalize(&Url::parse(once.as_str()).unwrap());
            assert_eq!(once, twice, "not idempotent for {raw}");
        }
    }

    proptest! {
        #[test]
        fn idempotent_for_arbitrary_paths_and_queries(
            path in "[a-z0-9/]{0,20}",
            a in "[a-z]{1,5}",
            b in "[a-z]{1,5}",
        ) {
            let raw = format!("https://example.com/{path}?{b}=1&{a}=2");
            if let Ok(url) = Url::parse(&raw) {
                let once = canonicalize(&url);
                let reparsed = Url::parse(once.as_str()).unwrap();
                prop_assert_eq!(once, canonicalize(&reparsed));
            }
        }
    }

    #[test]
    fn resolve_absolute_passes_through() {
        let base = Url::parse("https://example.com/blog").unwrap();
        let resolved = resolve_relative("https://other.com/feed", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://other.com/feed");
    }

    #[test]
    fn resolve_rebases_onto_origin() {
        let base = Url::parse("https://example.com/blog/post?x=1").unwrap();
        let resolved = resolve_relative("/feed.xml", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/feed.xml");

        // Bare paths rebase onto the origin too, not the reference's directory
        let resolved = resolve_relative("feed.xml", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://example.com/feed.xml");
    }

    #[test]
    fn resolve_protocol_relative_keeps_reference_scheme() {
        let base = Url::parse("https://example.com").unwrap();
        let resolved = resolve_relative("//cdn.example.com/feed.xml", &base).unwrap();
        assert_eq!(resolved.as_str(), "https://cdn.example.com/feed.xml");
    }

    #[test]
    fn base_origin_strips_path_query_and_userinfo() {
        let url = Url::parse("https://user:pw@example.com/a/b?q=1#f").unwrap();
        let origin = base_origin(&url).unwrap();
        assert_eq!(origin.as_str(), "https://example.com/");
    }

    #[test]
    fn base_origin_keeps_a_nonstandard_port() {
        let url = Url::parse("http://127.0.0.1:8443/a/b").unwrap();
        let origin = base_origin(&url).unwrap();
        assert_eq!(origin.as_str(), "http://127.0.0.1:8443/");
    }
}
