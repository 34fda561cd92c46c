use std::borrow::Cow;

/// Maximum length of sanitized entry content, in characters.
pub const MAX_CONTENT_CHARS: usize = 500;

/// Reduces feed-supplied entry content to a bounded plain-text preview.
///
/// Pipeline: HTML tag removal, entity decoding, residual-tag stripping
/// (markup that was entity-encoded in the source), control-character and
/// U+FFFC removal, whitespace collapsing, trimming, and truncation to the
/// first [`MAX_CONTENT_CHARS`] characters. The result reads the same whether
/// the source supplied rich HTML or already-plain text.
pub fn sanitize_content(raw: &str) -> String {
    let stripped = strip_tags(raw);
    let decoded = decode_entities(&stripped);
    // Encoded markup (&lt;p&gt;) becomes literal tags after decoding
    let stripped = strip_tags(&decoded);

    let cleaned: String = stripped
        .chars()
        .filter(|&c| c != '\u{fffc}' && (!c.is_control() || c.is_whitespace()))
        .collect();

    collapse_whitespace(&cleaned)
        .trim()
        .chars()
        .take(MAX_CONTENT_CHARS)
        .collect()
}

/// Removes `<...>` spans, replacing each with a space so adjacent block
/// elements don't fuse into one word. A `<` with no closing `>` drops the
/// remainder of the string.
fn strip_tags(s: &str) -> Cow<'_, str> {
    if !s.contains('<') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => {
                out.push(' ');
                rest = &rest[start + end + 1..];
            }
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Decodes the handful of entities that matter for preview text: the XML
/// predefined five, `&nbsp;`, and numeric references. Unrecognized entities
/// are left verbatim.
fn decode_entities(s: &str) -> Cow<'_, str> {
    if !s.contains('&') {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        // Entity names are short; a distant semicolon means a bare ampersand
        match tail[1..].find(';').filter(|&i| i <= 8) {
            Some(semi) => match decode_entity(&tail[1..semi + 1]) {
                Some(c) => {
                    out.push(c);
                    rest = &tail[semi + 2..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

fn decode_entity(name: &str) -> Option<char> {
    match name {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let num = name.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

fn collapse_whitespace(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_whitespace = false;
    for c in s.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                out.push(' ');
                in_whitespace = true;
            }
        } else {
            out.push(c);
            in_whitespace = false;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        assert_eq!(sanitize_content("Just a sentence."), "Just a sentence.");
    }

    #[test]
    fn tags_are_stripped_and_blocks_stay_separated() {
        assert_eq!(
            sanitize_content("<p>First paragraph.</p><p>Second.</p>"),
            "First paragraph. Second.",
        );
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(
            sanitize_content("Fish &amp; chips &#8212; &quot;classic&quot;"),
            "Fish & chips \u{2014} \"classic\"",
        );
    }

    #[test]
    fn encoded_markup_is_stripped_in_the_residual_pass() {
        assert_eq!(
            sanitize_content("before &lt;script&gt;alert(1)&lt;/script&gt; after"),
            "before alert(1) after",
        );
    }

    #[test]
    fn object_replacement_and_control_chars_are_removed() {
        assert_eq!(
            sanitize_content("attach\u{fffc}ment and bell\u{0007}s"),
            "attachment and bells",
        );
    }

    #[test]
    fn whitespace_collapses_to_single_spaces() {
        assert_eq!(
            sanitize_content("  one\n\n  two\t\tthree   "),
            "one two three",
        );
    }

    #[test]
    fn content_is_capped_at_500_characters() {
        let long = "x".repeat(2000);
        let out = sanitize_content(&long);
        assert_eq!(out.chars().count(), MAX_CONTENT_CHARS);

        // Cap counts characters, not bytes
        let wide = "\u{65e5}".repeat(900);
        let out = sanitize_content(&wide);
        assert_eq!(out.chars().count(), MAX_CONTENT_CHARS);
    }

    #[test]
    fn cap_applies_after_tag_stripping() {
        // Markup longer than the cap whose text fits under it
        let html = format!("<div class=\"{}\">short</div>", "a".repeat(600));
        assert_eq!(sanitize_content(&html), "short");
    }

    #[test]
    fn unterminated_tag_drops_the_remainder() {
        assert_eq!(sanitize_content("visible <img src="), "visible");
    }

    #[test]
    fn bare_ampersands_survive() {
        assert_eq!(sanitize_content("AT&T up & running"), "AT&T up & running");
    }
}
