use regex::Regex;
use std::collections::HashSet;
use url::Url;

use crate::core::models::{AnnotationKind, Post};
use crate::formatting::resolve;

/// Scheme prepended to bare links that carry none.
pub const DEFAULT_SCHEME: &str = "https://";

/// Returns whether `text` starts with a URI scheme such as `http://`, `tg://` or `mailto:`.
#[must_use]
pub fn has_scheme(text: &str) -> bool {
    static SCHEME_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(r"^(?i:[a-z][a-z0-9+.\-]*://|mailto:|tel:)")
            .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
    });

    SCHEME_RE.is_match(text.trim_start())
}

/// Resolve the target URL of a link span.
///
/// `NamedLink` uses its explicit URL and falls back to the visible text when the URL is
/// missing or blank. `BareLink` uses the visible text, prefixed with [`DEFAULT_SCHEME`]
/// when it has no scheme. Returns `None` for non-link kinds.
#[must_use]
pub fn resolve_link_target(kind: &AnnotationKind, visible: &str) -> Option<String> {
    match kind {
        AnnotationKind::NamedLink(url) => Some(
            url.as_deref()
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(visible)
                .to_string(),
        ),
        AnnotationKind::BareLink => {
            let visible = visible.trim();
            if has_scheme(visible) {
                Some(visible.to_string())
            } else {
                Some(format!("{DEFAULT_SCHEME}{visible}"))
            }
        }
        AnnotationKind::Bold
        | AnnotationKind::Italic
        | AnnotationKind::Code
        | AnnotationKind::Preformatted => None,
    }
}

/// Link targets of every post, normalized and deduplicated in first-seen order.
#[must_use]
pub fn distinct_links(posts: &[Post]) -> Vec<String> {
    let raw = posts.iter().flat_map(|post| {
        resolve(&post.text, &post.annotations)
            .into_iter()
            .filter_map(|segment| segment.link_target())
            .collect::<Vec<_>>()
    });
    normalize_and_dedupe_links(raw)
}

#[must_use]
pub fn normalize_and_dedupe_links<I>(raw_links: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<String> = Vec::new();

    for raw in raw_links {
        let trimmed = trim_trailing_punctuation(raw.trim());
        if let Some(norm) = normalize_link(trimmed)
            && seen.insert(norm.clone())
        {
            out.push(norm);
        }
    }

    out
}

#[must_use]
fn normalize_link(raw: &str) -> Option<String> {
    let raw = raw
        .trim()
        .trim_matches(|c: char| matches!(c, '<' | '>' | '"' | '\''));
    if !(raw.starts_with("http://") || raw.starts_with("https://")) {
        return None;
    }

    let mut url = Url::parse(raw).ok()?;
    url.set_fragment(None);

    let rendered = url.to_string();
    let rendered = rendered.trim_end_matches('/').to_string();

    Some(rendered)
}

#[must_use]
fn trim_trailing_punctuation(s: &str) -> &str {
    s.trim_end_matches(&['.', ',', ';', ':', '!', '?', ')', ']', '}'][..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_link_without_scheme_gets_https() {
        let target = resolve_link_target(&AnnotationKind::BareLink, "example.com/page");
        assert_eq!(target.as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn bare_link_keeps_existing_scheme() {
        for text in ["http://example.com", "HTTPS://example.com", "tg://resolve?domain=x"] {
            let target = resolve_link_target(&AnnotationKind::BareLink, text);
            assert_eq!(target.as_deref(), Some(text));
        }
    }

    #[test]
    fn named_link_falls_back_to_visible_text() {
        let missing = resolve_link_target(&AnnotationKind::NamedLink(None), "https://a.b");
        assert_eq!(missing.as_deref(), Some("https://a.b"));

        let blank = resolve_link_target(&AnnotationKind::NamedLink(Some("  ".into())), "x.y");
        assert_eq!(blank.as_deref(), Some("x.y"));

        let explicit = resolve_link_target(
            &AnnotationKind::NamedLink(Some("https://target.example".into())),
            "click here",
        );
        assert_eq!(explicit.as_deref(), Some("https://target.example"));
    }

    #[test]
    fn style_kinds_have_no_target() {
        assert!(resolve_link_target(&AnnotationKind::Bold, "x").is_none());
        assert!(resolve_link_target(&AnnotationKind::Preformatted, "x").is_none());
    }

    #[test]
    fn normalize_and_dedupe_strips_fragments_and_trailing_slashes() {
        let raw = vec![
            "https://example.com/a/".to_string(),
            "https://example.com/a#section".to_string(),
            "https://example.com/b).".to_string(),
            "mailto:someone@example.com".to_string(),
        ];
        let norm = normalize_and_dedupe_links(raw);
        assert_eq!(
            norm,
            vec![
                "https://example.com/a".to_string(),
                "https://example.com/b".to_string()
            ]
        );
    }
}
