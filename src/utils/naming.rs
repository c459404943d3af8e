//! File and channel naming helpers

use chrono::{DateTime, Utc};
use regex::Regex;

/// Extension of rendered documents.
pub const DOCUMENT_EXTENSION: &str = "md";

/// Clean channel name from a username or link, usable in file names.
///
/// `@name`, `t.me/name` and `https://t.me/name` all yield `name`.
#[must_use]
pub fn channel_name(channel: &str) -> String {
    static UNSAFE_RE: std::sync::LazyLock<Regex> = std::sync::LazyLock::new(|| {
        Regex::new(r"[^\w\s-]")
            .unwrap_or_else(|_| Regex::new(r"$^").expect("fallback regex compiles"))
    });

    let mut name = channel.trim().trim_start_matches('@');
    for prefix in ["https://t.me/", "http://t.me/", "t.me/"] {
        if let Some(rest) = name.strip_prefix(prefix) {
            name = rest;
        }
    }

    UNSAFE_RE.replace_all(name, "").trim().to_string()
}

/// Document name for a channel and date range, e.g. `news_Jan24_Mar24.md`.
///
/// Collapses to a single month part when both dates fall in the same month.
#[must_use]
pub fn output_filename(channel: &str, start: DateTime<Utc>, end: DateTime<Utc>) -> String {
    let start_part = start.format("%b%y").to_string();
    let end_part = end.format("%b%y").to_string();
    let date_part = if start_part == end_part {
        start_part
    } else {
        format!("{start_part}_{end_part}")
    };
    format!("{channel}_{date_part}.{DOCUMENT_EXTENSION}")
}

/// Replace path separators and reserved characters so `name` is a single path component.
#[must_use]
pub fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim().trim_start_matches('.');
    if cleaned.is_empty() {
        "attachment".to_string()
    } else {
        cleaned.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn channel_name_strips_prefixes() {
        assert_eq!(channel_name("https://t.me/test_channel"), "test_channel");
        assert_eq!(channel_name("t.me/test_channel"), "test_channel");
        assert_eq!(channel_name("@test_channel"), "test_channel");
        assert_eq!(channel_name("test_channel"), "test_channel");
        assert_eq!(channel_name("https://t.me/test-channel_123"), "test-channel_123");
        assert_eq!(channel_name("we!rd$name"), "werdname");
    }

    #[test]
    fn output_filename_spans_months() {
        let start = Utc.with_ymd_and_hms(2023, 1, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 3, 20, 0, 0, 0).unwrap();
        assert_eq!(output_filename("channel", start, end), "channel_Jan23_Mar23.md");
    }

    #[test]
    fn output_filename_same_month() {
        let start = Utc.with_ymd_and_hms(2023, 1, 15, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2023, 1, 25, 0, 0, 0).unwrap();
        assert_eq!(output_filename("channel", start, end), "channel_Jan23.md");
    }

    #[test]
    fn sanitize_file_name_keeps_single_component() {
        assert_eq!(sanitize_file_name("../etc/passwd"), "_etc_passwd");
        assert_eq!(sanitize_file_name("photo 1.jpg"), "photo 1.jpg");
        assert_eq!(sanitize_file_name("..."), "attachment");
    }
}
