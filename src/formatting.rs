//! Rebuilds styled text from flat offset/length annotations.
//!
//! Annotation offsets count UTF-16 code units, so every boundary is translated to a
//! byte index before slicing. Out-of-range offsets and lengths are clamped to the
//! text. Overlapping annotations are resolved in offset order: the annotation that
//! starts first keeps its whole span, a later one is clipped to begin where the
//! previous span ended and is dropped when nothing of it remains. Concatenating the
//! segments therefore always reproduces the input text.

use crate::core::models::{AnnotationKind, FormatAnnotation};
use crate::utils::links::resolve_link_target;

/// A contiguous slice of a post's text with at most one style applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub kind: Option<&'a AnnotationKind>,
}

impl<'a> Segment<'a> {
    #[must_use]
    pub fn plain(text: &'a str) -> Self {
        Self { text, kind: None }
    }

    #[must_use]
    pub fn styled(text: &'a str, kind: &'a AnnotationKind) -> Self {
        Self {
            text,
            kind: Some(kind),
        }
    }

    #[must_use]
    pub fn is_plain(&self) -> bool {
        self.kind.is_none()
    }

    /// Target URL when this segment is a link.
    #[must_use]
    pub fn link_target(&self) -> Option<String> {
        self.kind
            .and_then(|kind| resolve_link_target(kind, self.text))
    }
}

/// Split `text` into ordered segments according to `annotations`.
///
/// With no annotations the whole text comes back as one plain segment, so callers can
/// emit undecorated output without any styling machinery.
#[must_use]
pub fn resolve<'a>(text: &'a str, annotations: &'a [FormatAnnotation]) -> Vec<Segment<'a>> {
    if annotations.is_empty() {
        return vec![Segment::plain(text)];
    }

    let mut ordered: Vec<&FormatAnnotation> = annotations.iter().collect();
    ordered.sort_by_key(|a| a.offset);

    let total_units = utf16_len(text);
    let mut segments = Vec::with_capacity(ordered.len() * 2 + 1);
    let mut cursor_units = 0usize;
    let mut cursor_byte = 0usize;

    for annotation in ordered {
        let start = annotation.offset.min(total_units).max(cursor_units);
        let end = annotation
            .offset
            .saturating_add(annotation.length)
            .min(total_units);
        if end <= start {
            continue;
        }

        let start_byte = byte_index(text, start);
        let end_byte = byte_index(text, end);

        if start_byte > cursor_byte {
            segments.push(Segment::plain(&text[cursor_byte..start_byte]));
        }
        if end_byte > start_byte {
            segments.push(Segment::styled(&text[start_byte..end_byte], &annotation.kind));
        }

        cursor_units = end;
        cursor_byte = end_byte.max(cursor_byte);
    }

    if cursor_byte < text.len() {
        segments.push(Segment::plain(&text[cursor_byte..]));
    }

    if segments.is_empty() {
        segments.push(Segment::plain(text));
    }

    segments
}

fn utf16_len(text: &str) -> usize {
    text.chars().map(char::len_utf16).sum()
}

/// Byte index of the character containing UTF-16 position `units`.
///
/// A position inside a surrogate pair snaps down to the start of that character;
/// positions past the end map to `text.len()`.
fn byte_index(text: &str, units: usize) -> usize {
    let mut seen = 0usize;
    for (idx, ch) in text.char_indices() {
        let next = seen + ch.len_utf16();
        if next > units {
            return idx;
        }
        seen = next;
    }
    text.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn join(segments: &[Segment<'_>]) -> String {
        segments.iter().map(|s| s.text).collect()
    }

    #[test]
    fn utf16_offsets_cover_astral_characters() {
        // "😀" is two UTF-16 units, so "bold" starts at unit 3.
        let text = "😀 bold";
        let annotations = vec![FormatAnnotation::new(3, 4, AnnotationKind::Bold)];
        let segments = resolve(text, &annotations);

        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0], Segment::plain("😀 "));
        assert_eq!(segments[1].text, "bold");
        assert_eq!(segments[1].kind, Some(&AnnotationKind::Bold));
    }

    #[test]
    fn offset_inside_surrogate_pair_snaps_to_character_start() {
        let text = "a😀b";
        let annotations = vec![FormatAnnotation::new(2, 2, AnnotationKind::Italic)];
        let segments = resolve(text, &annotations);

        assert_eq!(join(&segments), text);
        assert_eq!(segments[0], Segment::plain("a"));
        assert_eq!(segments[1].text, "😀b");
    }

    #[test]
    fn byte_index_maps_boundaries() {
        let text = "aé😀z";
        assert_eq!(byte_index(text, 0), 0);
        assert_eq!(byte_index(text, 1), 1);
        assert_eq!(byte_index(text, 2), 3);
        assert_eq!(byte_index(text, 4), 7);
        assert_eq!(byte_index(text, 5), 8);
        assert_eq!(byte_index(text, 99), 8);
    }
}
