use channel_export::core::models::{AnnotationKind, FormatAnnotation};
use channel_export::formatting::resolve;

fn concat(text: &str, annotations: &[FormatAnnotation]) -> String {
    resolve(text, annotations).iter().map(|s| s.text).collect()
}

#[test]
fn test_empty_annotations_yield_single_plain_segment() {
    for text in ["", "plain", "multi\nline text"] {
        let segments = resolve(text, &[]);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].text, text);
        assert!(segments[0].is_plain());
    }
}

#[test]
fn test_round_trip_non_overlapping() {
    let text = "Bold, italic and a link: example.com.";
    let annotations = vec![
        FormatAnnotation::new(0, 4, AnnotationKind::Bold),
        FormatAnnotation::new(6, 6, AnnotationKind::Italic),
        FormatAnnotation::new(25, 11, AnnotationKind::BareLink),
    ];

    let segments = resolve(text, &annotations);
    assert_eq!(concat(text, &annotations), text);

    let styled: Vec<(&str, &AnnotationKind)> = segments
        .iter()
        .filter_map(|s| s.kind.map(|k| (s.text, k)))
        .collect();
    assert_eq!(
        styled,
        vec![
            ("Bold", &AnnotationKind::Bold),
            ("italic", &AnnotationKind::Italic),
            ("example.com", &AnnotationKind::BareLink),
        ]
    );
}

#[test]
fn test_round_trip_unsorted_input() {
    let text = "one two three";
    let annotations = vec![
        FormatAnnotation::new(8, 5, AnnotationKind::Code),
        FormatAnnotation::new(0, 3, AnnotationKind::Bold),
    ];
    let segments = resolve(text, &annotations);
    assert_eq!(segments.first().map(|s| s.text), Some("one"));
    assert_eq!(concat(text, &annotations), text);
}

#[test]
fn test_offsets_count_utf16_units() {
    // "😀" is two UTF-16 units, "é" one.
    let text = "😀 café bold";
    let annotations = vec![FormatAnnotation::new(8, 4, AnnotationKind::Bold)];

    let segments = resolve(text, &annotations);
    let bold: Vec<&str> = segments
        .iter()
        .filter(|s| !s.is_plain())
        .map(|s| s.text)
        .collect();
    assert_eq!(bold, vec!["bold"]);
    assert_eq!(concat(text, &annotations), text);
}

#[test]
fn test_overlap_first_annotation_wins() {
    let text = "abcdefghij";
    let annotations = vec![
        FormatAnnotation::new(0, 6, AnnotationKind::Bold),
        FormatAnnotation::new(4, 4, AnnotationKind::Italic),
        FormatAnnotation::new(1, 2, AnnotationKind::Code),
    ];

    let segments = resolve(text, &annotations);
    let parts: Vec<(&str, Option<&AnnotationKind>)> =
        segments.iter().map(|s| (s.text, s.kind)).collect();
    assert_eq!(
        parts,
        vec![
            ("abcdef", Some(&AnnotationKind::Bold)),
            ("gh", Some(&AnnotationKind::Italic)),
            ("ij", None),
        ]
    );
    assert_eq!(concat(text, &annotations), text);
}

#[test]
fn test_out_of_range_annotations_are_clamped() {
    let text = "short";
    let annotations = vec![
        FormatAnnotation::new(3, 100, AnnotationKind::Bold),
        FormatAnnotation::new(50, 5, AnnotationKind::Italic),
    ];

    let segments = resolve(text, &annotations);
    let parts: Vec<&str> = segments.iter().map(|s| s.text).collect();
    assert_eq!(parts, vec!["sho", "rt"]);
    assert_eq!(segments[1].kind, Some(&AnnotationKind::Bold));
}

#[test]
fn test_zero_length_annotation_is_ignored() {
    let text = "nothing styled";
    let annotations = vec![FormatAnnotation::new(3, 0, AnnotationKind::Bold)];
    let segments = resolve(text, &annotations);
    assert_eq!(segments.len(), 1);
    assert!(segments[0].is_plain());
}

#[test]
fn test_link_targets() {
    let text = "docs and example.org";
    let annotations = vec![
        FormatAnnotation::new(
            0,
            4,
            AnnotationKind::NamedLink(Some("https://docs.rs".to_string())),
        ),
        FormatAnnotation::new(9, 11, AnnotationKind::BareLink),
    ];
    let targets: Vec<String> = resolve(text, &annotations)
        .iter()
        .filter_map(|s| s.link_target())
        .collect();
    assert_eq!(
        targets,
        vec!["https://docs.rs".to_string(), "https://example.org".to_string()]
    );
}
