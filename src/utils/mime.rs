//! MIME utilities shared across modules

use std::path::Path;

/// Image types the document renderer embeds inline.
const EMBEDDABLE_IMAGE_MIME: &[&str] = &[
    "image/png",
    "image/jpeg",
    "image/gif",
    "image/bmp",
    "image/tiff",
    "image/webp",
];

#[must_use]
pub fn canonicalize_mime(mime: &str) -> String {
    let main = mime
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();

    match main.as_str() {
        "image/jpg" => "image/jpeg".to_string(),
        other => other.to_string(),
    }
}

/// Returns whether a given MIME type can be embedded as an image.
#[must_use]
pub fn is_embeddable_image_mime(mime: &str) -> bool {
    let canon = canonicalize_mime(mime);
    EMBEDDABLE_IMAGE_MIME.contains(&canon.as_str())
}

/// File extension for a MIME type, `None` when the type is unknown.
#[must_use]
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let canon = canonicalize_mime(mime);
    if canon == "image/jpeg" {
        return Some("jpg");
    }
    mime_guess::get_mime_extensions_str(&canon)?.first().copied()
}

/// Returns whether the file at `path` looks like an embeddable image, judged by extension.
#[must_use]
pub fn is_embeddable_image(path: &Path) -> bool {
    mime_guess::from_path(path)
        .iter()
        .any(|m| is_embeddable_image_mime(m.essence_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recognizes_images_by_extension() {
        assert!(is_embeddable_image(Path::new("a/photo.JPG")));
        assert!(is_embeddable_image(Path::new("b.png")));
        assert!(!is_embeddable_image(Path::new("clip.mp4")));
        assert!(!is_embeddable_image(Path::new("notes.pdf")));
        assert!(!is_embeddable_image(Path::new("no_extension")));
    }

    #[test]
    fn canonicalizes_jpg_alias() {
        assert_eq!(canonicalize_mime("image/JPG; q=1"), "image/jpeg");
        assert!(is_embeddable_image_mime("image/jpg"));
    }

    #[test]
    fn extension_follows_declared_type() {
        assert_eq!(extension_for_mime("application/pdf"), Some("pdf"));
        assert_eq!(extension_for_mime("image/JPG"), Some("jpg"));
        assert_eq!(extension_for_mime("application/x-not-registered"), None);
    }
}
