use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Album identifier shared by every member message of one multi-attachment post.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(pub String);

impl GroupKey {
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }
}

/// Styling or link semantics of one annotation span.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "url", rename_all = "snake_case")]
pub enum AnnotationKind {
    Bold,
    Italic,
    Code,
    Preformatted,
    /// Link whose target differs from its visible text.
    NamedLink(Option<String>),
    /// Link whose visible text is the target itself.
    BareLink,
}

impl AnnotationKind {
    #[must_use]
    pub fn is_link(&self) -> bool {
        matches!(self, AnnotationKind::NamedLink(_) | AnnotationKind::BareLink)
    }
}

/// A styled range over a message text.
///
/// `offset` and `length` count UTF-16 code units, matching the wire format of the
/// message source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormatAnnotation {
    pub offset: usize,
    pub length: usize,
    pub kind: AnnotationKind,
}

impl FormatAnnotation {
    #[must_use]
    pub fn new(offset: usize, length: usize, kind: AnnotationKind) -> Self {
        Self {
            offset,
            length,
            kind,
        }
    }
}

/// Where the bytes of an attachment live before materialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentLocation {
    /// Path relative to the source's own storage.
    Local(PathBuf),
    /// Path on the remote file endpoint; looked up by file id when not yet known.
    Remote(Option<String>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub file_id: String,
    pub file_name: Option<String>,
    pub mime_type: Option<String>,
    pub size: Option<u64>,
    pub location: AttachmentLocation,
}

/// One message as delivered by the message source. Read-only input to the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawMessage {
    /// Monotonically increasing within the source; used as tie-break.
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub annotations: Vec<FormatAnnotation>,
    pub attachment: Option<AttachmentRef>,
    pub group_key: Option<GroupKey>,
    /// Non-content message (channel created, title changed, pinned, ...).
    pub is_service: bool,
}

impl RawMessage {
    #[must_use]
    pub fn has_attachment(&self) -> bool {
        self.attachment.is_some()
    }

    #[must_use]
    pub fn has_text(&self) -> bool {
        !self.text.is_empty()
    }
}

/// One logical unit of rendered content, possibly merged from several messages.
///
/// `text` is never re-derived after creation; `annotations` are always relative to it.
/// `attachments` only grows, in arrival order, while the post is materialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub timestamp: DateTime<Utc>,
    pub text: String,
    pub annotations: Vec<FormatAnnotation>,
    pub attachments: Vec<PathBuf>,
}

impl Post {
    /// Builds an unmaterialized post from its representative message.
    #[must_use]
    pub fn from_representative(message: &RawMessage) -> Self {
        Self {
            timestamp: message.timestamp,
            text: message.text.clone(),
            annotations: message.annotations.clone(),
            attachments: Vec::new(),
        }
    }

    #[must_use]
    pub fn link_count(&self) -> usize {
        self.annotations.iter().filter(|a| a.kind.is_link()).count()
    }
}
