use chrono::{DateTime, Utc};

use crate::core::models::RawMessage;

/// Where a listed message falls relative to the export window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowPosition {
    /// Strictly earlier than the start; history is walked newest-first, so nothing
    /// further can match.
    Before,
    Within,
    /// Strictly later than the end.
    After,
}

/// Classify `message` against the inclusive window `[start, end]`.
#[must_use]
pub fn window_position(
    message: &RawMessage,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> WindowPosition {
    if message.timestamp < start {
        WindowPosition::Before
    } else if message.timestamp > end {
        WindowPosition::After
    } else {
        WindowPosition::Within
    }
}

/// False for service messages such as "channel created" or "message pinned".
#[must_use]
pub fn is_content_message(message: &RawMessage) -> bool {
    !message.is_service
}
