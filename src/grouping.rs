//! Album grouping: turns raw messages into logical posts.
//!
//! Messages that share a [`GroupKey`] form one album and become a single post. The
//! grouper never hands out back-references from a [`Post`] to its messages; instead
//! each produced [`GroupedPost`] pairs the post with the messages it was built from,
//! and the caller decides how long to keep that association.

use std::collections::HashMap;
use tracing::debug;

use crate::core::models::{GroupKey, Post, RawMessage};

/// A freshly assembled post together with the messages that will feed its attachments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupedPost {
    pub post: Post,
    /// Constituent messages in identifier order.
    pub sources: Vec<RawMessage>,
}

/// Album members collected so far, keyed by group, in first-seen order.
#[derive(Debug, Default)]
pub struct AlbumAccumulator {
    order: Vec<GroupKey>,
    members: HashMap<GroupKey, Vec<RawMessage>>,
}

impl AlbumAccumulator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: GroupKey, message: RawMessage) {
        let entry = self.members.entry(key.clone()).or_default();
        if entry.is_empty() {
            self.order.push(key);
        }
        entry.push(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[must_use]
    pub fn last_key(&self) -> Option<&GroupKey> {
        self.order.last()
    }

    /// Merge and remove every pending group except `keep`, oldest first.
    fn take_all_except(&mut self, keep: Option<&GroupKey>) -> Vec<GroupedPost> {
        let keys: Vec<GroupKey> = self
            .order
            .iter()
            .filter(|k| Some(*k) != keep)
            .cloned()
            .collect();
        self.order.retain(|k| Some(k) == keep);

        keys.into_iter()
            .filter_map(|key| self.members.remove(&key))
            .filter_map(merge_album)
            .collect()
    }

    /// Merge and remove every pending group, oldest first.
    pub fn drain(&mut self) -> Vec<GroupedPost> {
        self.take_all_except(None)
    }
}

/// Streaming grouper.
///
/// Standalone messages come back from [`PostGrouper::ingest`] immediately. Album
/// members are buffered; because albums arrive contiguously, a pending album is
/// emitted as soon as a member of a different album shows up. Call
/// [`PostGrouper::flush`] at end of input for whatever is still pending.
#[derive(Debug, Default)]
pub struct PostGrouper {
    pending: AlbumAccumulator,
}

impl PostGrouper {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ingest(&mut self, message: RawMessage) -> Option<GroupedPost> {
        let Some(key) = message.group_key.clone() else {
            return standalone_post(message);
        };

        let completed = if self.pending.last_key().is_some_and(|last| *last != key) {
            self.pending.take_all_except(Some(&key)).into_iter().next()
        } else {
            None
        };

        self.pending.push(key, message);
        completed
    }

    pub fn flush(&mut self) -> Vec<GroupedPost> {
        self.pending.drain()
    }

    #[must_use]
    pub fn pending_albums(&self) -> usize {
        self.pending.len()
    }
}

/// Batch grouping over a complete message list.
///
/// Albums are merged first, in the order their first member appears, followed by
/// standalone posts in input order. Empty standalone messages are dropped.
#[must_use]
pub fn group(messages: Vec<RawMessage>) -> Vec<GroupedPost> {
    let mut albums = AlbumAccumulator::new();
    let mut standalone = Vec::new();

    for message in messages {
        match message.group_key.clone() {
            Some(key) => albums.push(key, message),
            None => standalone.push(message),
        }
    }

    debug!(
        "Grouping {} albums and {} standalone messages",
        albums.len(),
        standalone.len()
    );

    let mut posts = albums.drain();
    posts.extend(standalone.into_iter().filter_map(standalone_post));
    posts
}

/// Post for a message outside any album, or `None` when it has neither text nor attachment.
#[must_use]
pub fn standalone_post(message: RawMessage) -> Option<GroupedPost> {
    if !message.has_text() && !message.has_attachment() {
        return None;
    }

    Some(GroupedPost {
        post: Post::from_representative(&message),
        sources: vec![message],
    })
}

/// Merge album members into one post.
///
/// Members are ordered by identifier. The representative is the first member whose
/// text is non-blank, or the first member when all are blank; the post takes its
/// text, annotations and timestamp verbatim. The timestamp can therefore differ from
/// that of other members whose attachments end up on the same post.
#[must_use]
pub fn merge_album(mut members: Vec<RawMessage>) -> Option<GroupedPost> {
    members.sort_by_key(|m| m.id);

    let representative = members
        .iter()
        .find(|m| !m.text.trim().is_empty())
        .or_else(|| members.first())?;

    Some(GroupedPost {
        post: Post::from_representative(representative),
        sources: members,
    })
}
