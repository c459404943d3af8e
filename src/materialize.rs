//! Attachment materialization.
//!
//! Downloads go strictly one message at a time: posts in the order given, members in
//! their stored order. A failed download is logged and skipped without touching the
//! post's text or its other attachments.

use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::core::models::RawMessage;
use crate::errors::ExportError;
use crate::grouping::GroupedPost;
use crate::source::MessageSource;

/// Progress callback receiving `(completed, total)`.
pub type ProgressFn<'a> = dyn Fn(usize, usize) + Send + Sync + 'a;

/// Number of messages carrying an attachment, counted once before any download starts.
#[must_use]
pub fn count_attachments<'a, I>(messages: I) -> usize
where
    I: IntoIterator<Item = &'a RawMessage>,
{
    messages
        .into_iter()
        .filter(|m| m.has_attachment())
        .count()
}

pub struct Materializer<'a, S: MessageSource + ?Sized> {
    source: &'a S,
    dir: PathBuf,
    cancel: CancellationToken,
}

impl<'a, S: MessageSource + ?Sized> Materializer<'a, S> {
    pub fn new(source: &'a S, dir: impl Into<PathBuf>) -> Self {
        Self {
            source,
            dir: dir.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between posts once `cancel` fires.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Retrieve every attachment of one grouped post and append the local paths.
    ///
    /// Returns the updated running counter. The counter advances for every attempted
    /// retrieval that did not fail, including ones that yielded no file.
    pub async fn materialize(
        &self,
        grouped: &mut GroupedPost,
        already_done: usize,
        total: usize,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> usize {
        let mut done = already_done;

        for message in grouped.sources.iter().filter(|m| m.has_attachment()) {
            match self.source.download_attachment(message, &self.dir).await {
                Ok(path) => {
                    if let Some(path) = path {
                        debug!("Message {} attachment stored at {}", message.id, path.display());
                        grouped.post.attachments.push(path);
                    }
                    done += 1;
                    if let Some(report) = on_progress {
                        report(done, total);
                    }
                }
                Err(e) => {
                    warn!("Error downloading attachment of message {}: {}", message.id, e);
                }
            }
        }

        done
    }

    /// Materialize `posts` in order against a precomputed `total`.
    ///
    /// With nothing to download the callback still gets a single `(0, 1)` call so a
    /// progress display can finish.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` when the cancellation token fires between two posts.
    pub async fn materialize_all(
        &self,
        posts: &mut [GroupedPost],
        total: usize,
        on_progress: Option<&ProgressFn<'_>>,
    ) -> Result<usize, ExportError> {
        if total == 0 {
            if let Some(report) = on_progress {
                report(0, 1);
            }
            return Ok(0);
        }

        let mut done = 0;
        for grouped in posts.iter_mut() {
            if self.cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }
            done = self.materialize(grouped, done, total, on_progress).await;
        }
        Ok(done)
    }
}
