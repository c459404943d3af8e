//! Remote message source interface
//!
//! The fetch pipeline only talks to a channel through [`MessageSource`]. A source
//! walks history newest-first in pages anchored at an end date and retrieves
//! attachment bytes on request.

pub mod archive;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::core::models::RawMessage;
use crate::errors::ExportError;

pub use archive::ArchiveSource;

/// Who the source authenticated as.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub display_name: String,
}

/// Resolved channel handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelRef {
    pub id: String,
    pub title: String,
}

/// One page of the reverse-chronological history walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// Only messages at or before this instant.
    pub offset_date: DateTime<Utc>,
    /// Only messages with a strictly smaller identifier; `None` on the first page.
    pub before_id: Option<i64>,
    pub limit: usize,
}

impl PageRequest {
    #[must_use]
    pub fn first(offset_date: DateTime<Utc>, limit: usize) -> Self {
        Self {
            offset_date,
            before_id: None,
            limit,
        }
    }

    /// Request for the page following one whose oldest message was `last_id`.
    #[must_use]
    pub fn after(&self, last_id: i64) -> Self {
        Self {
            before_id: Some(last_id),
            ..self.clone()
        }
    }
}

/// Asks the operator for a missing credential.
pub trait CredentialPrompt: Send + Sync {
    /// Returns `None` when the operator declines or nothing can be asked.
    fn prompt(&self, label: &str) -> Option<String>;
}

/// Prompt that never answers; used for unattended runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoPrompt;

impl CredentialPrompt for NoPrompt {
    fn prompt(&self, _label: &str) -> Option<String> {
        None
    }
}

impl<F> CredentialPrompt for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn prompt(&self, label: &str) -> Option<String> {
        self(label)
    }
}

#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Authenticate, asking `prompt` for anything missing.
    ///
    /// # Errors
    ///
    /// Returns `AuthError` when no session can be established.
    async fn authenticate(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<SessionInfo, ExportError>;

    /// Look a channel up by identifier, username or link.
    ///
    /// # Errors
    ///
    /// Returns `SourceError` when the channel is unknown.
    async fn resolve_channel(&self, channel: &str) -> Result<ChannelRef, ExportError>;

    /// Fetch one page of history, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error when the page cannot be read.
    async fn fetch_page(
        &self,
        channel: &ChannelRef,
        request: &PageRequest,
    ) -> Result<Vec<RawMessage>, ExportError>;

    /// Retrieve the attachment of `message` into `dir`.
    ///
    /// Returns `Ok(None)` when the message has no retrievable attachment.
    ///
    /// # Errors
    ///
    /// Returns an error when retrieval fails.
    async fn download_attachment(
        &self,
        message: &RawMessage,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ExportError>;

    /// Release the connection. Safe to call more than once.
    async fn disconnect(&mut self);
}
