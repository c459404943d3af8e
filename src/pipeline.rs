//! Fetch pipeline
//!
//! One fetch walks through `Authenticating → Listing → Grouping → Materializing →
//! Sorted`. History is pulled newest-first starting at the end of the window and
//! the walk stops at the first message older than the start. Posts are materialized
//! in the order grouping produced them and only sorted by timestamp at the very end.
//! The source is disconnected on every exit path.

use chrono::{DateTime, Utc};
use std::fmt;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::config::DEFAULT_PAGE_SIZE;
use crate::core::models::{Post, RawMessage};
use crate::errors::ExportError;
use crate::grouping::{GroupedPost, group};
use crate::materialize::{Materializer, ProgressFn, count_attachments};
use crate::source::{ChannelRef, CredentialPrompt, MessageSource, PageRequest};
use crate::utils::filters::{WindowPosition, is_content_message, window_position};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchPhase {
    Idle,
    Authenticating,
    Listing,
    Grouping,
    Materializing,
    Sorted,
}

impl fmt::Display for FetchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FetchPhase::Idle => "idle",
            FetchPhase::Authenticating => "authenticating",
            FetchPhase::Listing => "listing",
            FetchPhase::Grouping => "grouping",
            FetchPhase::Materializing => "materializing",
            FetchPhase::Sorted => "sorted",
        };
        f.write_str(name)
    }
}

/// A validated fetch window for one channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    channel: String,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl FetchRequest {
    /// # Errors
    ///
    /// Returns `ValidationError` for a blank channel or a window whose start lies after
    /// its end.
    pub fn new(
        channel: impl Into<String>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Self, ExportError> {
        let channel = channel.into().trim().to_string();
        if channel.is_empty() {
            return Err(ExportError::ValidationError(
                "channel identifier is empty".to_string(),
            ));
        }
        if start > end {
            return Err(ExportError::ValidationError(format!(
                "start date {} is after end date {}",
                start.format("%d.%m.%Y"),
                end.format("%d.%m.%Y")
            )));
        }
        Ok(Self {
            channel,
            start,
            end,
        })
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        &self.channel
    }

    #[must_use]
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    #[must_use]
    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }
}

pub struct FetchPipeline<S: MessageSource> {
    source: S,
    page_size: usize,
    cancel: CancellationToken,
    phase: FetchPhase,
}

impl<S: MessageSource> FetchPipeline<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            page_size: DEFAULT_PAGE_SIZE,
            cancel: CancellationToken::new(),
            phase: FetchPhase::Idle,
        }
    }

    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Phase the last fetch reached.
    #[must_use]
    pub fn phase(&self) -> FetchPhase {
        self.phase
    }

    fn enter(&mut self, phase: FetchPhase) {
        debug!("Fetch phase: {} -> {}", self.phase, phase);
        self.phase = phase;
    }

    /// Fetch the window of `request` and return its posts ordered by timestamp.
    ///
    /// Attachments are downloaded into `media_dir`; `on_media_progress` receives the
    /// running `(completed, total)` counter.
    ///
    /// # Errors
    ///
    /// Authentication failures are returned unchanged and nothing else runs. Listing
    /// errors and cancellation also abort the fetch. Individual download failures do
    /// not.
    pub async fn fetch(
        &mut self,
        request: &FetchRequest,
        media_dir: &Path,
        prompt: &dyn CredentialPrompt,
        on_media_progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<Post>, ExportError> {
        let result = self
            .run(request, media_dir, prompt, on_media_progress)
            .await;
        self.source.disconnect().await;
        result
    }

    async fn run(
        &mut self,
        request: &FetchRequest,
        media_dir: &Path,
        prompt: &dyn CredentialPrompt,
        on_media_progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<Post>, ExportError> {
        self.enter(FetchPhase::Authenticating);
        let session = self.source.authenticate(prompt).await?;
        info!("Authorized as {}", session.display_name);

        let channel = self.source.resolve_channel(request.channel()).await?;
        info!("Fetching '{}' ({})", channel.title, channel.id);

        self.enter(FetchPhase::Listing);
        let messages = self.list(&channel, request).await?;
        let total = count_attachments(&messages);
        info!(
            "Listed {} messages with {} attachments",
            messages.len(),
            total
        );

        self.enter(FetchPhase::Grouping);
        let mut grouped = group(messages);

        self.enter(FetchPhase::Materializing);
        let materializer =
            Materializer::new(&self.source, media_dir).with_cancel(self.cancel.clone());
        let downloaded = materializer
            .materialize_all(&mut grouped, total, on_media_progress)
            .await?;
        debug!("Materialized {}/{} attachments", downloaded, total);

        self.enter(FetchPhase::Sorted);
        Ok(into_sorted_posts(grouped))
    }

    /// Walk history newest-first, keeping content messages inside the window.
    async fn list(
        &self,
        channel: &ChannelRef,
        request: &FetchRequest,
    ) -> Result<Vec<RawMessage>, ExportError> {
        let mut page_request = PageRequest::first(request.end(), self.page_size);
        let mut kept = Vec::new();

        'walk: loop {
            if self.cancel.is_cancelled() {
                return Err(ExportError::Cancelled);
            }

            let page = self.source.fetch_page(channel, &page_request).await?;
            let page_len = page.len();
            let Some(last_id) = page.last().map(|m| m.id) else {
                break;
            };

            for message in page {
                match window_position(&message, request.start(), request.end()) {
                    WindowPosition::Before => break 'walk,
                    WindowPosition::After => continue,
                    WindowPosition::Within => {}
                }
                if is_content_message(&message) {
                    kept.push(message);
                }
            }

            if page_len < page_request.limit {
                break;
            }
            page_request = page_request.after(last_id);
        }

        Ok(kept)
    }
}

/// Drop the message association and order posts by timestamp.
///
/// The sort is stable, so posts with equal timestamps keep their production order.
fn into_sorted_posts(grouped: Vec<GroupedPost>) -> Vec<Post> {
    let mut posts: Vec<Post> = grouped.into_iter().map(|g| g.post).collect();
    posts.sort_by_key(|p| p.timestamp);
    posts
}
