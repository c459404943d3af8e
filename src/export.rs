//! One export job: fetch a channel window and write it out as a document.

use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::{AppConfig, ExportConfig};
use crate::core::models::Post;
use crate::errors::ExportError;
use crate::materialize::ProgressFn;
use crate::pipeline::{FetchPipeline, FetchRequest};
use crate::render::{DocumentRenderer, MarkdownDocument};
use crate::source::{CredentialPrompt, MessageSource};
use crate::utils::links::distinct_links;
use crate::utils::naming::DOCUMENT_EXTENSION;

/// Receives progress while an export runs. Every method defaults to doing nothing.
pub trait ExportObserver: Send + Sync {
    fn media_progress(&self, _completed: usize, _total: usize) {}

    fn fetch_finished(&self, _posts: usize) {}

    fn post_rendered(&self, _rendered: usize, _total: usize) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExportObserver for NoopObserver {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportSummary {
    pub posts: usize,
    pub attachments: usize,
    pub links_found: usize,
    pub distinct_links: Vec<String>,
    /// `None` when nothing was written.
    pub output_file: Option<PathBuf>,
}

impl ExportSummary {
    fn from_posts(posts: &[Post], output_file: PathBuf) -> Self {
        Self {
            posts: posts.len(),
            attachments: posts.iter().map(|p| p.attachments.len()).sum(),
            links_found: posts.iter().map(Post::link_count).sum(),
            distinct_links: distinct_links(posts),
            output_file: Some(output_file),
        }
    }
}

/// Hidden checkpoint written every `autosave_every` posts.
#[must_use]
pub fn autosave_path(output_file: &Path) -> PathBuf {
    sibling_with_suffix(output_file, ".", ".partial")
}

/// Best-effort save made when an export is interrupted mid-render.
#[must_use]
pub fn partial_path(output_file: &Path) -> PathBuf {
    sibling_with_suffix(output_file, "", ".partial")
}

fn sibling_with_suffix(output_file: &Path, prefix: &str, suffix: &str) -> PathBuf {
    let stem = output_file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document".to_string());
    output_file.with_file_name(format!("{prefix}{stem}{suffix}.{DOCUMENT_EXTENSION}"))
}

pub struct Exporter<S: MessageSource> {
    pipeline: FetchPipeline<S>,
    work_dir: PathBuf,
    cancel: CancellationToken,
}

impl<S: MessageSource> Exporter<S> {
    pub fn new(source: S, app: &AppConfig) -> Self {
        Self {
            pipeline: FetchPipeline::new(source).with_page_size(app.page_size),
            work_dir: app.work_dir.clone(),
            cancel: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.pipeline = self.pipeline.with_cancel(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Run one export job.
    ///
    /// The temporary attachment directory is removed on every exit path.
    ///
    /// # Errors
    ///
    /// Returns `ValidationError` before contacting the source when the job is
    /// malformed, `Cancelled` when interrupted, and any fatal fetch or render error.
    pub async fn run(
        &mut self,
        job: &ExportConfig,
        prompt: &dyn CredentialPrompt,
        observer: &dyn ExportObserver,
    ) -> Result<ExportSummary, ExportError> {
        let request = FetchRequest::new(job.channel.as_str(), job.start, job.end)?;
        let run_id = Uuid::new_v4().to_string();
        info!(
            "Starting export of '{}' from {} to {} (run_id={})",
            request.channel(),
            request.start().format("%d.%m.%Y"),
            request.end().format("%d.%m.%Y"),
            run_id
        );

        tokio::fs::create_dir_all(&self.work_dir).await?;
        let media_dir = tempfile::Builder::new()
            .prefix("media-")
            .tempdir_in(&self.work_dir)?;

        let on_media = |completed: usize, total: usize| observer.media_progress(completed, total);
        let posts = self
            .pipeline
            .fetch(
                &request,
                media_dir.path(),
                prompt,
                Some(&on_media as &ProgressFn<'_>),
            )
            .await?;
        observer.fetch_finished(posts.len());

        if posts.is_empty() {
            warn!(
                "No posts found for '{}' in the selected window (run_id={})",
                request.channel(),
                run_id
            );
            return Ok(ExportSummary::default());
        }

        let summary = self.render(job, &posts, observer)?;
        info!(
            "Export finished: {} posts, {} attachments, {} links (run_id={})",
            summary.posts, summary.attachments, summary.links_found, run_id
        );
        Ok(summary)
    }

    fn render(
        &self,
        job: &ExportConfig,
        posts: &[Post],
        observer: &dyn ExportObserver,
    ) -> Result<ExportSummary, ExportError> {
        let output_file = job.output_file.clone();
        let checkpoint = autosave_path(&output_file);
        let autosave_every = job.autosave_every.max(1);
        let mut document = MarkdownDocument::new(&output_file, job.render);

        for (index, post) in posts.iter().enumerate() {
            if self.cancel.is_cancelled() {
                save_partial(&document, &output_file);
                return Err(ExportError::Cancelled);
            }

            document.add_post(post)?;
            let rendered = index + 1;
            observer.post_rendered(rendered, posts.len());

            if rendered % autosave_every == 0 && rendered < posts.len() {
                match document.save(&checkpoint) {
                    Ok(()) => debug!("Autosaved {} posts to {}", rendered, checkpoint.display()),
                    Err(e) => warn!("Autosave failed: {}", e),
                }
            }
        }

        document.save(&output_file)?;
        if checkpoint.exists()
            && let Err(e) = std::fs::remove_file(&checkpoint)
        {
            warn!("Failed to remove {}: {}", checkpoint.display(), e);
        }

        Ok(ExportSummary::from_posts(posts, output_file))
    }
}

fn save_partial(document: &MarkdownDocument, output_file: &Path) {
    if document.post_count() == 0 {
        return;
    }
    let path = partial_path(output_file);
    match document.save(&path) {
        Ok(()) => info!(
            "Saved {} posts to {} before stopping",
            document.post_count(),
            path.display()
        ),
        Err(e) => warn!("Could not save partial document: {}", e),
    }
}
