//! Document rendering
//!
//! Posts are consumed one at a time so a caller can checkpoint the document while it
//! is still being assembled.

pub mod markdown;

use std::path::Path;

use crate::core::models::Post;
use crate::errors::ExportError;

pub use markdown::MarkdownDocument;

pub trait DocumentRenderer {
    /// Append one post. Attachment files are read during this call.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` when the post cannot be added.
    fn add_post(&mut self, post: &Post) -> Result<(), ExportError>;

    /// Write everything added so far to `path`.
    ///
    /// # Errors
    ///
    /// Returns `RenderError` when the file cannot be written.
    fn save(&self, path: &Path) -> Result<(), ExportError>;

    fn post_count(&self) -> usize;
}
