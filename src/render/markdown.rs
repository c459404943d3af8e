//! Markdown document writer.
//!
//! Attachments are copied next to the document into `<stem>_media/` as soon as a
//! post is added; the document links to them relatively. Message text is escaped so
//! only the annotations produce markup.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::DocumentRenderer;
use crate::core::config::{AttachmentPlacement, LinkMode, RenderOptions};
use crate::core::models::{AnnotationKind, Post};
use crate::errors::ExportError;
use crate::formatting::{Segment, resolve};
use crate::utils::mime::is_embeddable_image;

const POST_SEPARATOR: &str = "\n---\n\n";

pub struct MarkdownDocument {
    options: RenderOptions,
    media_dir: PathBuf,
    media_link_prefix: String,
    body: String,
    posts: usize,
}

impl MarkdownDocument {
    /// Document that will be saved as `output_file`; media lands beside it.
    #[must_use]
    pub fn new(output_file: &Path, options: RenderOptions) -> Self {
        let stem = output_file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        let media_link_prefix = format!("{stem}_media");
        let media_dir = output_file
            .parent()
            .unwrap_or_else(|| Path::new(""))
            .join(&media_link_prefix);

        Self {
            options,
            media_dir,
            media_link_prefix,
            body: String::new(),
            posts: 0,
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.body
    }

    fn render_attachments(&mut self, post: &Post) -> String {
        let mut out = String::new();
        for path in &post.attachments {
            if let Some(line) = self.render_attachment(path) {
                out.push_str(&line);
                out.push_str("\n\n");
            }
        }
        out
    }

    fn render_attachment(&mut self, path: &Path) -> Option<String> {
        if !path.is_file() {
            warn!("Attachment {} is missing, skipping", path.display());
            return None;
        }
        let name = path.file_name()?.to_string_lossy().into_owned();

        if let Err(e) = fs::create_dir_all(&self.media_dir)
            .and_then(|()| fs::copy(path, self.media_dir.join(&name)))
        {
            warn!("Failed to copy attachment {}: {}", path.display(), e);
            return None;
        }
        debug!("Copied attachment {}", name);

        let link = link_destination(&format!("{}/{}", self.media_link_prefix, name));
        let label = escape_inline(&name, false);
        if is_embeddable_image(path) {
            Some(format!("![{label}]({link})"))
        } else {
            Some(format!("_[Unsupported file downloaded: {label}]_"))
        }
    }

    fn render_text(&self, post: &Post) -> String {
        let mut out = String::with_capacity(post.text.len());
        for segment in resolve(&post.text, &post.annotations) {
            let at_line_start = out.is_empty() || out.ends_with('\n');
            out.push_str(&self.render_segment(&segment, at_line_start));
        }
        out
    }

    fn render_segment(&self, segment: &Segment<'_>, at_line_start: bool) -> String {
        let Some(kind) = segment.kind else {
            return escape_inline(segment.text, at_line_start);
        };

        if *kind == AnnotationKind::Preformatted {
            return code_block(segment.text.trim_matches('\n'));
        }

        let text = segment.text;
        let inner = text.trim();
        if inner.is_empty() {
            return text.to_string();
        }
        let lead = &text[..text.len() - text.trim_start().len()];
        let trail = &text[text.trim_end().len()..];

        let escaped = escape_inline(inner, at_line_start && lead.is_empty());

        let styled = match kind {
            AnnotationKind::Bold => format!("**{escaped}**"),
            AnnotationKind::Italic => format!("_{escaped}_"),
            AnnotationKind::Code => code_span(inner),
            AnnotationKind::NamedLink(_) | AnnotationKind::BareLink => match self.options.link_mode {
                LinkMode::Active => match segment.link_target() {
                    Some(url) => format!("[{escaped}]({})", link_destination(&url)),
                    None => escaped,
                },
                LinkMode::Inert => format!("<u>{escaped}</u>"),
            },
            AnnotationKind::Preformatted => escaped,
        };

        format!("{lead}{styled}{trail}")
    }
}

fn push_escaped(text: &str, out: &mut String) {
    for c in text.chars() {
        if matches!(c, '\\' | '`' | '*' | '_' | '~' | '[' | ']' | '<' | '>' | '&') {
            out.push('\\');
        }
        out.push(c);
    }
}

/// Escape inline markup characters, and block markers at the start of each line.
///
/// `at_line_start` tells whether `text` begins a line of the document.
fn escape_inline(text: &str, at_line_start: bool) -> String {
    let mut out = String::with_capacity(text.len());
    for (index, line) in text.split_inclusive('\n').enumerate() {
        if index == 0 && !at_line_start {
            push_escaped(line, &mut out);
            continue;
        }

        let body = line.trim_start_matches([' ', '\t']);
        out.push_str(&line[..line.len() - body.len()]);

        let digits = body.len() - body.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        if digits > 0 && body[digits..].starts_with(['.', ')']) {
            // "1." or "1)" would open an ordered list
            out.push_str(&body[..digits]);
            out.push('\\');
            push_escaped(&body[digits..], &mut out);
        } else {
            if body.starts_with(['#', '-', '+', '=']) {
                out.push('\\');
            }
            push_escaped(body, &mut out);
        }
    }
    out
}

fn longest_backtick_run(text: &str) -> usize {
    text.split(|c: char| c != '`').map(str::len).max().unwrap_or(0)
}

/// Inline code whose fence is longer than any backtick run inside it.
fn code_span(code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code) + 1);
    if code.starts_with('`') || code.ends_with('`') {
        format!("{fence} {code} {fence}")
    } else {
        format!("{fence}{code}{fence}")
    }
}

fn code_block(code: &str) -> String {
    let fence = "`".repeat(longest_backtick_run(code).max(2) + 1);
    format!("\n{fence}\n{code}\n{fence}\n")
}

/// Angle-bracketed link destination, so spaces and parentheses survive.
fn link_destination(url: &str) -> String {
    let mut out = String::with_capacity(url.len() + 2);
    out.push('<');
    for c in url.chars() {
        match c {
            '<' => out.push_str("%3C"),
            '>' => out.push_str("%3E"),
            '\n' => out.push_str("%0A"),
            '\\' => out.push_str("\\\\"),
            c => out.push(c),
        }
    }
    out.push('>');
    out
}

impl DocumentRenderer for MarkdownDocument {
    fn add_post(&mut self, post: &Post) -> Result<(), ExportError> {
        let mut block = String::new();

        if self.options.include_date_heading {
            block.push_str(&format!("## {}\n\n", post.timestamp.format("%B %d, %Y")));
        }

        let attachments = self.render_attachments(post);
        let text = self.render_text(post);

        if self.options.placement == AttachmentPlacement::Before {
            block.push_str(&attachments);
        }
        if !text.trim().is_empty() {
            block.push_str(&text);
            block.push_str("\n\n");
        }
        if self.options.placement == AttachmentPlacement::After {
            block.push_str(&attachments);
        }

        if self.posts > 0 {
            self.body.push_str(POST_SEPARATOR);
        }
        self.body.push_str(block.trim_end());
        self.body.push('\n');
        self.posts += 1;
        Ok(())
    }

    fn save(&self, path: &Path) -> Result<(), ExportError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(|e| {
                ExportError::RenderError(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        fs::write(path, &self.body).map_err(|e| {
            ExportError::RenderError(format!("cannot write {}: {}", path.display(), e))
        })
    }

    fn post_count(&self) -> usize {
        self.posts
    }
}
