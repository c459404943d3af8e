/// Channel export - turns a channel's message history into a readable document.
///
/// Messages are pulled newest-first from a [`source::MessageSource`] for a date
/// window, album members are merged into single posts, attachments are downloaded,
/// and the date-ordered posts are written out by a [`render::DocumentRenderer`].
///
/// # Architecture
///
/// - [`pipeline::FetchPipeline`] drives authentication, listing, grouping and
///   attachment materialization
/// - [`grouping`] merges album messages into posts
/// - [`formatting`] rebuilds styled text from offset/length annotations
/// - [`export::Exporter`] runs a whole job with autosave and cleanup
///
/// # Example
///
/// ```no_run
/// use channel_export::core::config::{AppConfig, ExportConfig, RenderOptions};
/// use channel_export::export::{Exporter, NoopObserver};
/// use channel_export::source::{ArchiveSource, NoPrompt};
/// use channel_export::utils::dates::parse_date_input;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     channel_export::setup_logging();
///
///     let app = AppConfig::from_env()?;
///     let now = chrono::Utc::now();
///     let job = ExportConfig {
///         channel: "@news".to_string(),
///         start: parse_date_input("01.01.2024", now)?,
///         end: now,
///         render: RenderOptions::default(),
///         output_file: app.results_dir.join("news_Jan24.md"),
///         autosave_every: app.autosave_every,
///     };
///
///     let source = ArchiveSource::new("./archive", &app);
///     let mut exporter = Exporter::new(source, &app);
///     let summary = exporter.run(&job, &NoPrompt, &NoopObserver).await?;
///     println!("Exported {} posts", summary.posts);
///
///     Ok(())
/// }
/// ```
// Module declarations
pub mod core;
pub mod errors;
pub mod export;
pub mod formatting;
pub mod grouping;
pub mod materialize;
pub mod pipeline;
pub mod render;
pub mod source;
pub mod utils;

pub use crate::core::models::{AnnotationKind, FormatAnnotation, GroupKey, Post, RawMessage};
pub use crate::errors::ExportError;

/// Configure logging for the command line tool.
///
/// Human-readable output goes to stderr by default; `LOG_FORMAT=json` switches to
/// JSON lines with targets. The level comes from `RUST_LOG` and defaults to `info`.
/// Calling this more than once keeps the first subscriber.
///
/// # Example
///
/// ```
/// channel_export::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    let result = if json {
        registry
            .with(fmt::layer().json().with_target(true).with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
}
