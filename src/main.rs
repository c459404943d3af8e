use anyhow::{Context, Result};
use channel_export::core::config::{
    AppConfig, AttachmentPlacement, ExportConfig, LinkMode, RenderOptions,
};
use channel_export::errors::ExportError;
use channel_export::export::{ExportObserver, Exporter};
use channel_export::source::{ArchiveSource, CredentialPrompt, NoPrompt};
use channel_export::utils::dates::{end_of_day, parse_date_input};
use channel_export::utils::naming::{channel_name, output_filename};
use chrono::Utc;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "channel-export")]
#[command(about = "Export a channel's posts for a date range into a Markdown document")]
#[command(version)]
struct Cli {
    /// Channel archive directory containing messages.json
    #[arg(short, long)]
    archive: PathBuf,

    /// Channel username or link (@name, t.me/name, https://t.me/name)
    #[arg(short, long)]
    channel: String,

    /// First day to export (dd.mm.yyyy); empty selects four months back
    #[arg(long, default_value = "")]
    start: String,

    /// Last day to export (dd.mm.yyyy), inclusive; defaults to now
    #[arg(long)]
    end: Option<String>,

    /// Where attachments go relative to the post text
    #[arg(long, value_enum, default_value_t = Placement::After)]
    images: Placement,

    /// Whether links stay clickable
    #[arg(long, value_enum, default_value_t = Links::Active)]
    links: Links,

    /// Skip the date heading above each post
    #[arg(long)]
    no_date_heading: bool,

    /// Directory for the document (defaults to EXPORT_RESULTS_DIR)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Save a checkpoint every N posts (defaults to EXPORT_AUTOSAVE_EVERY)
    #[arg(long)]
    autosave_every: Option<usize>,

    /// Never ask for credentials on stdin
    #[arg(long)]
    non_interactive: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Placement {
    Before,
    After,
}

#[derive(Clone, Copy, ValueEnum)]
enum Links {
    Active,
    Inert,
}

impl From<Placement> for AttachmentPlacement {
    fn from(value: Placement) -> Self {
        match value {
            Placement::Before => AttachmentPlacement::Before,
            Placement::After => AttachmentPlacement::After,
        }
    }
}

impl From<Links> for LinkMode {
    fn from(value: Links) -> Self {
        match value {
            Links::Active => LinkMode::Active,
            Links::Inert => LinkMode::Inert,
        }
    }
}

fn stdin_prompt(label: &str) -> Option<String> {
    eprint!("{label}: ");
    std::io::stderr().flush().ok()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line).ok()?;
    let line = line.trim();
    (!line.is_empty()).then(|| line.to_string())
}

/// Terminal progress: a spinner while fetching, then bars for downloads and posts.
struct TerminalProgress {
    fetch: ProgressBar,
    media: ProgressBar,
    posts: ProgressBar,
}

impl TerminalProgress {
    fn new() -> Result<Self> {
        let bar_style = ProgressStyle::default_bar()
            .template("{msg} [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("=>-");

        let fetch = ProgressBar::new_spinner();
        fetch.set_message("Fetching messages");
        fetch.enable_steady_tick(Duration::from_millis(120));

        let media = ProgressBar::hidden();
        media.set_style(bar_style.clone());
        media.set_message("Downloading media");

        let posts = ProgressBar::hidden();
        posts.set_style(bar_style);
        posts.set_message("Rendering posts");

        Ok(Self {
            fetch,
            media,
            posts,
        })
    }
}

impl ExportObserver for TerminalProgress {
    fn media_progress(&self, completed: usize, total: usize) {
        if self.media.is_hidden() {
            self.media
                .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        self.media.set_length(total as u64);
        self.media.set_position(completed as u64);
        if total == 1 && completed == 0 {
            self.media.finish_with_message("No media to download");
        } else if completed >= total {
            self.media.finish_with_message("Media downloaded");
        }
    }

    fn fetch_finished(&self, posts: usize) {
        self.fetch
            .finish_with_message(format!("Fetched {posts} posts"));
        if !self.media.is_finished() {
            self.media.abandon();
        }
    }

    fn post_rendered(&self, rendered: usize, total: usize) {
        if self.posts.is_hidden() {
            self.posts
                .set_draw_target(indicatif::ProgressDrawTarget::stderr());
        }
        self.posts.set_length(total as u64);
        self.posts.set_position(rendered as u64);
        if rendered >= total {
            self.posts.finish_with_message("Document rendered");
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    channel_export::setup_logging();

    let cli = Cli::parse();
    let app = AppConfig::from_env().context("Failed to load configuration")?;

    let now = Utc::now();
    let start = parse_date_input(&cli.start, now)?;
    let end = match cli.end.as_deref().map(str::trim) {
        Some(day) if !day.is_empty() => end_of_day(parse_date_input(day, now)?),
        _ => now,
    };

    let name = channel_name(&cli.channel);
    let output_dir = cli.output_dir.clone().unwrap_or_else(|| app.results_dir.clone());
    let job = ExportConfig {
        channel: cli.channel.clone(),
        start,
        end,
        render: RenderOptions {
            include_date_heading: !cli.no_date_heading,
            placement: cli.images.into(),
            link_mode: cli.links.into(),
        },
        output_file: output_dir.join(output_filename(&name, start, end)),
        autosave_every: cli.autosave_every.unwrap_or(app.autosave_every),
    };

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current step");
            on_interrupt.cancel();
        }
    });

    let prompt: &dyn CredentialPrompt = if cli.non_interactive {
        &NoPrompt
    } else {
        &stdin_prompt
    };

    let progress = TerminalProgress::new()?;
    let source = ArchiveSource::new(&cli.archive, &app);
    let mut exporter = Exporter::new(source, &app).with_cancel(cancel);

    let summary = match exporter.run(&job, prompt, &progress).await {
        Ok(summary) => summary,
        Err(ExportError::Cancelled) => {
            info!("Export cancelled");
            std::process::exit(130);
        }
        Err(e) => return Err(e).context("Export failed"),
    };

    match &summary.output_file {
        Some(path) => {
            println!("Saved {}", path.display());
            println!("  Posts:          {}", summary.posts);
            println!("  Attachments:    {}", summary.attachments);
            println!("  Links found:    {}", summary.links_found);
            println!("  Distinct links: {}", summary.distinct_links.len());
        }
        None => println!("No posts found in the selected date range"),
    }

    Ok(())
}
