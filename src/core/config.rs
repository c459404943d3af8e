use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

use crate::errors::ExportError;

pub const DEFAULT_FILE_API_BASE: &str = "https://api.telegram.org";
pub const DEFAULT_AUTOSAVE_EVERY: usize = 50;
pub const DEFAULT_PAGE_SIZE: usize = 100;
pub const DEFAULT_MAX_ATTACHMENT_BYTES: usize = 50 * 1024 * 1024;

/// Process-wide settings read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bot_token: Option<String>,
    pub file_api_base: String,
    pub results_dir: PathBuf,
    pub work_dir: PathBuf,
    pub autosave_every: usize,
    pub max_attachment_bytes: usize,
    pub page_size: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            file_api_base: DEFAULT_FILE_API_BASE.to_string(),
            results_dir: PathBuf::from("./results"),
            work_dir: PathBuf::from("./temp_media"),
            autosave_every: DEFAULT_AUTOSAVE_EVERY,
            max_attachment_bytes: DEFAULT_MAX_ATTACHMENT_BYTES,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

impl AppConfig {
    /// # Errors
    ///
    /// Returns `ConfigError` when a numeric variable is malformed or zero.
    pub fn from_env() -> Result<Self, ExportError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::from_env`] but reads variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` when a numeric variable is malformed or zero.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ExportError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let non_blank = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Ok(Self {
            bot_token: non_blank("TG_BOT_TOKEN"),
            file_api_base: non_blank("TG_FILE_API_BASE")
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or(defaults.file_api_base),
            results_dir: non_blank("EXPORT_RESULTS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.results_dir),
            work_dir: non_blank("EXPORT_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            autosave_every: parse_positive(
                "EXPORT_AUTOSAVE_EVERY",
                non_blank("EXPORT_AUTOSAVE_EVERY"),
                defaults.autosave_every,
            )?,
            max_attachment_bytes: parse_positive(
                "EXPORT_MAX_ATTACHMENT_BYTES",
                non_blank("EXPORT_MAX_ATTACHMENT_BYTES"),
                defaults.max_attachment_bytes,
            )?,
            page_size: parse_positive(
                "EXPORT_PAGE_SIZE",
                non_blank("EXPORT_PAGE_SIZE"),
                defaults.page_size,
            )?,
        })
    }
}

fn parse_positive(key: &str, raw: Option<String>, default: usize) -> Result<usize, ExportError> {
    let Some(raw) = raw else {
        return Ok(default);
    };
    match raw.trim().parse::<usize>() {
        Ok(0) => Err(ExportError::ConfigError(format!("{}: must be greater than zero", key))),
        Ok(value) => Ok(value),
        Err(e) => Err(ExportError::ConfigError(format!("{}: {}", key, e))),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentPlacement {
    Before,
    #[default]
    After,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkMode {
    /// Clickable hyperlinks.
    #[default]
    Active,
    /// Styled like a link but not clickable.
    Inert,
}

/// Rendering preferences threaded through from setup; never computed by the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub include_date_heading: bool,
    pub placement: AttachmentPlacement,
    pub link_mode: LinkMode,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            include_date_heading: true,
            placement: AttachmentPlacement::After,
            link_mode: LinkMode::Active,
        }
    }
}

/// Settings for a single export job.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub channel: String,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub render: RenderOptions,
    pub output_file: PathBuf,
    pub autosave_every: usize,
}
