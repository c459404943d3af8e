//! Channel archive source
//!
//! Reads a directory holding `messages.json`, a dump of Telegram Bot API `Message`
//! objects for one channel. Attachments either sit next to the dump (`file_path`
//! relative to the archive) or, for `"remote_files": true` archives, are fetched from
//! the Bot API file endpoint with the bot token.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use reqwest::Client;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_retry::RetryIf;
use tokio_retry::strategy::{ExponentialBackoff, jitter};
use tracing::{debug, info, warn};

use super::{ChannelRef, CredentialPrompt, MessageSource, PageRequest, SessionInfo};
use crate::core::config::AppConfig;
use crate::core::models::{
    AnnotationKind, AttachmentLocation, AttachmentRef, FormatAnnotation, GroupKey, RawMessage,
};
use crate::errors::ExportError;
use crate::utils::mime::extension_for_mime;
use crate::utils::naming::{channel_name, sanitize_file_name};

pub const MESSAGES_FILE: &str = "messages.json";

#[derive(Debug, Deserialize)]
struct ArchiveFile {
    channel: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    remote_files: bool,
    messages: Vec<BotMessage>,
}

#[derive(Debug, Clone, Deserialize)]
struct BotEntity {
    #[serde(rename = "type")]
    entity_type: String,
    offset: usize,
    length: usize,
    #[serde(default)]
    url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BotPhotoSize {
    file_id: String,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BotFile {
    file_id: String,
    #[serde(default)]
    file_name: Option<String>,
    #[serde(default)]
    mime_type: Option<String>,
    #[serde(default)]
    file_size: Option<u64>,
    #[serde(default)]
    file_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct BotMessage {
    message_id: i64,
    date: i64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    caption: Option<String>,
    #[serde(default)]
    entities: Vec<BotEntity>,
    #[serde(default)]
    caption_entities: Vec<BotEntity>,
    #[serde(default)]
    media_group_id: Option<String>,
    #[serde(default)]
    photo: Vec<BotPhotoSize>,
    #[serde(default)]
    document: Option<BotFile>,
    #[serde(default)]
    video: Option<BotFile>,
    #[serde(default)]
    audio: Option<BotFile>,
    #[serde(default)]
    animation: Option<BotFile>,
    #[serde(default)]
    voice: Option<BotFile>,
    #[serde(default)]
    new_chat_title: Option<String>,
    #[serde(default)]
    new_chat_photo: Option<Value>,
    #[serde(default)]
    delete_chat_photo: bool,
    #[serde(default)]
    pinned_message: Option<Value>,
    #[serde(default)]
    channel_chat_created: bool,
    #[serde(default)]
    group_chat_created: bool,
    #[serde(default)]
    supergroup_chat_created: bool,
    #[serde(default)]
    migrate_to_chat_id: Option<i64>,
    #[serde(default)]
    migrate_from_chat_id: Option<i64>,
}

impl BotMessage {
    fn is_service(&self) -> bool {
        self.new_chat_title.is_some()
            || self.new_chat_photo.is_some()
            || self.delete_chat_photo
            || self.pinned_message.is_some()
            || self.channel_chat_created
            || self.group_chat_created
            || self.supergroup_chat_created
            || self.migrate_to_chat_id.is_some()
            || self.migrate_from_chat_id.is_some()
    }

    fn to_raw(&self, remote: bool) -> Result<RawMessage, ExportError> {
        let timestamp = DateTime::<Utc>::from_timestamp(self.date, 0).ok_or_else(|| {
            ExportError::SourceError(format!(
                "message {} has an invalid date {}",
                self.message_id, self.date
            ))
        })?;

        let (text, entities) = match (&self.text, &self.caption) {
            (Some(text), _) => (text.clone(), &self.entities),
            (None, Some(caption)) => (caption.clone(), &self.caption_entities),
            (None, None) => (String::new(), &self.entities),
        };

        Ok(RawMessage {
            id: self.message_id,
            timestamp,
            text,
            annotations: entities.iter().filter_map(to_annotation).collect(),
            attachment: self.attachment(remote),
            group_key: self.media_group_id.clone().map(GroupKey),
            is_service: self.is_service(),
        })
    }

    fn attachment(&self, remote: bool) -> Option<AttachmentRef> {
        // Bot API lists photo sizes smallest first.
        if let Some(photo) = self.photo.last() {
            let file_name = photo
                .file_path
                .as_deref()
                .and_then(base_name)
                .unwrap_or_else(|| format!("photo_{}.jpg", self.message_id));
            return Some(AttachmentRef {
                file_id: photo.file_id.clone(),
                file_name: Some(file_name),
                mime_type: Some("image/jpeg".to_string()),
                size: photo.file_size,
                location: location(photo.file_path.as_deref(), remote)?,
            });
        }

        let file = self
            .document
            .as_ref()
            .or(self.video.as_ref())
            .or(self.animation.as_ref())
            .or(self.audio.as_ref())
            .or(self.voice.as_ref())?;

        Some(AttachmentRef {
            file_id: file.file_id.clone(),
            file_name: file
                .file_name
                .clone()
                .or_else(|| file.file_path.as_deref().and_then(base_name)),
            mime_type: file.mime_type.clone(),
            size: file.file_size,
            location: location(file.file_path.as_deref(), remote)?,
        })
    }
}

fn location(file_path: Option<&str>, remote: bool) -> Option<AttachmentLocation> {
    if remote {
        return Some(AttachmentLocation::Remote(file_path.map(str::to_string)));
    }
    file_path.map(|p| AttachmentLocation::Local(PathBuf::from(p)))
}

/// Name for an attachment that arrived without one: its file id plus an extension
/// guessed from the declared MIME type.
fn fallback_file_name(attachment: &AttachmentRef) -> String {
    let stem = sanitize_file_name(&attachment.file_id);
    match attachment.mime_type.as_deref().and_then(extension_for_mime) {
        Some(ext) => format!("{stem}.{ext}"),
        None => stem,
    }
}

fn base_name(path: &str) -> Option<String> {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
}

fn to_annotation(entity: &BotEntity) -> Option<FormatAnnotation> {
    let kind = match entity.entity_type.as_str() {
        "bold" => AnnotationKind::Bold,
        "italic" => AnnotationKind::Italic,
        "code" => AnnotationKind::Code,
        "pre" => AnnotationKind::Preformatted,
        "text_link" => AnnotationKind::NamedLink(entity.url.clone()),
        "url" => AnnotationKind::BareLink,
        _ => return None,
    };
    Some(FormatAnnotation::new(entity.offset, entity.length, kind))
}

#[derive(Debug, Deserialize)]
struct BotApiResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotUser {
    first_name: String,
    #[serde(default)]
    username: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BotFilePath {
    #[serde(default)]
    file_path: Option<String>,
}

/// Archive contents held while a session is open.
#[derive(Debug)]
struct OpenArchive {
    channel: String,
    title: String,
    remote_files: bool,
    /// Newest first.
    messages: Vec<BotMessage>,
}

/// [`MessageSource`] backed by an on-disk channel archive.
pub struct ArchiveSource {
    root: PathBuf,
    file_api_base: String,
    token: Option<String>,
    max_attachment_bytes: usize,
    http: Client,
    archive: Option<OpenArchive>,
}

impl ArchiveSource {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, config: &AppConfig) -> Self {
        Self {
            root: root.into(),
            file_api_base: config.file_api_base.clone(),
            token: config.bot_token.clone(),
            max_attachment_bytes: config.max_attachment_bytes,
            http: Client::new(),
            archive: None,
        }
    }

    fn open(&self) -> Result<&OpenArchive, ExportError> {
        self.archive
            .as_ref()
            .ok_or_else(|| ExportError::SourceError("archive session is not open".to_string()))
    }

    async fn load(&self) -> Result<OpenArchive, ExportError> {
        let path = self.root.join(MESSAGES_FILE);
        let raw = tokio::fs::read(&path).await.map_err(|e| {
            ExportError::AuthError(format!("cannot open archive {}: {}", path.display(), e))
        })?;
        let file: ArchiveFile = serde_json::from_slice(&raw).map_err(|e| {
            ExportError::AuthError(format!("cannot parse archive {}: {}", path.display(), e))
        })?;

        let mut messages = file.messages;
        messages.sort_by(|a, b| b.message_id.cmp(&a.message_id));

        Ok(OpenArchive {
            title: file.title.unwrap_or_else(|| file.channel.clone()),
            channel: file.channel,
            remote_files: file.remote_files,
            messages,
        })
    }

    fn bot_url(&self, token: &str, method: &str) -> String {
        format!("{}/bot{}/{}", self.file_api_base, token, method)
    }

    fn token(&self) -> Result<&str, ExportError> {
        self.token
            .as_deref()
            .ok_or_else(|| ExportError::AuthError("no bot token for remote files".to_string()))
    }

    async fn with_retry<F, Fut, T>(&self, operation: F) -> Result<T, ExportError>
    where
        F: FnMut() -> Fut + Send,
        Fut: std::future::Future<Output = Result<T, ExportError>> + Send,
        T: Send,
    {
        let strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(10))
            .map(jitter)
            .take(5);

        RetryIf::spawn(strategy, operation, |e: &ExportError| {
            matches!(e, ExportError::HttpError(_))
        })
        .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ExportError> {
        let resp = self.http.get(url).query(query).send().await?;
        Ok(resp.json::<T>().await?)
    }

    async fn get_me(&self, token: &str) -> Result<BotUser, ExportError> {
        let url = self.bot_url(token, "getMe");
        let resp: BotApiResponse<BotUser> = self
            .with_retry(|| self.get_json(&url, &[]))
            .await?;

        match resp.result {
            Some(user) if resp.ok => Ok(user),
            _ => Err(ExportError::AuthError(format!(
                "getMe rejected the bot token: {}",
                resp.description.unwrap_or_else(|| "unknown error".to_string())
            ))),
        }
    }

    async fn remote_file_path(&self, token: &str, file_id: &str) -> Result<String, ExportError> {
        let url = self.bot_url(token, "getFile");
        let query = [("file_id", file_id)];
        let resp: BotApiResponse<BotFilePath> = self
            .with_retry(|| self.get_json(&url, &query))
            .await?;

        resp.result
            .filter(|_| resp.ok)
            .and_then(|f| f.file_path)
            .ok_or_else(|| {
                ExportError::DownloadError(format!(
                    "getFile returned no path for {}: {}",
                    file_id,
                    resp.description.as_deref().unwrap_or("unknown error")
                ))
            })
    }

    /// Download `url` into memory, refusing bodies over the configured cap.
    async fn download_bytes(&self, url: &str) -> Result<Vec<u8>, ExportError> {
        let max_bytes = self.max_attachment_bytes;

        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ExportError::HttpError(format!("Failed to download file: {e}")))?;

        if resp.status().is_server_error() {
            return Err(ExportError::HttpError(format!(
                "file download HTTP {}",
                resp.status()
            )));
        }
        if !resp.status().is_success() {
            return Err(ExportError::DownloadError(format!(
                "file download HTTP {}",
                resp.status()
            )));
        }

        if let Some(len) = resp.content_length()
            && len > u64::try_from(max_bytes).unwrap_or(u64::MAX)
        {
            return Err(ExportError::DownloadError(format!(
                "file too large ({len}B > {max_bytes}B)"
            )));
        }

        let mut out: Vec<u8> = Vec::new();
        let mut stream = resp.bytes_stream();
        while let Some(item) = stream.next().await {
            let chunk = item.map_err(|e| {
                ExportError::HttpError(format!("Error reading file download stream: {e}"))
            })?;
            if out.len().saturating_add(chunk.len()) > max_bytes {
                return Err(ExportError::DownloadError(format!(
                    "file too large (exceeded {max_bytes}B cap)"
                )));
            }
            out.extend_from_slice(&chunk);
        }

        Ok(out)
    }
}

#[async_trait]
impl MessageSource for ArchiveSource {
    async fn authenticate(
        &mut self,
        prompt: &dyn CredentialPrompt,
    ) -> Result<SessionInfo, ExportError> {
        let archive = self.load().await?;
        info!(
            "Opened archive for '{}' with {} messages",
            archive.channel,
            archive.messages.len()
        );

        let display_name = if archive.remote_files {
            if self.token.is_none() {
                self.token = prompt
                    .prompt("Bot token")
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
            }
            let token = self.token()?.to_string();
            let me = self.get_me(&token).await?;
            match me.username {
                Some(username) => format!("{} (@{})", me.first_name, username),
                None => me.first_name,
            }
        } else {
            format!("local archive {}", self.root.display())
        };

        self.archive = Some(archive);
        Ok(SessionInfo { display_name })
    }

    async fn resolve_channel(&self, channel: &str) -> Result<ChannelRef, ExportError> {
        let archive = self.open()?;
        let wanted = channel_name(channel);
        if !wanted.eq_ignore_ascii_case(&channel_name(&archive.channel)) {
            return Err(ExportError::SourceError(format!(
                "channel '{}' not found (archive holds '{}')",
                channel, archive.channel
            )));
        }
        Ok(ChannelRef {
            id: archive.channel.clone(),
            title: archive.title.clone(),
        })
    }

    async fn fetch_page(
        &self,
        channel: &ChannelRef,
        request: &PageRequest,
    ) -> Result<Vec<RawMessage>, ExportError> {
        let archive = self.open()?;
        if channel.id != archive.channel {
            return Err(ExportError::SourceError(format!(
                "channel '{}' is not part of this archive",
                channel.id
            )));
        }

        let offset_secs = request.offset_date.timestamp();
        let page = archive
            .messages
            .iter()
            .filter(|m| m.date <= offset_secs)
            .filter(|m| request.before_id.is_none_or(|before| m.message_id < before))
            .take(request.limit)
            .map(|m| m.to_raw(archive.remote_files))
            .collect::<Result<Vec<_>, _>>()?;

        debug!(
            "Archive page before {:?}: {} messages",
            request.before_id,
            page.len()
        );
        Ok(page)
    }

    async fn download_attachment(
        &self,
        message: &RawMessage,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ExportError> {
        let Some(attachment) = message.attachment.as_ref() else {
            return Ok(None);
        };

        let file_name = match attachment.file_name.as_deref() {
            Some(name) => sanitize_file_name(name),
            None => fallback_file_name(attachment),
        };
        let target = dir.join(format!("{}_{}", message.id, file_name));

        match &attachment.location {
            AttachmentLocation::Local(relative) => {
                let source = self.root.join(relative);
                tokio::fs::copy(&source, &target).await.map_err(|e| {
                    ExportError::DownloadError(format!("cannot copy {}: {}", source.display(), e))
                })?;
            }
            AttachmentLocation::Remote(file_path) => {
                if let Some(size) = attachment.size
                    && size > u64::try_from(self.max_attachment_bytes).unwrap_or(u64::MAX)
                {
                    return Err(ExportError::DownloadError(format!(
                        "file {} too large ({}B > {}B)",
                        attachment.file_id, size, self.max_attachment_bytes
                    )));
                }
                let token = self.token()?;
                let file_path = match file_path {
                    Some(path) => path.clone(),
                    None => self.remote_file_path(token, &attachment.file_id).await?,
                };
                let url = format!("{}/file/bot{}/{}", self.file_api_base, token, file_path);
                let bytes = self.with_retry(|| self.download_bytes(&url)).await?;
                if let Err(e) = tokio::fs::write(&target, &bytes).await {
                    warn!("Failed to write {}: {}", target.display(), e);
                    return Err(e.into());
                }
            }
        }

        Ok(Some(target))
    }

    async fn disconnect(&mut self) {
        if self.archive.take().is_some() {
            debug!("Closed archive session for {}", self.root.display());
        }
    }
}
