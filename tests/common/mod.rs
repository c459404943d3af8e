#![allow(dead_code)]

use async_trait::async_trait;
use channel_export::core::models::{
    AttachmentLocation, AttachmentRef, FormatAnnotation, GroupKey, RawMessage,
};
use channel_export::errors::ExportError;
use channel_export::source::{
    ChannelRef, CredentialPrompt, MessageSource, PageRequest, SessionInfo,
};
use chrono::{DateTime, TimeZone, Utc};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// What the pipeline asked of a [`FakeSource`].
#[derive(Debug, Default)]
pub struct CallLog {
    pub authentications: usize,
    pub resolved: Vec<String>,
    pub pages: Vec<PageRequest>,
    pub downloads: Vec<i64>,
    pub disconnects: usize,
}

/// In-memory message source.
pub struct FakeSource {
    messages: Vec<RawMessage>,
    pub fail_auth: bool,
    /// Serve messages newer than the page's offset date, like a source whose date
    /// anchor is only approximate.
    pub ignore_anchor: bool,
    pub failing_downloads: HashSet<i64>,
    pub log: Arc<Mutex<CallLog>>,
}

impl FakeSource {
    pub fn new(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            fail_auth: false,
            ignore_anchor: false,
            failing_downloads: HashSet::new(),
            log: Arc::new(Mutex::new(CallLog::default())),
        }
    }

    pub fn failing_auth(mut self) -> Self {
        self.fail_auth = true;
        self
    }

    pub fn ignoring_anchor(mut self) -> Self {
        self.ignore_anchor = true;
        self
    }

    pub fn failing_download(mut self, id: i64) -> Self {
        self.failing_downloads.insert(id);
        self
    }

    pub fn log(&self) -> Arc<Mutex<CallLog>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn authenticate(
        &mut self,
        _prompt: &dyn CredentialPrompt,
    ) -> Result<SessionInfo, ExportError> {
        self.log.lock().unwrap().authentications += 1;
        if self.fail_auth {
            return Err(ExportError::AuthError("session rejected".to_string()));
        }
        Ok(SessionInfo {
            display_name: "tester".to_string(),
        })
    }

    async fn resolve_channel(&self, channel: &str) -> Result<ChannelRef, ExportError> {
        self.log.lock().unwrap().resolved.push(channel.to_string());
        Ok(ChannelRef {
            id: channel.to_string(),
            title: channel.to_string(),
        })
    }

    async fn fetch_page(
        &self,
        _channel: &ChannelRef,
        request: &PageRequest,
    ) -> Result<Vec<RawMessage>, ExportError> {
        self.log.lock().unwrap().pages.push(request.clone());
        let mut page: Vec<RawMessage> = self
            .messages
            .iter()
            .filter(|m| self.ignore_anchor || m.timestamp <= request.offset_date)
            .filter(|m| request.before_id.is_none_or(|before| m.id < before))
            .cloned()
            .collect();
        page.sort_by(|a, b| b.id.cmp(&a.id));
        page.truncate(request.limit);
        Ok(page)
    }

    async fn download_attachment(
        &self,
        message: &RawMessage,
        dir: &Path,
    ) -> Result<Option<PathBuf>, ExportError> {
        self.log.lock().unwrap().downloads.push(message.id);
        if self.failing_downloads.contains(&message.id) {
            return Err(ExportError::DownloadError(format!(
                "message {} unavailable",
                message.id
            )));
        }
        let Some(attachment) = &message.attachment else {
            return Ok(None);
        };
        let name = attachment.file_name.clone().unwrap_or_else(|| "file.bin".to_string());
        let path = dir.join(format!("{}_{}", message.id, name));
        std::fs::write(&path, format!("bytes of {}", message.id))?;
        Ok(Some(path))
    }

    async fn disconnect(&mut self) {
        self.log.lock().unwrap().disconnects += 1;
    }
}

pub fn at(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
}

pub fn message(id: i64, timestamp: DateTime<Utc>, text: &str) -> RawMessage {
    RawMessage {
        id,
        timestamp,
        text: text.to_string(),
        annotations: vec![],
        attachment: None,
        group_key: None,
        is_service: false,
    }
}

pub fn with_attachment(mut message: RawMessage, name: &str) -> RawMessage {
    message.attachment = Some(AttachmentRef {
        file_id: format!("file-{}", message.id),
        file_name: Some(name.to_string()),
        mime_type: None,
        size: None,
        location: AttachmentLocation::Local(PathBuf::from(name)),
    });
    message
}

pub fn in_group(mut message: RawMessage, key: &str) -> RawMessage {
    message.group_key = Some(GroupKey::new(key));
    message
}

pub fn with_annotations(mut message: RawMessage, annotations: Vec<FormatAnnotation>) -> RawMessage {
    message.annotations = annotations;
    message
}

pub fn service(mut message: RawMessage) -> RawMessage {
    message.is_service = true;
    message
}
