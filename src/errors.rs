use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Invalid input: {0}")]
    ValidationError(String),

    #[error("Failed to read message source: {0}")]
    SourceError(String),

    #[error("Failed to download attachment: {0}")]
    DownloadError(String),

    #[error("Failed to send HTTP request: {0}")]
    HttpError(String),

    #[error("Failed to render document: {0}")]
    RenderError(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Export cancelled")]
    Cancelled,
}

/// How an error is allowed to propagate through an export run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Aborts the whole fetch; nothing is returned.
    Fatal,
    /// Swallowed after logging at the point of occurrence.
    Isolated,
    /// Rejected before any remote call is made.
    Validation,
    Other,
}

impl ExportError {
    #[must_use]
    pub fn class(&self) -> ErrorClass {
        match self {
            ExportError::AuthError(_) => ErrorClass::Fatal,
            ExportError::DownloadError(_) => ErrorClass::Isolated,
            ExportError::ValidationError(_) => ErrorClass::Validation,
            _ => ErrorClass::Other,
        }
    }
}

impl From<reqwest::Error> for ExportError {
    fn from(error: reqwest::Error) -> Self {
        ExportError::HttpError(error.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(error: serde_json::Error) -> Self {
        ExportError::SourceError(format!("Malformed message data: {}", error))
    }
}

impl From<anyhow::Error> for ExportError {
    fn from(error: anyhow::Error) -> Self {
        ExportError::SourceError(error.to_string())
    }
}
