use thiserror::Error;

/// SQLSTATE reported by Postgres for unique constraint violations.
const UNIQUE_VIOLATION: &str = "23505";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{service} API error ({status}): {message}")]
    Api {
        service: &'static str,
        status: u16,
        message: String,
    },

    #[error(
        "Database error{}: {}",
        .code.as_deref().map(|c| format!(" [{}]", c)).unwrap_or_default(),
        .message
    )]
    Database {
        code: Option<String>,
        message: String,
    },

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Audio error: {0}")]
    Audio(#[from] hound::Error),

    #[error("{service} quota or rate limit exceeded: {message}")]
    QuotaExceeded {
        service: &'static str,
        message: String,
    },

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, AppError>;

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<url::ParseError> for AppError {
    fn from(err: url::ParseError) -> Self {
        AppError::Config(format!("invalid URL: {}", err))
    }
}

impl AppError {
    pub fn parse(message: impl Into<String>) -> Self {
        AppError::Parse(message.into())
    }

    /// True when the backend rejected a write because the row already exists.
    ///
    /// The SQLSTATE code is authoritative. Text matching is only used for
    /// errors that arrive without a code.
    pub fn is_duplicate_key(&self) -> bool {
        match self {
            AppError::Database { code: Some(code), .. } => code == UNIQUE_VIOLATION,
            AppError::Database { code: None, message } => {
                let message = message.to_lowercase();
                message.contains("duplicate") || message.contains("unique")
            }
            _ => false,
        }
    }

    /// True when an upstream service reported that its quota or rate limit
    /// was hit.
    ///
    /// Typed `QuotaExceeded` errors come from HTTP 429 and
    /// `RESOURCE_EXHAUSTED` responses. Upstream errors without a structured
    /// status fall back to matching "quota" or "limit" in the message, which
    /// can misfire on unrelated limit errors.
    pub fn is_quota_exceeded(&self) -> bool {
        match self {
            AppError::QuotaExceeded { .. } => true,
            AppError::Api { status: 429, .. } => true,
            AppError::Api { message, .. } | AppError::Storage(message) => {
                mentions_quota(message)
            }
            AppError::Other(err) => mentions_quota(&err.to_string()),
            _ => false,
        }
    }
}

fn mentions_quota(message: &str) -> bool {
    let message = message.to_lowercase();
    message.contains("quota") || message.contains("limit")
}
