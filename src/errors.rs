//! Error taxonomy for the trend monitor.
//!
//! Mirrors the shape of a typical `thiserror`-rooted `AppError`: a top-level
//! enum wrapping per-subsystem error types via `#[from]`, so `?` composes
//! across module boundaries without manual `map_err` chains.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("analysis error: {0}")]
    Analysis(String),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    pub fn config(msg: impl Into<String>) -> Self {
        AppError::Config(msg.into())
    }
}

/// Transient fetch failure, per the error-handling design: network, timeout,
/// HTTP >= 400, XML parse error, or video-metadata extraction failure.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("network error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("timed out requesting {url}")]
    Timeout { url: String },

    #[error("unable to parse feed {url}: {message}")]
    Parse { url: String, message: String },

    #[error("no video metadata found on {url}")]
    MissingMetadata { url: String },

    #[error("unsupported source kind {kind:?} for {name}")]
    UnsupportedKind { name: String, kind: String },
}

impl SourceError {
    pub fn http(status: u16, url: impl Into<String>) -> Self {
        SourceError::Http {
            status,
            url: url.into(),
        }
    }

    pub fn transport(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SourceError::Transport {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        SourceError::Timeout { url: url.into() }
    }

    pub fn parse(url: impl Into<String>, message: impl std::fmt::Display) -> Self {
        SourceError::Parse {
            url: url.into(),
            message: message.to_string(),
        }
    }

    pub fn missing_metadata(url: impl Into<String>) -> Self {
        SourceError::MissingMetadata { url: url.into() }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        let url = err
            .url()
            .map(|u| u.to_string())
            .unwrap_or_else(|| "<unknown>".to_string());
        if err.is_timeout() {
            SourceError::Timeout { url }
        } else if let Some(status) = err.status() {
            SourceError::Http {
                status: status.as_u16(),
                url,
            }
        } else {
            SourceError::Transport {
                url,
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("migration error: {0}")]
    Migration(String),
}
