use std::fmt;
use std::path::PathBuf;

use scout_core::{CandidateSet, DownloadEvent, TaskId};

use crate::probe::MediaInfo;

pub type RequestId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ScanCompleted {
        request_id: RequestId,
        result: Result<CandidateSet, ScoutError>,
    },
    Download(DownloadEvent),
    ProbeCompleted {
        request_id: RequestId,
        result: Result<MediaInfo, String>,
    },
}

/// Which strategy produced the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Resolver,
    DirectStream,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub task_id: TaskId,
    pub strategy: Strategy,
    /// Known for the direct stream; the resolver reports it when it can.
    pub path: Option<PathBuf>,
    pub bytes_written: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportKind,
    pub message: String,
}

impl TransportError {
    pub(crate) fn new(kind: TransportKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Fixed, user-presentable text for the failure class.
    pub fn user_message(&self) -> &'static str {
        match self.kind {
            TransportKind::Connection => {
                "Connection was interrupted. Please check your internet connection and try again."
            }
            TransportKind::Timeout => {
                "The connection timed out. Please try again or check your internet connection."
            }
            TransportKind::TooManyRedirects => {
                "Too many redirects. The website might be blocking automated access."
            }
            TransportKind::InvalidUrl => "The URL is not valid. Please check the URL and try again.",
            TransportKind::HttpStatus(_) | TransportKind::Request => {
                "Failed to connect to the website. Please check the URL and try again."
            }
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, TransportKind::Connection | TransportKind::Timeout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    InvalidUrl,
    Connection,
    Timeout,
    TooManyRedirects,
    HttpStatus(u16),
    Request,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::InvalidUrl => write!(f, "invalid url"),
            TransportKind::Connection => write!(f, "connection interrupted"),
            TransportKind::Timeout => write!(f, "timeout"),
            TransportKind::TooManyRedirects => write!(f, "too many redirects"),
            TransportKind::HttpStatus(code) => write!(f, "http status {code}"),
            TransportKind::Request => write!(f, "request failed"),
        }
    }
}

/// Terminal error of a scan or download. `Display` is the message shown to
/// the user.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScoutError {
    #[error("{}", .0.user_message())]
    Transport(#[source] TransportError),
    #[error("{message}")]
    Extraction {
        message: String,
        #[source]
        cause: Option<TransportError>,
    },
    #[error("This {platform} content requires login. Please log in to {platform} in your browser first.")]
    AuthRequired { platform: String },
    #[error("Download failed: {fallback}")]
    Download { primary: String, fallback: String },
}

impl ScoutError {
    pub(crate) fn extraction(message: impl Into<String>) -> Self {
        ScoutError::Extraction {
            message: message.into(),
            cause: None,
        }
    }

    pub(crate) fn extraction_from_transport(err: TransportError) -> Self {
        ScoutError::Extraction {
            message: format!("Error extracting videos: {}", err.user_message()),
            cause: Some(err),
        }
    }
}

impl From<TransportError> for ScoutError {
    fn from(err: TransportError) -> Self {
        ScoutError::Transport(err)
    }
}
