//! The specialized media-resolution capability, modeled as an injected trait.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::probe::MediaInfo;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ResolverError {
    pub kind: ResolverErrorKind,
    pub message: String,
}

impl ResolverError {
    pub fn new(kind: ResolverErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Classifies free-form resolver output.
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let kind = if message.to_ascii_lowercase().contains("login required") {
            ResolverErrorKind::LoginRequired
        } else {
            ResolverErrorKind::Failed
        };
        Self { kind, message }
    }

    pub fn is_login_required(&self) -> bool {
        self.kind == ResolverErrorKind::LoginRequired
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolverErrorKind {
    LoginRequired,
    /// The resolver program is missing or could not be started.
    Unavailable,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub format: String,
    /// Keep going when parts of the metadata cannot be extracted.
    pub best_effort: bool,
    pub cookie_file: Option<PathBuf>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            format: "best".to_string(),
            best_effort: true,
            cookie_file: None,
        }
    }
}

/// Waits `min(initial + step * n, ceiling)` before retry `n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinearBackoff {
    pub initial: Duration,
    pub step: Duration,
    pub ceiling: Duration,
}

impl LinearBackoff {
    pub fn delay(&self, retry: u32) -> Duration {
        self.initial
            .saturating_add(self.step.saturating_mul(retry))
            .min(self.ceiling)
    }
}

impl Default for LinearBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(10),
            step: Duration::from_secs(1),
            ceiling: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolverDownloadOptions {
    pub format: String,
    /// Template understood by the resolver, e.g. `dir/%(title)s.%(ext)s`.
    pub output_template: String,
    pub socket_timeout: Duration,
    pub retries: u32,
    pub fragment_retries: u32,
    pub retry_sleep: LinearBackoff,
    pub skip_certificate_check: bool,
    pub geo_bypass_country: Option<String>,
    pub ignore_errors: bool,
}

impl Default for ResolverDownloadOptions {
    fn default() -> Self {
        Self {
            format: "best".to_string(),
            output_template: "%(title)s.%(ext)s".to_string(),
            socket_timeout: Duration::from_secs(120),
            retries: 30,
            fragment_retries: 30,
            retry_sleep: LinearBackoff::default(),
            skip_certificate_check: true,
            geo_bypass_country: Some("US".to_string()),
            ignore_errors: true,
        }
    }
}

/// Progress as the resolver reports it: whichever fields it happens to know.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressPayload {
    Downloading(DownloadStats),
    Finished,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DownloadStats {
    pub downloaded_bytes: Option<u64>,
    pub total_bytes: Option<u64>,
    pub total_bytes_estimate: Option<u64>,
    /// Human percent string such as `" 42.1%"`.
    pub percent_text: Option<String>,
}

pub trait PayloadSink: Send + Sync {
    fn report(&self, payload: ProgressPayload);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedMedia {
    Single(String),
    /// Multi-item posts and playlists.
    Entries(Vec<String>),
}

impl ResolvedMedia {
    pub fn into_urls(self) -> Vec<String> {
        match self {
            ResolvedMedia::Single(url) => vec![url],
            ResolvedMedia::Entries(urls) => urls,
        }
    }
}

/// An external component that knows how to turn page URLs into streams and
/// files. Failures are classified, never reimplemented.
#[async_trait]
pub trait MediaResolver: Send + Sync {
    fn name(&self) -> &'static str;

    /// Resolves playable stream URLs without downloading.
    async fn resolve(
        &self,
        url: &str,
        options: &ResolveOptions,
    ) -> Result<ResolvedMedia, ResolverError>;

    /// Downloads `url`; returns the final file path when the resolver tells.
    async fn download(
        &self,
        url: &str,
        options: &ResolverDownloadOptions,
        progress: &dyn PayloadSink,
    ) -> Result<Option<PathBuf>, ResolverError>;

    /// Title and thumbnail, for display only.
    async fn probe(&self, url: &str) -> Result<MediaInfo, ResolverError>;
}
