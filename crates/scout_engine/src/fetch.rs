use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use engine_logging::engine_debug;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
pub use reqwest::Method;
use url::Url;

use crate::decode::{decode_page, DecodedPage};
use crate::{TransportError, TransportKind};

pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// How many times to try a request and how long to wait in between.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, the first one included.
    pub max_attempts: u32,
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
    pub retryable_statuses: Vec<u16>,
}

impl RetryPolicy {
    /// Page fetches: few attempts, short waits, only server errors retried.
    pub fn page() -> Self {
        Self {
            max_attempts: 5,
            backoff_factor: Duration::from_millis(100),
            max_backoff: Duration::from_secs(120),
            retryable_statuses: vec![500, 502, 503, 504],
        }
    }

    /// Media hosts rate-limit harder, so 403 and 429 are retried as well.
    pub fn media() -> Self {
        Self {
            max_attempts: 10,
            backoff_factor: Duration::from_secs(1),
            max_backoff: Duration::from_secs(120),
            retryable_statuses: vec![403, 429, 500, 502, 503, 504],
        }
    }

    /// Single attempt.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff_factor: Duration::ZERO,
            max_backoff: Duration::ZERO,
            retryable_statuses: Vec::new(),
        }
    }

    /// Wait before retry number `retry` (1-based): `factor * 2^(retry-1)`, capped.
    pub fn backoff(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(16);
        self.backoff_factor
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    pub fn is_retryable_status(&self, status: u16) -> bool {
        self.retryable_statuses.contains(&status)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::page()
    }
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    /// Sent with every request of the session.
    pub headers: Vec<(String, String)>,
    pub connect_timeout: Duration,
    /// Longest silence allowed between two reads of one HTTP call.
    pub read_timeout: Duration,
    /// Deadline for a whole HTTP call, body included. `None` lets a media
    /// body run for as long as bytes keep arriving.
    pub request_timeout: Option<Duration>,
    pub redirect_limit: usize,
    pub retry: RetryPolicy,
}

impl FetchSettings {
    pub fn page() -> Self {
        Self {
            headers: browser_headers(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            request_timeout: Some(Duration::from_secs(30)),
            redirect_limit: 10,
            retry: RetryPolicy::page(),
        }
    }

    pub fn media() -> Self {
        Self {
            headers: browser_headers(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            request_timeout: None,
            redirect_limit: 10,
            retry: RetryPolicy::media(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(&name));
        self.headers.push((name, value.into()));
        self
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self::page()
    }
}

fn browser_headers() -> Vec<(String, String)> {
    vec![
        ("User-Agent".to_string(), BROWSER_USER_AGENT.to_string()),
        ("Accept".to_string(), "*/*".to_string()),
        ("Accept-Language".to_string(), "en-US,en;q=0.9".to_string()),
    ]
}

#[derive(Debug, Clone)]
pub struct FetchResponse {
    pub status: u16,
    pub final_url: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
    }

    pub fn text(&self) -> DecodedPage {
        decode_page(&self.body, self.content_type())
    }
}

/// A media body being received. `total` comes from `Content-Length`.
pub struct MediaStream {
    pub total: Option<u64>,
    pub final_url: String,
    chunks: BoxStream<'static, Result<Bytes, TransportError>>,
}

impl MediaStream {
    pub async fn next_chunk(&mut self) -> Option<Result<Bytes, TransportError>> {
        self.chunks.next().await
    }
}

/// Connection pool plus the read-only request defaults shared by every call.
#[derive(Debug, Clone)]
pub struct FetchSession {
    client: reqwest::Client,
    settings: Arc<FetchSettings>,
}

impl FetchSession {
    pub fn new(settings: FetchSettings) -> Result<Self, TransportError> {
        let mut default_headers = HeaderMap::new();
        for (name, value) in &settings.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| TransportError::new(TransportKind::Request, err.to_string()))?;
            let value = HeaderValue::from_str(value)
                .map_err(|err| TransportError::new(TransportKind::Request, err.to_string()))?;
            default_headers.insert(name, value);
        }

        let mut builder = reqwest::Client::builder()
            .default_headers(default_headers)
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit));
        if let Some(deadline) = settings.request_timeout {
            builder = builder.timeout(deadline);
        }
        let client = builder
            .build()
            .map_err(|err| TransportError::new(TransportKind::Request, err.to_string()))?;

        Ok(Self {
            client,
            settings: Arc::new(settings),
        })
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    pub async fn get(&self, url: &str) -> Result<FetchResponse, TransportError> {
        self.fetch(Method::GET, url, &[]).await
    }

    /// Issues one logical request, retrying per the session policy, and
    /// buffers the body. Non-success statuses are errors.
    pub async fn fetch(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<FetchResponse, TransportError> {
        let response = self.send_with_retry(method, url, headers).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(map_reqwest_error)?;
        Ok(FetchResponse {
            status,
            final_url,
            headers,
            body,
        })
    }

    /// Like `fetch` with GET, but hands back the body as a stream.
    pub async fn fetch_streaming(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<MediaStream, TransportError> {
        let response = self.send_with_retry(Method::GET, url, headers).await?;
        let total = response.content_length();
        let final_url = response.url().to_string();
        let chunks = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(map_reqwest_error))
            .boxed();
        Ok(MediaStream {
            total,
            final_url,
            chunks,
        })
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<reqwest::Response, TransportError> {
        let parsed = Url::parse(url)
            .map_err(|err| TransportError::new(TransportKind::InvalidUrl, err.to_string()))?;
        let policy = &self.settings.retry;
        let max_attempts = policy.max_attempts.max(1);

        let mut attempt = 1;
        loop {
            let mut request = self.client.request(method.clone(), parsed.clone());
            for (name, value) in headers {
                request = request.header(*name, *value);
            }

            let failure = match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return Ok(response);
                    }
                    let err = TransportError::new(
                        TransportKind::HttpStatus(status.as_u16()),
                        status.to_string(),
                    );
                    if !policy.is_retryable_status(status.as_u16()) {
                        return Err(err);
                    }
                    err
                }
                Err(err) => {
                    let err = map_reqwest_error(err);
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    err
                }
            };

            if attempt >= max_attempts {
                return Err(failure);
            }
            let wait = policy.backoff(attempt);
            engine_debug!(
                "Attempt {}/{} for {} failed ({}), retrying in {:?}",
                attempt,
                max_attempts,
                parsed.host_str().unwrap_or(""),
                failure.kind,
                wait
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }
}

fn map_reqwest_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        return TransportError::new(TransportKind::Timeout, err.to_string());
    }
    if err.is_redirect() {
        return TransportError::new(TransportKind::TooManyRedirects, err.to_string());
    }
    if err.is_connect() || err.is_body() {
        return TransportError::new(TransportKind::Connection, err.to_string());
    }
    TransportError::new(TransportKind::Request, err.to_string())
}
