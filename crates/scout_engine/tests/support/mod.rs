#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use scout_core::DownloadEvent;
use scout_engine::{
    Cookie, CookieSet, CookieSource, CookieStoreError, MediaInfo, MediaResolver, PayloadSink,
    ProgressPayload, ProgressSink, ResolveOptions, ResolvedMedia, ResolverDownloadOptions,
    ResolverError, ResolverErrorKind,
};

/// Scripted stand-in for the external resolver.
pub struct FakeResolver {
    pub resolve_result: Result<ResolvedMedia, ResolverError>,
    pub download_payloads: Vec<ProgressPayload>,
    pub download_result: Result<Option<PathBuf>, ResolverError>,
    pub probe_result: Result<MediaInfo, ResolverError>,
    pub download_calls: AtomicUsize,
    /// `(path, existed during the call)` for every cookie file seen by `resolve`.
    pub seen_cookie_files: Mutex<Vec<(PathBuf, bool)>>,
    pub seen_templates: Mutex<Vec<String>>,
}

impl FakeResolver {
    pub fn new() -> Self {
        Self {
            resolve_result: Err(failed("unsupported")),
            download_payloads: Vec::new(),
            download_result: Err(failed("unsupported")),
            probe_result: Err(failed("unsupported")),
            download_calls: AtomicUsize::new(0),
            seen_cookie_files: Mutex::new(Vec::new()),
            seen_templates: Mutex::new(Vec::new()),
        }
    }

    pub fn login_required() -> Self {
        Self {
            resolve_result: Err(ResolverError::from_message(
                "ERROR: [Example] 123: login required to view this post",
            )),
            ..Self::new()
        }
    }
}

pub fn failed(message: &str) -> ResolverError {
    ResolverError::new(ResolverErrorKind::Failed, message)
}

#[async_trait]
impl MediaResolver for FakeResolver {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn resolve(
        &self,
        _url: &str,
        options: &ResolveOptions,
    ) -> Result<ResolvedMedia, ResolverError> {
        if let Some(path) = &options.cookie_file {
            let existed = path.is_file();
            self.seen_cookie_files
                .lock()
                .unwrap()
                .push((path.clone(), existed));
        }
        self.resolve_result.clone()
    }

    async fn download(
        &self,
        _url: &str,
        options: &ResolverDownloadOptions,
        progress: &dyn PayloadSink,
    ) -> Result<Option<PathBuf>, ResolverError> {
        self.download_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_templates
            .lock()
            .unwrap()
            .push(options.output_template.clone());
        for payload in &self.download_payloads {
            progress.report(payload.clone());
        }
        self.download_result.clone()
    }

    async fn probe(&self, _url: &str) -> Result<MediaInfo, ResolverError> {
        self.probe_result.clone()
    }
}

/// A cookie source with a fixed answer.
pub struct StaticCookies(pub Vec<Cookie>);

impl CookieSource for StaticCookies {
    fn name(&self) -> &str {
        "static"
    }

    fn load(&self, _domain: &str) -> Result<CookieSet, CookieStoreError> {
        Ok(CookieSet::new(self.0.clone()))
    }
}

pub fn session_cookie(domain: &str) -> Cookie {
    Cookie {
        domain: domain.to_string(),
        name: "sessionid".to_string(),
        value: "s3cr3t".to_string(),
        path: "/".to_string(),
        secure: true,
        expires: 0,
    }
}

#[derive(Default, Clone)]
pub struct RecordingSink {
    events: Arc<Mutex<Vec<DownloadEvent>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take(&self) -> Vec<DownloadEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }
}

impl ProgressSink for RecordingSink {
    fn emit(&self, event: DownloadEvent) {
        self.events.lock().unwrap().push(event);
    }
}

/// Percent values carried by the progress events, in order.
pub fn percents(events: &[DownloadEvent]) -> Vec<f64> {
    events
        .iter()
        .filter_map(|event| match event {
            DownloadEvent::Progress(progress) => progress.progress.as_percent(),
            DownloadEvent::Finished { .. } => None,
        })
        .collect()
}
