use std::sync::Arc;

use engine_logging::engine_info;
use scout_core::{CandidateSet, MediaCandidate, SourceHint};
use url::Url;

use crate::config::host_matches;
use crate::extract::Extractor;
use crate::patterns::has_media_extension;
use crate::{ScoutError, TransportError, TransportKind};

/// Entry point for one user-entered URL: either it already is a stream, or
/// the page behind it gets extracted.
pub struct Scanner {
    extractor: Arc<dyn Extractor>,
    direct_hosts: Vec<String>,
}

impl Scanner {
    pub fn new(extractor: Arc<dyn Extractor>, direct_hosts: Vec<String>) -> Self {
        Self {
            extractor,
            direct_hosts,
        }
    }

    /// The hint a URL gets when it needs no page fetch, if any.
    pub fn direct_hint(&self, url: &Url) -> Option<SourceHint> {
        if has_media_extension(url.as_str()) {
            return Some(SourceHint::DirectFile);
        }
        let host = url.host_str()?;
        self.direct_hosts
            .iter()
            .any(|domain| host_matches(host, domain))
            .then_some(SourceHint::Platform)
    }

    pub async fn scan(&self, input: &str) -> Result<CandidateSet, ScoutError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(invalid_url("Please enter a URL"));
        }
        let url = Url::parse(input).map_err(|err| invalid_url(err.to_string()))?;

        if let Some(hint) = self.direct_hint(&url) {
            let candidate = MediaCandidate::new(url.as_str(), hint)
                .ok_or_else(|| invalid_url(format!("not an absolute URL: {input}")))?;
            engine_info!("{} is directly downloadable", url);
            return Ok(CandidateSet::from_iter([candidate]));
        }

        self.extractor.extract(url.as_str()).await
    }
}

fn invalid_url(message: impl Into<String>) -> ScoutError {
    TransportError::new(TransportKind::InvalidUrl, message).into()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct CountingExtractor {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Extractor for CountingExtractor {
        async fn extract(&self, _page_url: &str) -> Result<CandidateSet, ScoutError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(CandidateSet::new())
        }
    }

    fn scanner(extractor: Arc<CountingExtractor>) -> Scanner {
        Scanner::new(extractor, vec!["youtube.com".to_string(), "youtu.be".to_string()])
    }

    #[tokio::test]
    async fn direct_files_skip_extraction() {
        let extractor = Arc::new(CountingExtractor::default());
        let found = scanner(extractor.clone())
            .scan("  https://cdn.test/clip.MP4?sig=1 ")
            .await
            .unwrap();

        assert_eq!(found.urls(), vec!["https://cdn.test/clip.MP4?sig=1".to_string()]);
        assert_eq!(
            found.iter().next().map(MediaCandidate::hint),
            Some(SourceHint::DirectFile)
        );
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn platform_hosts_are_direct() {
        let extractor = Arc::new(CountingExtractor::default());
        let found = scanner(extractor.clone())
            .scan("https://www.youtube.com/watch?v=abc")
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            found.iter().next().map(MediaCandidate::hint),
            Some(SourceHint::Platform)
        );
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn pages_go_to_the_extractor() {
        let extractor = Arc::new(CountingExtractor::default());
        let _ = scanner(extractor.clone()).scan("https://blog.test/post").await;
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_and_malformed_input_is_invalid() {
        let extractor = Arc::new(CountingExtractor::default());
        let scanner = scanner(extractor.clone());
        for input in ["", "   ", "not a url"] {
            match scanner.scan(input).await {
                Err(ScoutError::Transport(err)) => assert_eq!(err.kind, TransportKind::InvalidUrl),
                other => panic!("unexpected result for {input:?}: {other:?}"),
            }
        }
        assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    }
}
