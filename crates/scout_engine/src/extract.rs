use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use regex::Regex;
use scout_core::{CandidateSet, SourceHint};
use url::Url;

use crate::config::AuthenticatedPlatform;
use crate::cookies::{harvest_cookies, CookieSet, CookieSource};
use crate::fetch::{FetchSession, Method};
use crate::patterns::PatternLibrary;
use crate::resolver::{MediaResolver, ResolveOptions};
use crate::{ScoutError, TransportError, TransportKind};

/// Turns a page URL into media candidates.
#[async_trait]
pub trait Extractor: Send + Sync {
    async fn extract(&self, page_url: &str) -> Result<CandidateSet, ScoutError>;
}

/// Generic pattern scan, plus the cookie-authenticated path for one platform.
pub struct MediaExtractor {
    session: FetchSession,
    patterns: PatternLibrary,
    resolver: Arc<dyn MediaResolver>,
    cookie_sources: Arc<Vec<Box<dyn CookieSource>>>,
    platform: AuthenticatedPlatform,
}

impl MediaExtractor {
    pub fn new(
        session: FetchSession,
        resolver: Arc<dyn MediaResolver>,
        cookie_sources: Vec<Box<dyn CookieSource>>,
        platform: AuthenticatedPlatform,
    ) -> Self {
        Self {
            session,
            patterns: PatternLibrary::new(),
            resolver,
            cookie_sources: Arc::new(cookie_sources),
            platform,
        }
    }

    async fn extract_generic(&self, page_url: &Url) -> Result<CandidateSet, ScoutError> {
        let response = self
            .session
            .get(page_url.as_str())
            .await
            .map_err(ScoutError::extraction_from_transport)?;

        let page = response.text();
        if page.had_errors {
            engine_debug!(
                "Page {} had malformed {} sequences",
                page_url,
                page.encoding_label
            );
        }

        let found = self.patterns.find_candidates(page_url, &page.text);
        engine_info!("Found {} candidates on {}", found.len(), page_url);
        if found.is_empty() {
            return Err(ScoutError::extraction("No videos found on this page."));
        }
        Ok(found)
    }

    async fn extract_authenticated(&self, page_url: &Url) -> Result<CandidateSet, ScoutError> {
        let platform = &self.platform.name;
        let cookies = self.load_cookies().await;

        // The jar lives exactly as long as the resolver call.
        let jar = if cookies.is_empty() {
            None
        } else {
            match cookies.write_cookie_jar() {
                Ok(jar) => Some(jar),
                Err(err) => {
                    engine_warn!("Could not write cookie jar: {}", err);
                    None
                }
            }
        };
        let options = ResolveOptions {
            cookie_file: jar.as_ref().map(|jar| jar.path().to_path_buf()),
            ..ResolveOptions::default()
        };
        let resolved = self.resolver.resolve(page_url.as_str(), &options).await;
        drop(jar);

        match resolved {
            Ok(media) => {
                let mut found = CandidateSet::new();
                for url in media.into_urls() {
                    found.insert_url(&url, SourceHint::Platform);
                }
                if found.is_empty() {
                    return Err(ScoutError::extraction(format!(
                        "No video URL found in the {platform} post"
                    )));
                }
                Ok(found)
            }
            Err(err) if err.is_login_required() => {
                engine_info!(
                    "{} reported login required for {}, trying the raw page",
                    self.resolver.name(),
                    page_url
                );
                match self.extract_raw_html(page_url, &cookies).await {
                    Ok(found) => Ok(found),
                    Err(fallback) if cookies.is_empty() => {
                        engine_warn!("Raw page fallback failed without cookies: {}", fallback);
                        Err(ScoutError::AuthRequired {
                            platform: platform.clone(),
                        })
                    }
                    Err(fallback) => Err(fallback),
                }
            }
            Err(err) => Err(ScoutError::extraction(format!(
                "Failed to extract {platform} video: {err}"
            ))),
        }
    }

    async fn load_cookies(&self) -> CookieSet {
        let sources = Arc::clone(&self.cookie_sources);
        let domain = self.platform.cookie_domain.clone();
        match tokio::task::spawn_blocking(move || harvest_cookies(&sources, &domain)).await {
            Ok(cookies) => cookies,
            Err(err) => {
                engine_warn!("Cookie harvesting task failed: {}", err);
                CookieSet::default()
            }
        }
    }

    /// Fetches the post page directly, as a browser with the given cookies
    /// would, and scans the body for the platform's own media fields.
    async fn extract_raw_html(
        &self,
        page_url: &Url,
        cookies: &CookieSet,
    ) -> Result<CandidateSet, ScoutError> {
        let platform = &self.platform.name;
        let referer = self.platform.referer();
        let cookie_header = cookies.header_value();
        let mut headers: Vec<(&str, &str)> = vec![
            ("Origin", self.platform.origin.as_str()),
            ("Referer", referer.as_str()),
        ];
        if let Some(value) = cookie_header.as_deref() {
            headers.push(("Cookie", value));
        }

        let response = self
            .session
            .fetch(Method::GET, page_url.as_str(), &headers)
            .await
            .map_err(|err| alternative_failure(platform, err))?;

        let found = scan_platform_page(&response.text().text);
        if found.is_empty() {
            return Err(ScoutError::extraction(format!(
                "No video URLs found in the {platform} post"
            )));
        }
        Ok(found)
    }
}

#[async_trait]
impl Extractor for MediaExtractor {
    async fn extract(&self, page_url: &str) -> Result<CandidateSet, ScoutError> {
        let parsed = Url::parse(page_url.trim()).map_err(|err| {
            ScoutError::from(TransportError::new(TransportKind::InvalidUrl, err.to_string()))
        })?;
        if self.platform.matches(&parsed) {
            self.extract_authenticated(&parsed).await
        } else {
            self.extract_generic(&parsed).await
        }
    }
}

fn alternative_failure(platform: &str, err: TransportError) -> ScoutError {
    ScoutError::Extraction {
        message: format!(
            "Failed to extract {platform} video using alternative method: {}",
            err.user_message()
        ),
        cause: Some(err),
    }
}

static PLATFORM_FIELDS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r#""video_url":"([^"]+)""#,
        r#""video_versions":\[\{[^}]*?"url":"([^"]+)""#,
        r#"property="og:video" content="([^"]+)""#,
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("platform field pattern"))
    .collect()
});

/// Applies the platform field patterns in order and merges their matches.
pub fn scan_platform_page(raw: &str) -> CandidateSet {
    let mut found = CandidateSet::new();
    for pattern in PLATFORM_FIELDS.iter() {
        for caps in pattern.captures_iter(raw) {
            if let Some(m) = caps.get(1) {
                found.insert_url(&unescape_url(m.as_str()), SourceHint::Platform);
            }
        }
    }
    found
}

fn unescape_url(raw: &str) -> String {
    raw.replace("\\u0026", "&")
        .replace("\\/", "/")
        .replace("&amp;", "&")
}
