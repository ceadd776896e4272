use url::Url;

use crate::fetch::FetchSettings;
use crate::resolver::ResolverDownloadOptions;

/// A site that wants session cookies before it hands out media metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedPlatform {
    pub name: String,
    /// Matched against the page host: `host == token || host ends with .token`.
    pub host: String,
    pub cookie_domain: String,
    /// Canonical origin, sent as `Origin` and (with a trailing `/`) `Referer`.
    pub origin: String,
}

impl AuthenticatedPlatform {
    pub fn instagram() -> Self {
        Self {
            name: "Instagram".to_string(),
            host: "instagram.com".to_string(),
            cookie_domain: ".instagram.com".to_string(),
            origin: "https://www.instagram.com".to_string(),
        }
    }

    pub fn matches(&self, url: &Url) -> bool {
        url.host_str().is_some_and(|host| host_matches(host, &self.host))
    }

    pub fn referer(&self) -> String {
        format!("{}/", self.origin.trim_end_matches('/'))
    }
}

impl Default for AuthenticatedPlatform {
    fn default() -> Self {
        Self::instagram()
    }
}

pub(crate) fn host_matches(host: &str, domain: &str) -> bool {
    let host = host.to_ascii_lowercase();
    let domain = domain.trim_start_matches('.').to_ascii_lowercase();
    host == domain || host.ends_with(&format!(".{domain}"))
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub page_fetch: FetchSettings,
    pub media_fetch: FetchSettings,
    pub resolver_download: ResolverDownloadOptions,
    pub platform: AuthenticatedPlatform,
    /// Hosts whose page URL already is a single playable stream.
    pub direct_platform_hosts: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            page_fetch: FetchSettings::page(),
            media_fetch: FetchSettings::media(),
            resolver_download: ResolverDownloadOptions::default(),
            platform: AuthenticatedPlatform::default(),
            direct_platform_hosts: vec![
                "youtube.com".to_string(),
                "youtu.be".to_string(),
                "vimeo.com".to_string(),
            ],
        }
    }
}
