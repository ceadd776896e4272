//! Heuristic rules for spotting media URLs in arbitrary page content.
//!
//! The rules over-match and under-match by nature: a generic `/embed/` path
//! may not be playable, and a site that assembles URLs in script will not be
//! found at all. Callers get a set of candidates, nothing stronger.

use std::sync::LazyLock;

use regex::Regex;
use scout_core::{CandidateSet, SourceHint};
use scraper::{Html, Selector};
use url::Url;

/// File extensions treated as direct media.
pub const MEDIA_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg", "m3u8"];

/// `iframe` sources containing one of these are kept as embeds.
pub const EMBED_PLATFORM_TOKENS: &[&str] = &["youtube", "vimeo", "dailymotion"];

const TRIM_CHARS: &[char] = &['\'', '"', '\\', ';', ','];

struct TextRule {
    regex: Regex,
    hint: SourceHint,
}

impl TextRule {
    fn new(pattern: &str, hint: SourceHint) -> Self {
        Self {
            regex: Regex::new(pattern).expect("media pattern"),
            hint,
        }
    }
}

static TEXT_RULES: LazyLock<Vec<TextRule>> = LazyLock::new(|| {
    use SourceHint::*;
    vec![
        // plain media files, query string included
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?\.(?:mp4|webm|ogg|m3u8)(?:[^\s<>"']*)?"#,
            DirectFile,
        ),
        TextRule::new(r#"(?i)https?://(?:www\.)?youtube\.com/watch\?v=[^\s<>"']+"#, Platform),
        TextRule::new(r#"(?i)https?://(?:www\.)?youtu\.be/[^\s<>"']+"#, Platform),
        TextRule::new(r#"(?i)https?://(?:www\.)?vimeo\.com/[^\s<>"']+"#, Platform),
        TextRule::new(
            r#"(?i)https?://(?:www\.)?dailymotion\.com/video/[^\s<>"']+"#,
            Platform,
        ),
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?/(?:videos?|media|embed)/[a-zA-Z0-9_-]+"#,
            PatternMatch,
        ),
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?\.cdn\.net/[^\s<>"']+?\.(?:mp4|webm|ogg|m3u8)"#,
            DirectFile,
        ),
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?/storage\d+/[^\s<>"']+?\.(?:mp4|webm|ogg|m3u8)"#,
            DirectFile,
        ),
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?/download/[^\s<>"']+?\.(?:mp4|webm|ogg)"#,
            DirectFile,
        ),
        TextRule::new(
            r#"(?i)https?://[^\s<>"']+?/files?/[^\s<>"']+?\.(?:mp4|webm|ogg)"#,
            DirectFile,
        ),
    ]
});

// Quoted absolute media URLs inside inline script or JSON.
static QUOTED_MEDIA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"["'](https?://[^\s<>"']+?\.(?:mp4|webm|ogg|m3u8)[^\s<>"']*)["']"#)
        .expect("quoted media pattern")
});

static MEDIA_ELEMENTS: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("video, source").expect("media selector"));

static IFRAMES: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("iframe").expect("iframe selector"));

/// The fixed rule set. Stateless; share freely.
#[derive(Debug, Default, Clone, Copy)]
pub struct PatternLibrary;

impl PatternLibrary {
    pub fn new() -> Self {
        Self
    }

    /// Runs every rule class over `raw` and merges the results.
    pub fn find_candidates(&self, page_url: &Url, raw: &str) -> CandidateSet {
        let mut found = {
            let document = Html::parse_document(raw);
            self.scan_document(&document, page_url)
        };
        found.extend(self.scan_text(page_url, raw));
        found
    }

    /// Structural and embed rules over a parsed element tree.
    pub fn scan_document(&self, document: &Html, page_url: &Url) -> CandidateSet {
        let mut found = CandidateSet::new();

        for element in document.select(&MEDIA_ELEMENTS) {
            for attr in ["src", "data-src"] {
                if let Some(url) = element.value().attr(attr).and_then(|v| resolve_url(v, page_url)) {
                    found.insert_url(url.as_str(), SourceHint::DirectFile);
                }
            }
        }

        for iframe in document.select(&IFRAMES) {
            let Some(src) = iframe.value().attr("src") else {
                continue;
            };
            let lower = src.to_ascii_lowercase();
            if EMBED_PLATFORM_TOKENS.iter().any(|token| lower.contains(token)) {
                if let Some(url) = resolve_url(src, page_url) {
                    found.insert_url(url.as_str(), SourceHint::Embed);
                }
            }
        }

        found
    }

    /// Textual and embedded-JSON rules over raw content.
    pub fn scan_text(&self, page_url: &Url, raw: &str) -> CandidateSet {
        let mut found = CandidateSet::new();

        for rule in TEXT_RULES.iter() {
            for m in rule.regex.find_iter(raw) {
                let cleaned = m.as_str().trim_matches(TRIM_CHARS);
                if let Some(url) = resolve_url(cleaned, page_url) {
                    found.insert_url(url.as_str(), rule.hint);
                }
            }
        }

        for caps in QUOTED_MEDIA.captures_iter(raw) {
            if let Some(url) = caps.get(1).and_then(|m| resolve_url(m.as_str(), page_url)) {
                found.insert_url(url.as_str(), SourceHint::DirectFile);
            }
        }

        found
    }
}

/// Resolves `reference` against `base`, skipping fragments, script and
/// inline-data references.
pub(crate) fn resolve_url(reference: &str, base: &Url) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("data:")
        || lower.starts_with("blob:")
    {
        return None;
    }
    let url = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(_) => base.join(trimmed).ok()?,
    };
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// True when the URL text names a media file extension.
pub fn has_media_extension(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    MEDIA_EXTENSIONS
        .iter()
        .any(|ext| lower.contains(&format!(".{ext}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page() -> Url {
        Url::parse("https://x.test/p").unwrap()
    }

    fn urls(set: &CandidateSet) -> Vec<String> {
        let mut urls = set.urls();
        urls.sort();
        urls
    }

    #[test]
    fn all_rules_compile() {
        assert_eq!(TEXT_RULES.len(), 10);
        LazyLock::force(&QUOTED_MEDIA);
        LazyLock::force(&MEDIA_ELEMENTS);
        LazyLock::force(&IFRAMES);
    }

    #[test]
    fn structural_sources_are_resolved() {
        let html = r#"<video src="a.mp4"></video><video><source data-src="b.webm"></video>"#;
        let found = PatternLibrary.find_candidates(&page(), html);
        assert!(found.contains("https://x.test/a.mp4"));
        assert!(found.contains("https://x.test/b.webm"));
    }

    #[test]
    fn only_platform_iframes_are_kept() {
        let html = r#"
            <iframe src="https://www.youtube.com/embed/abc123"></iframe>
            <iframe src="//player.vimeo.com/video/42"></iframe>
            <iframe src="https://ads.example/frame"></iframe>
        "#;
        let found = PatternLibrary.scan_document(&Html::parse_document(html), &page());
        assert_eq!(
            urls(&found),
            vec![
                "https://player.vimeo.com/video/42".to_string(),
                "https://www.youtube.com/embed/abc123".to_string(),
            ]
        );
    }

    #[test]
    fn text_scan_trims_trailing_artifacts() {
        let raw = r#"var a = 'https://cdn.example/v/clip.mp4?t=1'; play("https://y.test/x.m3u8"); src=https://z.test/c.webm;"#;
        let found = PatternLibrary.scan_text(&page(), raw);
        assert!(found.contains("https://cdn.example/v/clip.mp4?t=1"));
        assert!(found.contains("https://y.test/x.m3u8"));
        assert!(found.contains("https://z.test/c.webm"));
        assert!(found.iter().all(|c| !c.url().ends_with(';') && !c.url().ends_with('\'')));
    }

    #[test]
    fn platform_watch_urls_are_found() {
        let raw = "see https://www.youtube.com/watch?v=dQw4w9WgXcQ and https://youtu.be/xyz";
        let found = PatternLibrary.scan_text(&page(), raw);
        assert!(found.contains("https://www.youtube.com/watch?v=dQw4w9WgXcQ"));
        assert!(found.contains("https://youtu.be/xyz"));
        let hint = found
            .iter()
            .find(|c| c.url() == "https://youtu.be/xyz")
            .map(|c| c.hint());
        assert_eq!(hint, Some(SourceHint::Platform));
    }

    #[test]
    fn generic_video_paths_match() {
        let found = PatternLibrary.scan_text(&page(), "<a href=https://site.test/videos/my-clip_1>x</a>");
        assert!(found.contains("https://site.test/videos/my-clip_1"));
    }

    #[test]
    fn json_blobs_are_scanned() {
        let raw = r#"{"sources":[{"file":"https://media.test/stream/index.m3u8?token=abc"}]}"#;
        let found = PatternLibrary.scan_text(&page(), raw);
        assert!(found.contains("https://media.test/stream/index.m3u8?token=abc"));
    }

    #[test]
    fn script_and_fragment_sources_are_skipped() {
        let html = r##"<video src="#"></video><video src="javascript:void(0)"></video><video src="blob:https://x.test/1"></video>"##;
        let found = PatternLibrary.find_candidates(&page(), html);
        assert!(found.is_empty());
    }

    #[test]
    fn extension_detection_is_case_insensitive() {
        assert!(has_media_extension("https://x.test/A.MP4"));
        assert!(has_media_extension("https://x.test/live.m3u8?x=1"));
        assert!(!has_media_extension("https://x.test/page.html"));
    }

    #[test]
    fn scanning_twice_yields_the_same_set() {
        let raw = r#"<video src="a.mp4"></video> https://x.test/videos/abc "https://x.test/b.webm""#;
        let first = PatternLibrary.find_candidates(&page(), raw);
        let second = PatternLibrary.find_candidates(&page(), raw);
        assert_eq!(first, second);
    }
}
