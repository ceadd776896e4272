use std::sync::LazyLock;

use engine_logging::engine_warn;
use regex::Regex;

use crate::resolver::MediaResolver;

/// Display metadata for a candidate. Optional enrichment only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaInfo {
    pub title: Option<String>,
    pub thumbnail: Option<String>,
}

static YOUTUBE_ID: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?:youtube\.com/watch\?v=|youtu\.be/)([^&\n?#]+)",
        r"youtube\.com/(?:embed|shorts)/([^&\n?#/]+)",
    ]
    .into_iter()
    .map(|pattern| Regex::new(pattern).expect("youtube id pattern"))
    .collect()
});

pub fn youtube_video_id(url: &str) -> Option<String> {
    YOUTUBE_ID
        .iter()
        .find_map(|re| re.captures(url))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

pub fn youtube_thumbnail(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{video_id}/hqdefault.jpg")
}

/// Asks the resolver for metadata, filling a missing thumbnail from the
/// YouTube id when there is one. Errors come back as display text.
pub async fn probe_media(resolver: &dyn MediaResolver, url: &str) -> Result<MediaInfo, String> {
    let mut info = match resolver.probe(url).await {
        Ok(info) => info,
        Err(err) => {
            engine_warn!("Metadata probe failed for {}: {}", url, err);
            if let Some(id) = youtube_video_id(url) {
                return Ok(MediaInfo {
                    title: None,
                    thumbnail: Some(youtube_thumbnail(&id)),
                });
            }
            return Err(err.to_string());
        }
    };
    if info.thumbnail.is_none() {
        info.thumbnail = youtube_video_id(url).map(|id| youtube_thumbnail(&id));
    }
    Ok(info)
}
