//! Scout engine: page fetching, media extraction and downloads.
mod config;
mod cookies;
mod decode;
mod download;
mod engine;
mod extract;
mod fetch;
mod filename;
mod patterns;
mod probe;
mod resolver;
mod scanner;
mod types;
mod ytdlp;

pub use config::{AuthenticatedPlatform, EngineConfig};
pub use cookies::{
    default_cookie_sources, harvest_cookies, ChromiumCookieStore, Cookie, CookieJarFile,
    CookieSet, CookieSource, CookieStoreError, FirefoxCookieStore,
};
pub use decode::{decode_page, DecodedPage};
pub use download::{
    direct_stream_headers, normalize_progress, ChannelProgressSink, Destination, DownloadEngine,
    ProgressSink, CHUNK_SIZE,
};
pub use engine::{EngineHandle, Pipeline};
pub use extract::{scan_platform_page, Extractor, MediaExtractor};
pub use fetch::{
    FetchResponse, FetchSession, FetchSettings, MediaStream, Method, RetryPolicy,
    BROWSER_USER_AGENT,
};
pub use filename::{fallback_filename, sanitize_filename};
pub use patterns::{has_media_extension, PatternLibrary, EMBED_PLATFORM_TOKENS, MEDIA_EXTENSIONS};
pub use probe::{probe_media, youtube_thumbnail, youtube_video_id, MediaInfo};
pub use resolver::{
    DownloadStats, LinearBackoff, MediaResolver, PayloadSink, ProgressPayload, ResolveOptions,
    ResolvedMedia, ResolverDownloadOptions, ResolverError, ResolverErrorKind,
};
pub use scanner::Scanner;
pub use types::{
    DownloadOutcome, EngineEvent, RequestId, ScoutError, Strategy, TransportError, TransportKind,
};
pub use ytdlp::YtDlpResolver;
