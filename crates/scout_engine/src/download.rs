use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use engine_logging::{engine_info, engine_warn};
use scout_core::{DownloadEvent, DownloadTask, Progress, TaskId};
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;

use crate::fetch::FetchSession;
use crate::filename::{fallback_filename, literal_template};
use crate::resolver::{MediaResolver, PayloadSink, ProgressPayload, ResolverDownloadOptions};
use crate::{DownloadOutcome, EngineEvent, ScoutError, Strategy};

/// Write granularity of the direct stream, and thus of its progress readings.
pub const CHUNK_SIZE: usize = 8 * 1024;

const GET_FILE_MARKER: &str = "/get_file/";

/// Where a download should land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    /// The resolver names the file after the media title.
    Directory(PathBuf),
    File(PathBuf),
}

impl Destination {
    pub fn path(&self) -> &Path {
        match self {
            Destination::Directory(dir) => dir,
            Destination::File(path) => path,
        }
    }

    fn resolver_template(&self) -> String {
        match self {
            Destination::Directory(dir) => {
                format!("{}/%(title)s.%(ext)s", literal_template(dir).trim_end_matches('/'))
            }
            Destination::File(path) => literal_template(path),
        }
    }

    fn stream_target(&self, url: &str) -> PathBuf {
        match self {
            Destination::Directory(dir) => dir.join(fallback_filename(url)),
            Destination::File(path) => path.clone(),
        }
    }
}

/// Receives task events as they happen.
pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: DownloadEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: DownloadEvent) {
        let _ = self.tx.send(EngineEvent::Download(event));
    }
}

/// Maps whatever the resolver knows about progress onto a percent.
///
/// Exact totals win over estimates, estimates over the resolver's own
/// percent text. A byte count alone is indeterminate.
pub fn normalize_progress(payload: &ProgressPayload) -> Option<Progress> {
    let stats = match payload {
        ProgressPayload::Finished => return Some(Progress::percent(100.0)),
        ProgressPayload::Downloading(stats) => stats,
    };

    let ratio = |total: Option<u64>| {
        let downloaded = stats.downloaded_bytes?;
        let total = total.filter(|t| *t > 0)?;
        Some(Progress::percent(downloaded as f64 / total as f64 * 100.0))
    };

    ratio(stats.total_bytes)
        .or_else(|| ratio(stats.total_bytes_estimate))
        .or_else(|| {
            let text = stats.percent_text.as_deref()?;
            let value: f64 = text.trim().trim_end_matches('%').trim().parse().ok()?;
            Some(Progress::percent(value))
        })
        .or_else(|| stats.downloaded_bytes.map(|_| Progress::Indeterminate))
}

/// Feeds readings through the task so the sink only sees accepted ones.
struct TaskTracker<'a> {
    task: Mutex<DownloadTask>,
    sink: &'a dyn ProgressSink,
}

impl<'a> TaskTracker<'a> {
    fn new(task: DownloadTask, sink: &'a dyn ProgressSink) -> Self {
        Self {
            task: Mutex::new(task),
            sink,
        }
    }

    fn task(&self) -> MutexGuard<'_, DownloadTask> {
        self.task.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, progress: Progress) {
        let event = self.task().record(progress);
        if let Some(event) = event {
            self.sink.emit(DownloadEvent::Progress(event));
        }
    }

    fn set_destination(&self, path: &Path) {
        self.task().set_destination(path.to_path_buf());
    }

    fn succeed(&self, message: String) {
        let closing = self.task().succeed();
        if let Some(event) = closing {
            self.sink.emit(DownloadEvent::Progress(event));
        }
        let task_id = self.task().id();
        self.sink.emit(DownloadEvent::Finished {
            task_id,
            result: Ok(message),
        });
    }

    fn fail(&self, message: String) {
        let task_id = {
            let mut task = self.task();
            task.fail();
            task.id()
        };
        self.sink.emit(DownloadEvent::Finished {
            task_id,
            result: Err(message),
        });
    }
}

impl PayloadSink for TaskTracker<'_> {
    fn report(&self, payload: ProgressPayload) {
        if let Some(progress) = normalize_progress(&payload) {
            self.record(progress);
        }
    }
}

/// Downloads through the resolver, falling back to one plain stream.
pub struct DownloadEngine {
    session: FetchSession,
    resolver: Arc<dyn MediaResolver>,
    options: ResolverDownloadOptions,
}

impl DownloadEngine {
    pub fn new(
        session: FetchSession,
        resolver: Arc<dyn MediaResolver>,
        options: ResolverDownloadOptions,
    ) -> Self {
        Self {
            session,
            resolver,
            options,
        }
    }

    pub async fn download(
        &self,
        task_id: TaskId,
        url: &str,
        destination: Destination,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, ScoutError> {
        let mut task = DownloadTask::new(task_id, url, destination.path().to_path_buf());
        task.start();
        let tracker = TaskTracker::new(task, sink);

        let result = match self.download_with_resolver(url, &destination, &tracker).await {
            Ok(path) => Ok(DownloadOutcome {
                task_id,
                strategy: Strategy::Resolver,
                path,
                bytes_written: None,
            }),
            Err(primary) => {
                engine_warn!(
                    "{} failed for {}: {}. Trying a direct stream",
                    self.resolver.name(),
                    url,
                    primary
                );
                match self.stream_direct(url, &destination, &tracker).await {
                    Ok((path, bytes)) => Ok(DownloadOutcome {
                        task_id,
                        strategy: Strategy::DirectStream,
                        path: Some(path),
                        bytes_written: Some(bytes),
                    }),
                    Err(fallback) => Err(ScoutError::Download { primary, fallback }),
                }
            }
        };

        match &result {
            Ok(outcome) => {
                if let Some(path) = &outcome.path {
                    tracker.set_destination(path);
                }
                engine_info!("Download {} completed via {:?}", task_id, outcome.strategy);
                tracker.succeed(completion_message(outcome));
            }
            Err(err) => {
                engine_warn!("Download {} failed: {:?}", task_id, err);
                tracker.fail(err.to_string());
            }
        }
        result
    }

    async fn download_with_resolver(
        &self,
        url: &str,
        destination: &Destination,
        tracker: &TaskTracker<'_>,
    ) -> Result<Option<PathBuf>, String> {
        let options = ResolverDownloadOptions {
            output_template: destination.resolver_template(),
            ..self.options.clone()
        };
        self.resolver
            .download(url, &options, tracker)
            .await
            .map_err(|err| err.to_string())
    }

    /// Streams the body to a temp file next to the target, then moves it
    /// into place. Progress is only reported when the length is known.
    async fn stream_direct(
        &self,
        url: &str,
        destination: &Destination,
        tracker: &TaskTracker<'_>,
    ) -> Result<(PathBuf, u64), String> {
        let target = destination.stream_target(url);
        let dir = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|err| format!("Cannot create {}: {err}", dir.display()))?;

        let headers = direct_stream_headers(url);
        let header_refs: Vec<(&str, &str)> = headers
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
            .collect();
        let mut stream = self
            .session
            .fetch_streaming(url, &header_refs)
            .await
            .map_err(|err| format!("Direct download failed: {}", err.user_message()))?;

        let tmp = NamedTempFile::new_in(&dir).map_err(|err| err.to_string())?;
        let std_file = tmp.reopen().map_err(|err| err.to_string())?;
        let mut file = tokio::fs::File::from_std(std_file);

        let total = stream.total.filter(|t| *t > 0);
        let mut written: u64 = 0;
        while let Some(chunk) = stream.next_chunk().await {
            let chunk =
                chunk.map_err(|err| format!("Direct download failed: {}", err.user_message()))?;
            for piece in chunk.chunks(CHUNK_SIZE) {
                file.write_all(piece).await.map_err(|err| err.to_string())?;
                written += piece.len() as u64;
                if let Some(total) = total {
                    tracker.record(Progress::percent(written as f64 / total as f64 * 100.0));
                }
            }
        }
        file.flush().await.map_err(|err| err.to_string())?;
        file.sync_all().await.map_err(|err| err.to_string())?;
        drop(file);

        tmp.persist(&target).map_err(|err| err.error.to_string())?;
        engine_info!("Wrote {} bytes to {}", written, target.display());
        Ok((target, written))
    }
}

/// Hosts serving `/get_file/` links check that the request looks like a
/// same-origin video element load.
pub fn direct_stream_headers(url: &str) -> Vec<(String, String)> {
    let Some(idx) = url.find(GET_FILE_MARKER) else {
        return Vec::new();
    };
    vec![
        ("Referer".to_string(), url[..idx].to_string()),
        ("Sec-Fetch-Dest".to_string(), "video".to_string()),
        ("Sec-Fetch-Mode".to_string(), "no-cors".to_string()),
        ("Sec-Fetch-Site".to_string(), "same-origin".to_string()),
    ]
}

fn completion_message(outcome: &DownloadOutcome) -> String {
    match &outcome.path {
        Some(path) => format!("Download completed: {}", path.display()),
        None => "Download completed!".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::DownloadStats;

    fn downloading(stats: DownloadStats) -> ProgressPayload {
        ProgressPayload::Downloading(stats)
    }

    #[test]
    fn exact_total_wins() {
        let payload = downloading(DownloadStats {
            downloaded_bytes: Some(50),
            total_bytes: Some(200),
            total_bytes_estimate: Some(100),
            percent_text: Some("99%".to_string()),
        });
        assert_eq!(normalize_progress(&payload), Some(Progress::Percent(25.0)));
    }

    #[test]
    fn estimate_then_text_then_indeterminate() {
        let estimate = downloading(DownloadStats {
            downloaded_bytes: Some(50),
            total_bytes_estimate: Some(100),
            ..DownloadStats::default()
        });
        assert_eq!(normalize_progress(&estimate), Some(Progress::Percent(50.0)));

        let text = downloading(DownloadStats {
            percent_text: Some(" 42.5%".to_string()),
            ..DownloadStats::default()
        });
        assert_eq!(normalize_progress(&text), Some(Progress::Percent(42.5)));

        let bytes_only = downloading(DownloadStats {
            downloaded_bytes: Some(10),
            ..DownloadStats::default()
        });
        assert_eq!(normalize_progress(&bytes_only), Some(Progress::Indeterminate));

        assert_eq!(normalize_progress(&downloading(DownloadStats::default())), None);
    }

    #[test]
    fn zero_total_is_not_a_ratio() {
        let payload = downloading(DownloadStats {
            downloaded_bytes: Some(10),
            total_bytes: Some(0),
            ..DownloadStats::default()
        });
        assert_eq!(normalize_progress(&payload), Some(Progress::Indeterminate));
    }

    #[test]
    fn finished_is_always_complete() {
        assert_eq!(
            normalize_progress(&ProgressPayload::Finished),
            Some(Progress::Percent(100.0))
        );
    }

    #[test]
    fn get_file_urls_get_referer() {
        let headers = direct_stream_headers("https://site.test/get_file/1/abc/v.mp4");
        assert_eq!(
            headers[0],
            ("Referer".to_string(), "https://site.test".to_string())
        );
        assert_eq!(headers.len(), 4);
        assert!(direct_stream_headers("https://cdn.test/v.mp4").is_empty());
    }

    #[test]
    fn destination_templates() {
        let dir = Destination::Directory(PathBuf::from("/media/out"));
        assert_eq!(dir.resolver_template(), "/media/out/%(title)s.%(ext)s");
        assert_eq!(
            dir.stream_target("https://x.test/a/clip.mp4?sig=2"),
            PathBuf::from("/media/out/clip.mp4")
        );

        let file = Destination::File(PathBuf::from("/media/50%.mp4"));
        assert_eq!(file.resolver_template(), "/media/50%%.mp4");
        assert_eq!(file.stream_target("https://x.test/ignored"), PathBuf::from("/media/50%.mp4"));
    }
}
