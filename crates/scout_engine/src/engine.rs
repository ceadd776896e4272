use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use scout_core::{CandidateSet, TaskId};

use crate::config::EngineConfig;
use crate::cookies::{default_cookie_sources, CookieSource};
use crate::download::{ChannelProgressSink, Destination, DownloadEngine, ProgressSink};
use crate::extract::MediaExtractor;
use crate::fetch::FetchSession;
use crate::probe::{probe_media, MediaInfo};
use crate::resolver::MediaResolver;
use crate::scanner::Scanner;
use crate::ytdlp::YtDlpResolver;
use crate::{DownloadOutcome, EngineEvent, RequestId, ScoutError, TransportError};

/// Every stage wired together, usable directly from async code.
pub struct Pipeline {
    scanner: Scanner,
    downloader: DownloadEngine,
    resolver: Arc<dyn MediaResolver>,
}

impl Pipeline {
    pub fn from_config(
        config: EngineConfig,
        resolver: Arc<dyn MediaResolver>,
        cookie_sources: Vec<Box<dyn CookieSource>>,
    ) -> Result<Self, TransportError> {
        let page_session = FetchSession::new(config.page_fetch)?;
        let media_session = FetchSession::new(config.media_fetch)?;

        let extractor = MediaExtractor::new(
            page_session,
            Arc::clone(&resolver),
            cookie_sources,
            config.platform,
        );
        let scanner = Scanner::new(Arc::new(extractor), config.direct_platform_hosts);
        let downloader =
            DownloadEngine::new(media_session, Arc::clone(&resolver), config.resolver_download);

        Ok(Self {
            scanner,
            downloader,
            resolver,
        })
    }

    pub async fn scan(&self, url: &str) -> Result<CandidateSet, ScoutError> {
        self.scanner.scan(url).await
    }

    pub async fn download(
        &self,
        task_id: TaskId,
        url: &str,
        destination: Destination,
        sink: &dyn ProgressSink,
    ) -> Result<DownloadOutcome, ScoutError> {
        self.downloader.download(task_id, url, destination, sink).await
    }

    pub async fn probe(&self, url: &str) -> Result<MediaInfo, String> {
        probe_media(self.resolver.as_ref(), url).await
    }
}

enum EngineCommand {
    Scan {
        request_id: RequestId,
        url: String,
    },
    Download {
        task_id: TaskId,
        url: String,
        destination: Destination,
    },
    Probe {
        request_id: RequestId,
        url: String,
    },
}

/// Runs the pipeline on a background thread. Commands go in, `EngineEvent`s
/// come out; scans, downloads and probes run concurrently.
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    /// Uses `yt-dlp` from `PATH` and the default browser cookie stores.
    pub fn new(config: EngineConfig) -> Result<Self, TransportError> {
        let pipeline =
            Pipeline::from_config(config, Arc::new(YtDlpResolver::new()), default_cookie_sources())?;
        Ok(Self::with_pipeline(pipeline))
    }

    pub fn with_pipeline(pipeline: Pipeline) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let pipeline = Arc::new(pipeline);

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            while let Ok(command) = cmd_rx.recv() {
                let pipeline = pipeline.clone();
                let event_tx = event_tx.clone();
                runtime.spawn(async move {
                    handle_command(pipeline.as_ref(), command, event_tx).await;
                });
            }
            runtime.shutdown_timeout(Duration::from_secs(5));
        });

        Self { cmd_tx, event_rx }
    }

    pub fn scan(&self, request_id: RequestId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Scan {
            request_id,
            url: url.into(),
        });
    }

    pub fn download(&self, task_id: TaskId, url: impl Into<String>, destination: Destination) {
        let _ = self.cmd_tx.send(EngineCommand::Download {
            task_id,
            url: url.into(),
            destination,
        });
    }

    pub fn probe(&self, request_id: RequestId, url: impl Into<String>) {
        let _ = self.cmd_tx.send(EngineCommand::Probe {
            request_id,
            url: url.into(),
        });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

async fn handle_command(
    pipeline: &Pipeline,
    command: EngineCommand,
    event_tx: mpsc::Sender<EngineEvent>,
) {
    match command {
        EngineCommand::Scan { request_id, url } => {
            let result = pipeline.scan(&url).await;
            let _ = event_tx.send(EngineEvent::ScanCompleted { request_id, result });
        }
        EngineCommand::Download {
            task_id,
            url,
            destination,
        } => {
            // The terminal `Finished` event travels through the sink.
            let sink = ChannelProgressSink::new(event_tx);
            let _ = pipeline.download(task_id, &url, destination, &sink).await;
        }
        EngineCommand::Probe { request_id, url } => {
            let result = pipeline.probe(&url).await;
            let _ = event_tx.send(EngineEvent::ProbeCompleted { request_id, result });
        }
    }
}
