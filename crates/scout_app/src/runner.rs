use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use engine_logging::{engine_info, engine_warn};
use scout_core::{DownloadEvent, SourceHint};
use scout_engine::{
    default_cookie_sources, Destination, EngineEvent, EngineHandle, Pipeline, YtDlpResolver,
};

use crate::config::AppConfig;

const SCAN_REQUEST: u64 = 1;
const DOWNLOAD_TASK: u64 = 1;
const PROBE_REQUEST: u64 = 2;

/// Drives one command through the engine and renders its events.
pub(crate) struct Runner {
    engine: EngineHandle,
    output_dir: PathBuf,
}

impl Runner {
    pub fn new(config: &AppConfig) -> anyhow::Result<Self> {
        let resolver = Arc::new(YtDlpResolver::with_program(config.resolver_program.clone()));
        let pipeline =
            Pipeline::from_config(config.engine_config(), resolver, default_cookie_sources())
                .context("Failed to set up the HTTP client")?;
        Ok(Self {
            engine: EngineHandle::with_pipeline(pipeline),
            output_dir: config.output_dir.clone(),
        })
    }

    pub fn scan(&self, url: &str) -> anyhow::Result<()> {
        engine_info!("Scanning {}", url);
        self.engine.scan(SCAN_REQUEST, url);
        loop {
            match self.engine.recv() {
                Some(EngineEvent::ScanCompleted { result, .. }) => {
                    let found = match result {
                        Ok(found) => found,
                        Err(err) => bail!("{err}"),
                    };
                    println!("Found {} media candidate(s):", found.len());
                    for candidate in found.iter() {
                        println!("  [{}] {}", hint_label(candidate.hint()), candidate.url());
                    }
                    return Ok(());
                }
                Some(_) => continue,
                None => bail!("engine stopped unexpectedly"),
            }
        }
    }

    pub fn download(
        &self,
        url: &str,
        output: Option<PathBuf>,
        file: Option<PathBuf>,
    ) -> anyhow::Result<()> {
        let destination = match (file, output) {
            (Some(path), _) => Destination::File(path),
            (None, Some(dir)) => Destination::Directory(dir),
            (None, None) => Destination::Directory(self.output_dir.clone()),
        };
        engine_info!("Downloading {} to {:?}", url, destination);
        self.engine.download(DOWNLOAD_TASK, url, destination);

        let mut stderr = io::stderr();
        loop {
            match self.engine.recv() {
                Some(EngineEvent::Download(DownloadEvent::Progress(event))) => {
                    let _ = write!(stderr, "\r{:>14}", event.progress.to_string());
                    let _ = stderr.flush();
                }
                Some(EngineEvent::Download(DownloadEvent::Finished { result, .. })) => {
                    let _ = writeln!(stderr);
                    return match result {
                        Ok(message) => {
                            println!("{message}");
                            Ok(())
                        }
                        Err(message) => bail!("{message}"),
                    };
                }
                Some(_) => continue,
                None => bail!("engine stopped unexpectedly"),
            }
        }
    }

    pub fn probe(&self, url: &str) -> anyhow::Result<()> {
        self.engine.probe(PROBE_REQUEST, url);
        loop {
            match self.engine.recv() {
                Some(EngineEvent::ProbeCompleted { result, .. }) => {
                    let info = match result {
                        Ok(info) => info,
                        Err(message) => {
                            engine_warn!("Probe failed for {}: {}", url, message);
                            bail!("Could not read media information: {message}");
                        }
                    };
                    println!("Title:     {}", info.title.as_deref().unwrap_or("(unknown)"));
                    println!("Thumbnail: {}", info.thumbnail.as_deref().unwrap_or("(none)"));
                    return Ok(());
                }
                Some(_) => continue,
                None => bail!("engine stopped unexpectedly"),
            }
        }
    }
}

fn hint_label(hint: SourceHint) -> &'static str {
    match hint {
        SourceHint::DirectFile => "file",
        SourceHint::Embed => "embed",
        SourceHint::Platform => "platform",
        SourceHint::PatternMatch => "pattern",
    }
}
