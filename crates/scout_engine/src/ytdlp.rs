//! `MediaResolver` backed by the `yt-dlp` program.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use engine_logging::{engine_debug, engine_info, engine_warn};
use serde::Deserialize;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;

use crate::probe::MediaInfo;
use crate::resolver::{
    DownloadStats, MediaResolver, PayloadSink, ProgressPayload, ResolveOptions, ResolvedMedia,
    ResolverDownloadOptions, ResolverError, ResolverErrorKind,
};

const PROGRESS_PREFIX: &str = "scout-progress:";
const PATH_PREFIX: &str = "scout-path:";

#[derive(Debug, Clone)]
pub struct YtDlpResolver {
    program: PathBuf,
}

impl YtDlpResolver {
    pub fn new() -> Self {
        Self::with_program("yt-dlp")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.stdin(Stdio::null()).kill_on_drop(true);
        cmd
    }

    fn unavailable(&self, err: std::io::Error) -> ResolverError {
        ResolverError::new(
            ResolverErrorKind::Unavailable,
            format!("{}: {}", self.program.display(), err),
        )
    }

    async fn dump_json(&self, args: Vec<String>) -> Result<InfoJson, ResolverError> {
        let output = self
            .command()
            .args(&args)
            .output()
            .await
            .map_err(|err| self.unavailable(err))?;

        if !output.status.success() {
            return Err(ResolverError::from_message(error_text(&output.stderr)));
        }

        serde_json::from_slice(&output.stdout).map_err(|err| {
            ResolverError::new(ResolverErrorKind::Failed, format!("invalid resolver output: {err}"))
        })
    }
}

impl Default for YtDlpResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Deserialize)]
struct InfoJson {
    url: Option<String>,
    title: Option<String>,
    thumbnail: Option<String>,
    entries: Option<Vec<Option<EntryJson>>>,
}

#[derive(Debug, Deserialize)]
struct EntryJson {
    url: Option<String>,
}

#[async_trait]
impl MediaResolver for YtDlpResolver {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    async fn resolve(
        &self,
        url: &str,
        options: &ResolveOptions,
    ) -> Result<ResolvedMedia, ResolverError> {
        let info = self.dump_json(resolve_args(url, options)).await?;

        if let Some(stream) = info.url.filter(|u| !u.is_empty()) {
            return Ok(ResolvedMedia::Single(stream));
        }
        let entries: Vec<String> = info
            .entries
            .unwrap_or_default()
            .into_iter()
            .flatten()
            .filter_map(|entry| entry.url)
            .filter(|u| !u.is_empty())
            .collect();
        if entries.is_empty() {
            return Err(ResolverError::new(
                ResolverErrorKind::Failed,
                "No video URL found in the post",
            ));
        }
        Ok(ResolvedMedia::Entries(entries))
    }

    async fn download(
        &self,
        url: &str,
        options: &ResolverDownloadOptions,
        progress: &dyn PayloadSink,
    ) -> Result<Option<PathBuf>, ResolverError> {
        engine_info!("Starting {} download for URL: {}", self.name(), url);
        let mut child = self
            .command()
            .args(download_args(url, options))
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| self.unavailable(err))?;

        let stderr_task = child.stderr.take().map(|mut stderr| {
            tokio::spawn(async move {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf).await;
                buf
            })
        });

        let mut final_path = None;
        if let Some(stdout) = child.stdout.take() {
            // Titles and paths may arrive in the console codepage, so lines
            // are read as bytes and decoded lossily.
            let mut reader = BufReader::new(stdout);
            let mut buf = Vec::new();
            loop {
                buf.clear();
                match reader.read_until(b'\n', &mut buf).await {
                    Ok(0) => break,
                    Ok(_) => {}
                    Err(err) => {
                        engine_warn!("Reading {} output failed: {}", self.name(), err);
                        break;
                    }
                }
                let line = String::from_utf8_lossy(&buf);
                let line = line.trim_end_matches(['\r', '\n']);
                if let Some(payload) = parse_progress_line(line) {
                    progress.report(payload);
                } else if let Some(path) = line.strip_prefix(PATH_PREFIX) {
                    final_path = Some(PathBuf::from(path.trim()));
                } else {
                    engine_debug!("yt-dlp: {}", line);
                }
            }
        }

        let status = child.wait().await.map_err(|err| self.unavailable(err))?;
        let stderr = match stderr_task {
            Some(task) => task.await.unwrap_or_default(),
            None => Vec::new(),
        };

        if status.success() {
            Ok(final_path)
        } else {
            Err(ResolverError::from_message(error_text(&stderr)))
        }
    }

    async fn probe(&self, url: &str) -> Result<MediaInfo, ResolverError> {
        let args = vec![
            "--dump-single-json".to_string(),
            "--flat-playlist".to_string(),
            "--no-warnings".to_string(),
            "--quiet".to_string(),
            "--".to_string(),
            url.to_string(),
        ];
        let info = self.dump_json(args).await?;
        Ok(MediaInfo {
            title: info.title,
            thumbnail: info.thumbnail,
        })
    }
}

fn resolve_args(url: &str, options: &ResolveOptions) -> Vec<String> {
    let mut args = vec![
        "--dump-single-json".to_string(),
        "--flat-playlist".to_string(),
        "--no-warnings".to_string(),
        "--quiet".to_string(),
        "-f".to_string(),
        options.format.clone(),
    ];
    if options.best_effort {
        args.push("--ignore-errors".to_string());
    }
    if let Some(cookie_file) = &options.cookie_file {
        args.push("--cookies".to_string());
        args.push(cookie_file.display().to_string());
    }
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

fn download_args(url: &str, options: &ResolverDownloadOptions) -> Vec<String> {
    let sleep = options.retry_sleep;
    let linear = format!(
        "linear={}:{}:{}",
        sleep.initial.as_secs(),
        sleep.ceiling.as_secs(),
        sleep.step.as_secs().max(1)
    );
    let mut args = vec![
        "-f".to_string(),
        options.format.clone(),
        "-o".to_string(),
        options.output_template.clone(),
        "--newline".to_string(),
        "--progress".to_string(),
        "--no-color".to_string(),
        "--socket-timeout".to_string(),
        options.socket_timeout.as_secs().to_string(),
        "--retries".to_string(),
        options.retries.to_string(),
        "--fragment-retries".to_string(),
        options.fragment_retries.to_string(),
        "--retry-sleep".to_string(),
        linear.clone(),
        "--retry-sleep".to_string(),
        format!("fragment:{linear}"),
        "--progress-template".to_string(),
        format!(
            "download:{PROGRESS_PREFIX}%(progress.status)s|%(progress.downloaded_bytes)s|\
             %(progress.total_bytes)s|%(progress.total_bytes_estimate)s|%(progress._percent_str)s"
        ),
        "--print".to_string(),
        format!("after_move:{PATH_PREFIX}%(filepath)s"),
    ];
    if options.skip_certificate_check {
        args.push("--no-check-certificates".to_string());
    }
    if let Some(country) = &options.geo_bypass_country {
        args.push("--geo-bypass-country".to_string());
        args.push(country.clone());
    }
    if options.ignore_errors {
        args.push("--ignore-errors".to_string());
    }
    args.push("--".to_string());
    args.push(url.to_string());
    args
}

/// Parses one line of the machine-readable progress template.
fn parse_progress_line(line: &str) -> Option<ProgressPayload> {
    let body = line.trim().strip_prefix(PROGRESS_PREFIX)?;
    let mut fields = body.split('|');
    let status = fields.next()?.trim();
    match status {
        "finished" => Some(ProgressPayload::Finished),
        "downloading" => {
            let downloaded_bytes = fields.next().and_then(parse_bytes);
            let total_bytes = fields.next().and_then(parse_bytes);
            let total_bytes_estimate = fields.next().and_then(parse_bytes);
            let percent_text = fields
                .next()
                .map(str::trim)
                .filter(|text| !text.is_empty() && *text != "NA")
                .map(str::to_string);
            Some(ProgressPayload::Downloading(DownloadStats {
                downloaded_bytes,
                total_bytes,
                total_bytes_estimate,
                percent_text,
            }))
        }
        _ => None,
    }
}

fn parse_bytes(field: &str) -> Option<u64> {
    let value: f64 = field.trim().parse().ok()?;
    (value.is_finite() && value >= 0.0).then_some(value as u64)
}

/// The most useful part of the resolver's stderr: its last `ERROR:` line,
/// or everything when there is none.
fn error_text(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    text.lines()
        .rev()
        .find(|line| line.starts_with("ERROR:"))
        .map(str::to_string)
        .unwrap_or_else(|| text.trim().to_string())
}
