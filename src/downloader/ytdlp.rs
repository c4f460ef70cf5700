// yt-dlp integration: metadata probing and stream fetching
//
// All network transfer happens inside the yt-dlp subprocess. This module
// only builds argument lists, enforces timeouts, and parses JSON output.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::FetchError;
use super::models::{MediaFormat, MediaInfo};
use super::tools;

/// Narrow interface over the external extractor: list encodings for a URL,
/// and materialize the encoding matching a format selector to a given path.
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// Query stream metadata without downloading any media bytes.
    async fn probe(&self, url: &str) -> Result<MediaInfo, FetchError>;

    /// Download the stream matching `selector` (a format id or a policy
    /// expression like "bestaudio") to exactly `output`.
    async fn fetch(&self, url: &str, selector: &str, output: &Path) -> Result<(), FetchError>;
}

/// `MediaExtractor` backed by the yt-dlp binary.
pub struct YtDlpExtractor {
    binary: String,
    probe_timeout: Duration,
    fetch_timeout: Duration,
}

impl YtDlpExtractor {
    pub fn new(
        binary: Option<String>,
        probe_timeout: Duration,
        fetch_timeout: Duration,
    ) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| tools::discover("yt-dlp")),
            probe_timeout,
            fetch_timeout,
        }
    }

    fn probe_args(url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--socket-timeout".to_string(),
            "15".to_string(),
            "--retries".to_string(),
            "2".to_string(),
            url.to_string(),
        ]
    }

    fn fetch_args(url: &str, selector: &str, output: &Path) -> Vec<String> {
        vec![
            "-f".to_string(),
            selector.to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--newline".to_string(),
            "--no-update".to_string(),
            "--socket-timeout".to_string(),
            "30".to_string(),
            "--retries".to_string(),
            "2".to_string(),
            "-o".to_string(),
            output.to_string_lossy().to_string(),
            url.to_string(),
        ]
    }

    async fn run_fetch(&self, args: Vec<String>) -> Result<(), FetchError> {
        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| spawn_error(&self.binary, &e, FetchError::Download))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| FetchError::Download("failed to capture yt-dlp stdout".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| FetchError::Download("failed to capture yt-dlp stderr".to_string()))?;

        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        // Surface [download] progress as log events while the transfer runs.
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| FetchError::Download(format!("failed to read yt-dlp output: {e}")))?
        {
            if let Some((percent, detail)) = parse_progress(&line) {
                debug!(percent, detail = %detail, "yt-dlp progress");
            }
        }

        let status = child
            .wait()
            .await
            .map_err(|e| FetchError::Download(format!("failed to wait for yt-dlp: {e}")))?;
        let stderr_output = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        warn!(%status, stderr = %stderr_output, "yt-dlp fetch failed");
        Err(FetchError::Download(
            FetchError::summarize_stderr(&stderr_output).to_string(),
        ))
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    async fn probe(&self, url: &str) -> Result<MediaInfo, FetchError> {
        let args = Self::probe_args(url);
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args).stdin(Stdio::null()).kill_on_drop(true);

        let output = match timeout(self.probe_timeout, cmd.output()).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) => return Err(spawn_error(&self.binary, &e, FetchError::Extraction)),
            Err(_) => {
                return Err(FetchError::Extraction(format!(
                    "metadata probe timed out after {}s",
                    self.probe_timeout.as_secs()
                )));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr, "yt-dlp probe failed");
            return Err(FetchError::Extraction(
                FetchError::summarize_stderr(&stderr).to_string(),
            ));
        }

        parse_info(&output.stdout)
    }

    async fn fetch(&self, url: &str, selector: &str, output: &Path) -> Result<(), FetchError> {
        debug!(url, selector, output = %output.display(), "starting yt-dlp fetch");
        let args = Self::fetch_args(url, selector, output);
        match timeout(self.fetch_timeout, self.run_fetch(args)).await {
            Ok(result) => result,
            // kill_on_drop reaps the child when the timeout drops the future
            Err(_) => Err(FetchError::Download(format!(
                "stream fetch timed out after {}s",
                self.fetch_timeout.as_secs()
            ))),
        }
    }
}

fn spawn_error(
    binary: &str,
    err: &std::io::Error,
    ctor: fn(String) -> FetchError,
) -> FetchError {
    if err.kind() == std::io::ErrorKind::NotFound {
        ctor(format!("{binary} is not installed or not on PATH"))
    } else {
        ctor(format!("failed to start {binary}: {err}"))
    }
}

fn parse_info(stdout: &[u8]) -> Result<MediaInfo, FetchError> {
    let json: serde_json::Value = serde_json::from_slice(stdout)
        .map_err(|e| FetchError::Extraction(format!("invalid metadata JSON: {e}")))?;

    let formats = json["formats"]
        .as_array()
        .ok_or_else(|| FetchError::Extraction("no formats array in metadata".to_string()))?
        .iter()
        .map(parse_format)
        .collect();

    Ok(MediaInfo {
        id: json["id"].as_str().unwrap_or("unknown").to_string(),
        title: json["title"].as_str().unwrap_or("Unknown").to_string(),
        formats,
    })
}

fn parse_format(f: &serde_json::Value) -> MediaFormat {
    MediaFormat {
        format_id: f["format_id"].as_str().unwrap_or("").to_string(),
        ext: f["ext"].as_str().unwrap_or("").to_string(),
        format_note: f["format_note"].as_str().map(str::to_string),
        vcodec: f["vcodec"].as_str().map(str::to_string),
        acodec: f["acodec"].as_str().map(str::to_string),
        width: f["width"].as_u64().map(|w| w as u32),
        height: f["height"].as_u64().map(|h| h as u32),
        filesize: f["filesize"].as_u64(),
        filesize_approx: f["filesize_approx"].as_u64(),
    }
}

/// Parse a yt-dlp progress line like:
/// `[download]   6.2% of ~ 343.72MiB at  420.30KiB/s ETA 12:32`
fn parse_progress(line: &str) -> Option<(f32, String)> {
    lazy_static! {
        static ref PROGRESS_RE: Regex = Regex::new(
            r"\[download\]\s+(\d+\.?\d*)%\s+of\s+~?\s*(\S+)(?:\s+at\s+(\S+))?"
        )
        .unwrap();
    }

    let caps = PROGRESS_RE.captures(line)?;
    let percent: f32 = caps.get(1)?.as_str().parse().ok()?;
    let size = caps.get(2).map(|m| m.as_str()).unwrap_or("?");
    let detail = match caps.get(3) {
        Some(speed) => format!("{percent:.1}% of {size} at {}", speed.as_str()),
        None => format!("{percent:.1}% of {size}"),
    };
    Some((percent, detail))
}
