// ffmpeg integration: combining separate video and audio streams
//
// The video track is remuxed untouched; audio is transcoded to AAC so the
// result plays in stock players. One subprocess per combine call.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::errors::FetchError;
use super::tools;

/// Merges a video-only stream and an audio-only stream into one container.
#[async_trait]
pub trait StreamMuxer: Send + Sync {
    async fn combine(&self, video: &Path, audio: &Path, output: &Path)
        -> Result<(), FetchError>;
}

/// `StreamMuxer` backed by the ffmpeg binary.
pub struct FfmpegMuxer {
    binary: String,
    timeout: Duration,
}

impl FfmpegMuxer {
    pub fn new(binary: Option<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.unwrap_or_else(|| tools::discover("ffmpeg")),
            timeout,
        }
    }

    fn combine_args(video: &Path, audio: &Path, output: &Path) -> Vec<String> {
        vec![
            "-y".to_string(),
            "-i".to_string(),
            video.to_string_lossy().to_string(),
            "-i".to_string(),
            audio.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "copy".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            // Moves the moov atom up front so the file streams immediately
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]
    }
}

#[async_trait]
impl StreamMuxer for FfmpegMuxer {
    async fn combine(
        &self,
        video: &Path,
        audio: &Path,
        output: &Path,
    ) -> Result<(), FetchError> {
        debug!(
            video = %video.display(),
            audio = %audio.display(),
            output = %output.display(),
            "combining streams"
        );

        let args = Self::combine_args(video, audio, output);
        let mut cmd = Command::new(&self.binary);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let result = match timeout(self.timeout, cmd.output()).await {
            Ok(Ok(out)) => out,
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(FetchError::Mux(format!(
                    "{} is not installed or not on PATH",
                    self.binary
                )));
            }
            Ok(Err(e)) => {
                return Err(FetchError::Mux(format!(
                    "failed to start {}: {e}",
                    self.binary
                )));
            }
            Err(_) => {
                return Err(FetchError::Mux(format!(
                    "mux timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        if result.status.success() {
            return Ok(());
        }

        // ffmpeg writes its diagnostics to stderr; keep them in the log and
        // hand the client a short status summary instead.
        let stderr = String::from_utf8_lossy(&result.stderr);
        warn!(status = %result.status, stderr = %stderr, "ffmpeg exited non-zero");
        Err(FetchError::Mux(format!(
            "ffmpeg exited with {}: {}",
            result.status,
            FetchError::summarize_stderr(&stderr)
        )))
    }
}
