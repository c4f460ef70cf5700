// Download-and-prepare workflow
//
// probe -> select -> fetch video -> (fetch audio -> combine)? -> Artifact.
// Every file lands in a per-request staging subdirectory so concurrent
// requests never touch each other's intermediates.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tracing::{info, instrument};
use uuid::Uuid;

use super::errors::FetchError;
use super::ffmpeg::StreamMuxer;
use super::models::{Artifact, DownloadRequest, MediaFormat};
use super::ytdlp::MediaExtractor;

pub struct DownloadOrchestrator {
    extractor: Arc<dyn MediaExtractor>,
    muxer: Arc<dyn StreamMuxer>,
    staging_root: PathBuf,
}

impl DownloadOrchestrator {
    pub fn new(
        extractor: Arc<dyn MediaExtractor>,
        muxer: Arc<dyn StreamMuxer>,
        staging_root: PathBuf,
    ) -> Self {
        Self {
            extractor,
            muxer,
            staging_root,
        }
    }

    /// Materialize the requested stream as a playable file in the staging
    /// area. When the selected encoding has no audio track, best audio is
    /// fetched separately and combined in.
    #[instrument(skip(self), fields(url = %request.url))]
    pub async fn download_and_prepare(
        &self,
        request: &DownloadRequest,
    ) -> Result<Artifact, FetchError> {
        let url = request.url.trim();
        if url.is_empty() {
            return Err(FetchError::Validation("no URL provided".to_string()));
        }

        let info = self.extractor.probe(url).await?;

        let selected = match &request.quality {
            Some(key) => info.format_by_id(key).ok_or_else(|| {
                FetchError::Download(format!("requested format {key} is not available"))
            })?,
            None => info.best_video().ok_or_else(|| {
                FetchError::Download("source exposes no video streams".to_string())
            })?,
        };
        if !selected.has_video() {
            return Err(FetchError::Download(format!(
                "requested format {} has no video track",
                selected.format_id
            )));
        }

        let request_dir = self.staging_root.join(Uuid::new_v4().to_string());
        fs::create_dir_all(&request_dir)
            .await
            .map_err(|e| FetchError::Download(format!("failed to create staging dir: {e}")))?;

        let result = self.run_pipeline(url, selected, &request_dir).await;
        if result.is_err() {
            // Leave no partial files behind on any failure path.
            let _ = fs::remove_dir_all(&request_dir).await;
        }
        result
    }

    async fn run_pipeline(
        &self,
        url: &str,
        selected: &MediaFormat,
        request_dir: &Path,
    ) -> Result<Artifact, FetchError> {
        let ext = if selected.ext.is_empty() {
            "mp4"
        } else {
            selected.ext.as_str()
        };
        let video_path = request_dir.join(format!("video.{ext}"));
        self.extractor
            .fetch(url, &selected.format_id, &video_path)
            .await?;

        // The audio decision is made on the stream that was actually
        // selected, not on whether any encoding of the source has audio.
        if selected.has_audio() {
            info!(format = %selected.format_id, "selected stream carries audio, no mux needed");
            return Ok(Artifact {
                path: video_path,
                has_embedded_audio: true,
            });
        }

        let audio_path = request_dir.join("audio.m4a");
        self.extractor.fetch(url, "bestaudio", &audio_path).await?;

        let output_path = request_dir.join("output.mp4");
        self.muxer
            .combine(&video_path, &audio_path, &output_path)
            .await?;
        info!(format = %selected.format_id, output = %output_path.display(), "streams combined");

        // Intermediates are dead weight once the mux lands.
        let _ = fs::remove_file(&video_path).await;
        let _ = fs::remove_file(&audio_path).await;

        Ok(Artifact {
            path: output_path,
            has_embedded_audio: false,
        })
    }
}
