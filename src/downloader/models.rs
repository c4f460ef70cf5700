// Common data models for the download pipeline

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// One encoding reported by the extractor for a source URL.
///
/// Field names mirror the extractor's JSON so parsing stays mechanical.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaFormat {
    /// Opaque key understood by the extractor (e.g., "137", "18").
    pub format_id: String,
    /// Container extension (mp4, webm, m4a).
    pub ext: String,
    /// Human-readable quality note (e.g., "1080p", "tiny").
    pub format_note: Option<String>,
    /// Video codec, or "none" for audio-only encodings.
    pub vcodec: Option<String>,
    /// Audio codec, or "none" for video-only encodings.
    pub acodec: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    /// Exact file size in bytes, when the extractor knows it.
    pub filesize: Option<u64>,
    /// Approximate size, when only an estimate is available.
    pub filesize_approx: Option<u64>,
}

impl MediaFormat {
    /// Whether this encoding carries a video track.
    pub fn has_video(&self) -> bool {
        codec_present(self.vcodec.as_deref())
    }

    /// Whether this encoding carries an audio track.
    pub fn has_audio(&self) -> bool {
        codec_present(self.acodec.as_deref())
    }

    /// Exact size when known, approximate otherwise.
    pub fn effective_size(&self) -> Option<u64> {
        self.filesize.or(self.filesize_approx)
    }
}

fn codec_present(codec: Option<&str>) -> bool {
    matches!(codec, Some(c) if c != "none" && !c.is_empty())
}

/// Metadata for one source URL: identity plus every reported encoding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub id: String,
    pub title: String,
    pub formats: Vec<MediaFormat>,
}

impl MediaInfo {
    /// Default selection policy: the video-carrying encoding with the
    /// greatest height, ties broken by size. Returns None when the source
    /// exposes no video track at all.
    pub fn best_video(&self) -> Option<&MediaFormat> {
        self.formats
            .iter()
            .filter(|f| f.has_video())
            .max_by(|a, b| {
                let by_height = a.height.unwrap_or(0).cmp(&b.height.unwrap_or(0));
                by_height.then_with(|| {
                    a.effective_size()
                        .unwrap_or(0)
                        .cmp(&b.effective_size().unwrap_or(0))
                })
            })
    }

    /// Look up an encoding by the extractor's format key.
    pub fn format_by_id(&self, id: &str) -> Option<&MediaFormat> {
        self.formats.iter().find(|f| f.format_id == id)
    }
}

/// A download request as accepted by the orchestrator.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub url: String,
    /// Extractor format key; when absent the best-video policy applies.
    pub quality: Option<String>,
}

/// A file materialized in the staging area, ready to be served.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub path: PathBuf,
    /// True when the file came straight from the extractor with audio
    /// embedded; false when it is the combiner's output.
    pub has_embedded_audio: bool,
}


#[cfg(test)]
mod tests {
    use super::fixtures::{audio_format, combined_format, video_format};
    use super::*;

    fn info(formats: Vec<MediaFormat>) -> MediaInfo {
        MediaInfo {
            id: "video123".to_string(),
            title: "Test Video".to_string(),
            formats,
        }
    }

    #[test]
    fn track_predicates_follow_codec_fields() {
        let v = video_format("137", "1080p", 1080, 100);
        assert!(v.has_video());
        assert!(!v.has_audio());

        let a = audio_format("140", 10);
        assert!(!a.has_video());
        assert!(a.has_audio());

        let missing = MediaFormat {
            vcodec: None,
            acodec: Some(String::new()),
            ..video_format("0", "", 0, 0)
        };
        assert!(!missing.has_video());
        assert!(!missing.has_audio());
    }

    #[test]
    fn best_video_prefers_height_then_size() {
        let info = info(vec![
            video_format("18", "360p", 360, 5_000_000),
            video_format("137", "1080p", 1080, 100_000_000),
            video_format("137-small", "1080p", 1080, 80_000_000),
            audio_format("140", 3_000_000),
        ]);

        assert_eq!(info.best_video().unwrap().format_id, "137");
    }

    #[test]
    fn best_video_ignores_audio_only_sources() {
        let info = info(vec![audio_format("140", 3_000_000)]);
        assert!(info.best_video().is_none());
    }

    #[test]
    fn format_lookup_by_id() {
        let info = info(vec![
            combined_format("18", "360p", 360, 5_000_000),
            video_format("137", "1080p", 1080, 100_000_000),
        ]);
        assert!(info.format_by_id("18").unwrap().has_audio());
        assert!(info.format_by_id("999").is_none());
    }

    #[test]
    fn effective_size_falls_back_to_approximation() {
        let mut f = video_format("137", "1080p", 1080, 100);
        assert_eq!(f.effective_size(), Some(100));
        f.filesize = None;
        f.filesize_approx = Some(42);
        assert_eq!(f.effective_size(), Some(42));
    }
}
