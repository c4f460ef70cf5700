// Download pipeline: extractor and muxer integrations plus orchestration

pub mod errors;
pub mod ffmpeg;
pub mod models;
pub mod orchestrator;
mod tools;
pub mod ytdlp;

pub use errors::FetchError;
pub use ffmpeg::{FfmpegMuxer, StreamMuxer};
pub use models::{Artifact, DownloadRequest, MediaFormat, MediaInfo};
pub use orchestrator::DownloadOrchestrator;
pub use ytdlp::{MediaExtractor, YtDlpExtractor};

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory stand-ins for the external tools, shared by orchestrator
    //! and HTTP handler tests.

    use std::path::{Path, PathBuf};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::errors::FetchError;
    use super::ffmpeg::StreamMuxer;
    use super::models::MediaInfo;
    use super::ytdlp::MediaExtractor;

    pub(crate) struct StubExtractor {
        info: MediaInfo,
        fetches: Mutex<Vec<(String, PathBuf)>>,
        fail_fetch: bool,
    }

    impl StubExtractor {
        pub(crate) fn new(info: MediaInfo) -> Self {
            Self {
                info,
                fetches: Mutex::new(Vec::new()),
                fail_fetch: false,
            }
        }

        /// Variant whose fetches always fail, for error-path tests.
        pub(crate) fn failing(mut self) -> Self {
            self.fail_fetch = true;
            self
        }

        pub(crate) fn fetch_selectors(&self) -> Vec<String> {
            self.fetches
                .lock()
                .unwrap()
                .iter()
                .map(|(selector, _)| selector.clone())
                .collect()
        }
    }

    #[async_trait]
    impl MediaExtractor for StubExtractor {
        async fn probe(&self, _url: &str) -> Result<MediaInfo, FetchError> {
            Ok(self.info.clone())
        }

        async fn fetch(
            &self,
            _url: &str,
            selector: &str,
            output: &Path,
        ) -> Result<(), FetchError> {
            if self.fail_fetch {
                return Err(FetchError::Download("stub fetch failure".to_string()));
            }
            tokio::fs::write(output, b"stub media bytes")
                .await
                .map_err(|e| FetchError::Download(e.to_string()))?;
            self.fetches
                .lock()
                .unwrap()
                .push((selector.to_string(), output.to_path_buf()));
            Ok(())
        }
    }

    #[derive(Default)]
    pub(crate) struct StubMuxer {
        calls: AtomicUsize,
        skip_output: bool,
    }

    impl StubMuxer {
        /// Variant that reports success without producing the output file,
        /// for callers that must cope with an artifact going missing.
        pub(crate) fn vanishing() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                skip_output: true,
            }
        }

        pub(crate) fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StreamMuxer for StubMuxer {
        async fn combine(
            &self,
            _video: &Path,
            _audio: &Path,
            output: &Path,
        ) -> Result<(), FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.skip_output {
                return Ok(());
            }
            tokio::fs::write(output, b"stub muxed bytes")
                .await
                .map_err(|e| FetchError::Mux(e.to_string()))
        }
    }
}
