// Error taxonomy for the download pipeline

use thiserror::Error;

/// Failure buckets surfaced by the download pipeline.
///
/// Each variant maps to one phase of a request: input validation, metadata
/// extraction, stream fetching, muxing, and artifact resolution. The HTTP
/// layer decides status codes from the variant, never from the message text.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Missing or malformed request fields.
    #[error("invalid request: {0}")]
    Validation(String),

    /// The extractor could not reach or parse the source
    /// (unsupported site, network failure, private/removed content).
    #[error("extraction failed: {0}")]
    Extraction(String),

    /// A failure while fetching stream bytes to disk, including
    /// unsupported format ids and filesystem errors.
    #[error("download failed: {0}")]
    Download(String),

    /// ffmpeg missing or exited non-zero.
    #[error("mux failed: {0}")]
    Mux(String),

    /// An artifact reference that does not resolve to a permitted file.
    #[error("not found: {0}")]
    NotFound(String),
}

impl FetchError {
    /// First non-empty line of a subprocess stderr dump, for client-facing
    /// messages. Full output goes to the log, not the response.
    pub fn summarize_stderr(stderr: &str) -> &str {
        stderr
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .unwrap_or("no diagnostic output")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_picks_first_meaningful_line() {
        let stderr = "\n  \nERROR: Unsupported URL: https://example.com\nmore detail";
        assert_eq!(
            FetchError::summarize_stderr(stderr),
            "ERROR: Unsupported URL: https://example.com"
        );
    }

    #[test]
    fn summarize_handles_empty_output() {
        assert_eq!(FetchError::summarize_stderr(""), "no diagnostic output");
    }
}
