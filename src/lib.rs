//! vidfetch: a thin HTTP front-end over yt-dlp and ffmpeg.
//!
//! Probes the encodings available for a source URL, downloads a selected
//! video stream (fetching and muxing in a separate audio stream when the
//! selection has none), and serves the finished file back by opaque token.

pub mod api;
pub mod artifacts;
pub mod config;
pub mod downloader;
pub mod server;
