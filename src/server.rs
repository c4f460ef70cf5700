// Router, shared state, and server bootstrap

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::api::{download, download_file, get_formats};
use crate::artifacts::ArtifactStore;
use crate::config::Config;
use crate::downloader::{
    DownloadOrchestrator, FfmpegMuxer, MediaExtractor, StreamMuxer, YtDlpExtractor,
};

/// Shared per-request state. Extractor and muxer sit behind trait objects
/// so tests can swap the external tools for in-memory stand-ins.
#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn MediaExtractor>,
    pub orchestrator: Arc<DownloadOrchestrator>,
    pub artifacts: Arc<ArtifactStore>,
}

pub fn build_state(config: &Config) -> AppState {
    let extractor: Arc<dyn MediaExtractor> = Arc::new(YtDlpExtractor::new(
        config.ytdlp_path.clone(),
        config.probe_timeout,
        config.fetch_timeout,
    ));
    let muxer: Arc<dyn StreamMuxer> = Arc::new(FfmpegMuxer::new(
        config.ffmpeg_path.clone(),
        config.mux_timeout,
    ));
    let orchestrator = Arc::new(DownloadOrchestrator::new(
        extractor.clone(),
        muxer,
        config.staging_dir.clone(),
    ));
    let artifacts = Arc::new(ArtifactStore::new(
        config.staging_dir.clone(),
        config.artifact_ttl,
        config.artifact_size_budget,
    ));

    AppState {
        extractor,
        orchestrator,
        artifacts,
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/get_formats", post(get_formats))
        .route("/api/download", post(download))
        .route("/api/download_file", get(download_file))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    tokio::fs::create_dir_all(&config.staging_dir).await?;

    let state = build_state(&config);
    tokio::spawn(
        state
            .artifacts
            .clone()
            .sweep_loop(config.sweep_interval),
    );

    let app = router(state);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!(
        addr = %config.bind_addr,
        staging = %config.staging_dir.display(),
        "vidfetch listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("shutdown signal received");
    }
}
