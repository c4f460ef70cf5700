// HTTP handlers: format probing, downloads, and artifact retrieval

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::error;

use crate::downloader::{DownloadRequest, FetchError};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct FormatsBody {
    pub url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadBody {
    pub url: Option<String>,
    pub quality: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DownloadFileQuery {
    pub file_path: Option<String>,
}

/// One selectable encoding, as exposed to clients.
#[derive(Debug, Serialize)]
pub struct FormatDescriptor {
    pub format_id: String,
    pub format_note: Option<String>,
    pub ext: String,
}

/// Boundary error wrapper: every pipeline failure becomes the uniform
/// `{"status": "error", "message": ...}` envelope with a 4xx status.
#[derive(Debug)]
pub struct ApiError(FetchError);

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            FetchError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::BAD_REQUEST,
        };
        let body = Json(json!({
            "status": "error",
            "message": self.0.to_string(),
        }));
        (status, body).into_response()
    }
}

/// `POST /api/get_formats` — list the video-carrying encodings for a URL.
pub async fn get_formats(
    State(state): State<AppState>,
    Json(body): Json<FormatsBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let url = body.url.as_deref().map(str::trim).unwrap_or("");
    if url.is_empty() {
        return Err(FetchError::Validation("no URL provided".to_string()).into());
    }

    let info = state.extractor.probe(url).await?;
    let formats: Vec<FormatDescriptor> = info
        .formats
        .iter()
        .filter(|f| f.has_video())
        .map(|f| FormatDescriptor {
            format_id: f.format_id.clone(),
            format_note: f.format_note.clone(),
            ext: f.ext.clone(),
        })
        .collect();

    Ok(Json(json!({
        "status": "success",
        "formats": formats,
    })))
}

/// `POST /api/download` — materialize a stream and hand back a link that
/// resolves to the finished artifact.
pub async fn download(
    State(state): State<AppState>,
    Json(body): Json<DownloadBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let request = DownloadRequest {
        url: body.url.unwrap_or_default(),
        quality: body.quality,
    };

    let artifact = state.orchestrator.download_and_prepare(&request).await?;
    let token = match state.artifacts.register(&artifact).await {
        Ok(token) => token,
        Err(err) => {
            // A file the registry will not track would sit in staging until
            // restart; drop its request directory along with the error.
            if let Some(dir) = artifact.path.parent() {
                let _ = tokio::fs::remove_dir_all(dir).await;
            }
            return Err(err.into());
        }
    };

    Ok(Json(json!({
        "status": "success",
        "message": "Download completed",
        "download_link": format!("/api/download_file?file_path={token}"),
    })))
}

/// `GET /api/download_file?file_path=<token>` — stream a produced artifact
/// as an attachment. Only registry tokens resolve; raw paths never do.
pub async fn download_file(
    State(state): State<AppState>,
    Query(query): Query<DownloadFileQuery>,
) -> Result<Response, ApiError> {
    let reference = query.file_path.as_deref().map(str::trim).unwrap_or("");
    if reference.is_empty() {
        return Err(FetchError::NotFound("missing file_path".to_string()).into());
    }

    let path = state.artifacts.resolve(reference).await?;
    let file = File::open(&path)
        .await
        .map_err(|_| FetchError::NotFound("artifact no longer exists".to_string()))?;
    let length = file.metadata().await.ok().map(|m| m.len());

    let mime = mime_guess::from_path(&path).first_or_octet_stream();
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("download");

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{filename}\""),
        );
    if let Some(length) = length {
        builder = builder.header(header::CONTENT_LENGTH, length);
    }

    builder
        .body(Body::from_stream(ReaderStream::new(file)))
        .map_err(|e| {
            error!(error = %e, "failed to build file response");
            ApiError(FetchError::Download("failed to build response".to_string()))
        })
}
