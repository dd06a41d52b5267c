//! HTTP endpoint around the extraction pipeline.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /` | static liveness string |
//! | `POST /extract` | multipart field `file` (a `.pdf`) → `{"status":"success","data":[...]}` |
//!
//! Upload validation runs before anything touches pdfium or the model. A
//! body that is not `multipart/form-data` counts as a missing file, and one
//! over the size cap gets `413`; every error body is `{"error": ...}`. A
//! successful response does not say whether individual pages failed; those
//! show up in the server log only.

use crate::error::{ChallanError, UploadError};
use crate::extract::Extractor;
use crate::output::SuccessEnvelope;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Text returned by `GET /`.
pub const LIVENESS: &str = "Challan extractor API is live";

/// Default cap on the request body for `/extract`.
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

/// Everything that can turn a request into a non-2xx response.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("unreadable upload: {}", .0.body_text())]
    Multipart(#[from] MultipartError),

    #[error(transparent)]
    Extraction(#[from] ChallanError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Upload(_) => StatusCode::BAD_REQUEST,
            ApiError::Multipart(e) => e.status(),
            ApiError::Extraction(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Build the router. The extractor is shared by every request.
pub fn router(extractor: Arc<Extractor>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/extract", post(extract_upload))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(extractor)
}

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(addr: SocketAddr, extractor: Arc<Extractor>) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router(extractor, DEFAULT_MAX_UPLOAD_BYTES))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await
}

/// Accept only names ending in `.pdf` (case-sensitive).
pub fn validate_filename(filename: Option<&str>) -> Result<(), UploadError> {
    match filename {
        Some(name) if name.ends_with(".pdf") => Ok(()),
        other => Err(UploadError::NotPdf {
            filename: other.unwrap_or_default().to_string(),
        }),
    }
}

async fn home() -> &'static str {
    LIVENESS
}

async fn extract_upload(
    State(extractor): State<Arc<Extractor>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<SuccessEnvelope>, ApiError> {
    let mut multipart = multipart.map_err(|rejection| {
        warn!("Rejected non-multipart upload: {}", rejection.body_text());
        UploadError::MissingFile
    })?;
    let mut upload = None;
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().map(str::to_string);
        if let Err(e) = validate_filename(filename.as_deref()) {
            warn!("Rejected upload {:?}: {}", filename, e);
            return Err(e.into());
        }
        upload = Some((filename.unwrap_or_default(), field.bytes().await?));
        break;
    }

    let (filename, bytes) = upload.ok_or(UploadError::MissingFile)?;
    info!("Extracting '{}' ({} bytes)", filename, bytes.len());

    let output = extractor.extract_bytes(&bytes).await.map_err(|e| {
        error!("Extraction of '{}' failed: {}", filename, e);
        e
    })?;
    Ok(Json(SuccessEnvelope::new(output.records)))
}
