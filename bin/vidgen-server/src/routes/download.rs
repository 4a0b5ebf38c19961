//! `GET /download-video/{file_id}`: exchange a file id for a download URL.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;
use utoipa::OpenApi;
use vidgen_types::{ErrorBody, FileResponse};

use crate::error::ServerError;
use crate::routes::require_id;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(download_video), components(schemas(FileResponse)))]
pub struct DownloadApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/download-video/{file_id}", get(download_video))
}

#[utoipa::path(
    get,
    path = "/download-video/{file_id}",
    tag = "video",
    params(("file_id" = String, Path, description = "Provider file id")),
    responses(
        (status = 200, description = "File metadata and download URL", body = FileResponse),
        (status = 400, description = "Empty file id", body = ErrorBody),
        (status = 500, description = "Server misconfigured", body = ErrorBody),
    )
)]
pub async fn download_video(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Json<FileResponse>, ServerError> {
    let file_id = require_id(&file_id, "File ID is required")?;

    let vendor = state.vendor.retrieve_file(file_id).await.map_err(|e| {
        ServerError::from_vendor(e, |status, reason, body| {
            (
                format!("MiniMax File API error: {status} {reason}"),
                Value::String(body.to_text()),
            )
        })
    })?;

    let response = FileResponse::from_vendor(file_id, vendor);
    info!(
        file_id = %response.file_id,
        has_download_url = response.usable_download_url().is_some(),
        "file resolved"
    );
    Ok(Json(response))
}
