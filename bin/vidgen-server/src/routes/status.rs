//! `GET /status/{task_id}`: query a generation's lifecycle status.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::Value;
use tracing::info;
use utoipa::OpenApi;
use vidgen_types::{ErrorBody, StatusResponse};

use crate::error::ServerError;
use crate::routes::require_id;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_status), components(schemas(StatusResponse)))]
pub struct StatusApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/status/{task_id}", get(get_status))
}

/// Query the provider for the status of `task_id`.
#[utoipa::path(
    get,
    path = "/status/{task_id}",
    tag = "video",
    params(("task_id" = String, Path, description = "Provider task id")),
    responses(
        (status = 200, description = "Current task status", body = StatusResponse),
        (status = 400, description = "Empty task id", body = ErrorBody),
        (status = 500, description = "Server misconfigured", body = ErrorBody),
    )
)]
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<StatusResponse>, ServerError> {
    let task_id = require_id(&task_id, "Task ID is required")?;

    let vendor = state.vendor.query_generation(task_id).await.map_err(|e| {
        ServerError::from_vendor(e, |status, reason, body| {
            (
                format!("MiniMax API error: {status} {reason}"),
                Value::String(body.to_text()),
            )
        })
    })?;

    let response = StatusResponse::from_vendor(task_id, vendor);
    info!(
        task_id = %response.task_id,
        status = %response.status,
        has_file_id = response.file_id.is_some(),
        "status checked"
    );
    Ok(Json(response))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;
    use vidgen_vendor::{VendorError, VendorErrorBody};

    use crate::routes::testing::{FakeVendor, app, call, get};

    #[tokio::test]
    async fn status_is_passed_through_with_task_id() {
        let vendor = FakeVendor::new(|_, _| {
            Ok(json!({
                "status": "Success",
                "file_id": 205_258_526_306_433u64,
                "base_resp": { "status_code": 0, "status_msg": "success" },
                "video_width": 1920
            }))
        });
        let (status, body) = call(app(vendor.clone()), get("/status/T1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_id"], "T1");
        assert_eq!(body["status"], "Success");
        assert_eq!(body["file_id"], "205258526306433");
        assert_eq!(body["video_width"], 1920);
        assert_eq!(vendor.calls.lock().unwrap()[0], ("query".to_owned(), "T1".to_owned()));
    }

    #[tokio::test]
    async fn missing_status_becomes_unknown() {
        let vendor = FakeVendor::new(|_, _| Ok(json!({})));
        let (_, body) = call(app(vendor), get("/status/T1")).await;
        assert_eq!(body["status"], "unknown");
    }

    #[tokio::test]
    async fn blank_task_id_is_rejected() {
        let vendor = FakeVendor::new(|_, _| Ok(json!({})));
        let (status, body) = call(app(vendor.clone()), get("/status/%20")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Task ID is required" }));
        assert_eq!(vendor.call_count(), 0);
    }

    #[tokio::test]
    async fn vendor_rejection_reports_code_and_raw_text() {
        let vendor = FakeVendor::new(|_, _| {
            Err(VendorError::Rejected {
                status: 401,
                reason: "Unauthorized".into(),
                body: VendorErrorBody::Text("invalid api key".into()),
            })
        });
        let (status, body) = call(app(vendor), get("/status/T1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            body,
            json!({ "error": "MiniMax API error: 401 Unauthorized", "details": "invalid api key" })
        );
    }
}
