//! `GET /test-status/{task_id}`: canned status replies for exercising a
//! client without provider credentials. Never contacts the provider.

use std::sync::Arc;

use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use strum::EnumString;
use tracing::info;
use utoipa::{IntoParams, OpenApi};
use vidgen_types::ErrorBody;

use crate::error::ServerError;
use crate::routes::require_id;
use crate::state::AppState;

const FIXTURE_VIDEO_URL: &str = "https://example.com/test-video.mp4";

#[derive(OpenApi)]
#[openapi(paths(test_status))]
pub struct TestStatusApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/test-status/{task_id}", get(test_status))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FixtureQuery {
    /// `processing` (default), `completed` or `failed`.
    pub status: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumString)]
#[strum(serialize_all = "snake_case")]
enum Fixture {
    #[default]
    Processing,
    Completed,
    Failed,
}

impl Fixture {
    fn render(self, task_id: &str) -> Value {
        match self {
            Fixture::Processing => json!({
                "task_id": task_id,
                "status": "processing",
                "base_resp": { "status_code": 1, "status_msg": "processing" },
            }),
            Fixture::Completed => json!({
                "task_id": task_id,
                "status": "completed",
                "video_url": FIXTURE_VIDEO_URL,
                "base_resp": { "status_code": 0, "status_msg": "success" },
                "result": { "video_url": FIXTURE_VIDEO_URL },
            }),
            Fixture::Failed => json!({
                "task_id": task_id,
                "status": "failed",
                "base_resp": { "status_code": 1, "status_msg": "failed" },
                "error": "Video generation failed",
            }),
        }
    }
}

#[utoipa::path(
    get,
    path = "/test-status/{task_id}",
    tag = "testing",
    params(
        ("task_id" = String, Path, description = "Any task id; echoed back"),
        FixtureQuery,
    ),
    responses(
        (status = 200, description = "Canned status reply", body = Value),
        (status = 400, description = "Empty task id", body = ErrorBody),
    )
)]
pub async fn test_status(
    Path(task_id): Path<String>,
    Query(query): Query<FixtureQuery>,
) -> Result<Json<Value>, ServerError> {
    let task_id = require_id(&task_id, "Task ID is required")?;
    let fixture = query
        .status
        .as_deref()
        .and_then(|s| s.parse::<Fixture>().ok())
        .unwrap_or_default();

    info!(task_id, fixture = ?fixture, "serving status fixture");
    Ok(Json(fixture.render(task_id)))
}
