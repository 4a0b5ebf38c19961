//! `POST /callback`: provider webhook.
//!
//! The provider first verifies the endpoint by sending a `challenge`, which
//! is echoed back. Later deliveries carry task status updates; they are
//! logged and acknowledged but not correlated with any polling session.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use tracing::{debug, info};
use utoipa::OpenApi;
use vidgen_types::ErrorBody;

use crate::error::ServerError;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(callback))]
pub struct CallbackApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/callback", post(callback))
}

#[utoipa::path(
    post,
    path = "/callback",
    tag = "webhook",
    request_body = Value,
    responses(
        (status = 200, description = "`{challenge}` echo or `{status: \"success\"}` acknowledgement", body = Value),
        (status = 400, description = "Body is not JSON", body = ErrorBody),
    )
)]
pub async fn callback(body: Result<Json<Value>, JsonRejection>) -> Result<Json<Value>, ServerError> {
    let Json(payload) = body?;

    if let Some(challenge) = payload.get("challenge").filter(|c| is_present(c)) {
        info!("callback verification challenge answered");
        return Ok(Json(json!({ "challenge": challenge })));
    }

    info!(
        task_id = ?payload.get("task_id"),
        status = ?payload.get("status"),
        "callback delivery received"
    );
    debug!(payload = %payload, "callback payload");
    Ok(Json(json!({ "status": "success" })))
}

/// Empty strings, `null`, `false` and `0` do not count as a challenge.
fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    }
}
