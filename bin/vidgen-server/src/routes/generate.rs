//! `POST /generate`: validate and forward a generation request.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::routing::post;
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;
use vidgen_types::{ErrorBody, GenerateRequest, RawGenerateRequest, SubmitResponse};

use crate::error::ServerError;
use crate::state::AppState;

const MSG_GENERATE_FAILED: &str = "Failed to generate video";

#[derive(OpenApi)]
#[openapi(paths(generate_video), components(schemas(GenerateRequest, SubmitResponse, ErrorBody)))]
pub struct GenerateApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/generate", post(generate_video))
}

/// Submit a text-to-video job.
///
/// Fields are checked in order (prompt, duration, resolution) and the first
/// failure is reported. On success the vendor reply is returned with the
/// request echoed and `status` set to `"submitted"`.
#[utoipa::path(
    post,
    path = "/generate",
    tag = "video",
    request_body = GenerateRequest,
    responses(
        (status = 200, description = "Job accepted by the provider", body = SubmitResponse),
        (status = 400, description = "Invalid input", body = ErrorBody),
        (status = 500, description = "Server misconfigured", body = ErrorBody),
        (status = 502, description = "Provider unreachable", body = ErrorBody),
    )
)]
pub async fn generate_video(
    State(state): State<Arc<AppState>>,
    body: Result<Json<RawGenerateRequest>, JsonRejection>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let Json(raw) = body?;
    let request = raw.validate()?;

    info!(
        prompt_chars = request.prompt.chars().count(),
        duration = request.duration.seconds(),
        resolution = %request.resolution,
        "submitting video generation"
    );

    let vendor = state
        .vendor
        .create_generation(&request)
        .await
        .map_err(|e| {
            ServerError::from_vendor(e, |_, _, body| {
                let message = body.message().unwrap_or(MSG_GENERATE_FAILED).to_owned();
                (message, body.to_value())
            })
        })?;

    let response = SubmitResponse::from_vendor(&request, vendor, chrono::Utc::now().to_rfc3339());
    info!(task_id = ?response.task_id, "video generation submitted");
    Ok(Json(response))
}

#[cfg(test)]
mod test {
    use axum::http::StatusCode;
    use serde_json::json;
    use vidgen_types::{Resolution, VideoDuration};
    use vidgen_vendor::{VendorError, VendorErrorBody};

    use crate::routes::testing::{FakeVendor, app, call, post_json};

    fn accepting() -> std::sync::Arc<FakeVendor> {
        FakeVendor::new(|_, _| {
            Ok(json!({
                "task_id": "T1",
                "base_resp": { "status_code": 0, "status_msg": "success" }
            }))
        })
    }

    #[tokio::test]
    async fn valid_request_is_forwarded_and_echoed() {
        let vendor = accepting();
        let (status, body) = call(
            app(vendor.clone()),
            post_json("/generate", r#"{"prompt":"A cat","duration":6,"resolution":"1080P"}"#),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task_id"], "T1");
        assert_eq!(body["status"], "submitted");
        assert_eq!(body["prompt"], "A cat");
        assert_eq!(body["duration"], 6);
        assert_eq!(body["resolution"], "1080P");
        assert_eq!(body["base_resp"]["status_code"], 0);
        assert!(chrono::DateTime::parse_from_rfc3339(body["submitted_at"].as_str().unwrap()).is_ok());

        let forwarded = vendor.last_request.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded.duration, VideoDuration::Six);
        assert_eq!(forwarded.resolution, Resolution::P1080);
    }

    #[tokio::test]
    async fn validation_reports_first_failing_field_without_calling_vendor() {
        let cases = [
            (r#"{"duration":6,"resolution":"1080P"}"#, "Prompt is required"),
            (r#"{"prompt":"   ","duration":6,"resolution":"1080P"}"#, "Prompt is required"),
            (r#"{"prompt":"x","duration":7,"resolution":"bad"}"#, "Duration must be 6 or 10 seconds"),
            (r#"{"prompt":"x","duration":"6","resolution":"768P"}"#, "Duration must be 6 or 10 seconds"),
            (r#"{"prompt":"x","duration":10,"resolution":"1080p"}"#, "Resolution must be 1080P or 768P"),
            (r#"{"prompt":"x","duration":10}"#, "Resolution must be 1080P or 768P"),
        ];
        for (input, message) in cases {
            let vendor = accepting();
            let (status, body) = call(app(vendor.clone()), post_json("/generate", input)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "{input}");
            assert_eq!(body, json!({ "error": message }), "{input}");
            assert_eq!(vendor.call_count(), 0);
        }
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() {
        let vendor = accepting();
        let (status, body) = call(app(vendor.clone()), post_json("/generate", "{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
        assert_eq!(vendor.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_api_key_is_reported_as_configuration_error() {
        let vendor = FakeVendor::new(|_, _| Err(VendorError::MissingApiKey));
        let (status, body) = call(
            app(vendor),
            post_json("/generate", r#"{"prompt":"A cat","duration":10,"resolution":"768P"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "error": "API Key missing" }));
    }

    #[tokio::test]
    async fn vendor_rejection_uses_vendor_message_and_status() {
        let vendor = FakeVendor::new(|_, _| {
            Err(VendorError::Rejected {
                status: 400,
                reason: "Bad Request".into(),
                body: VendorErrorBody::Json(json!({ "message": "prompt too long" })),
            })
        });
        let (status, body) = call(
            app(vendor),
            post_json("/generate", r#"{"prompt":"A cat","duration":6,"resolution":"1080P"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "prompt too long");
        assert_eq!(body["details"], json!({ "message": "prompt too long" }));
    }

    #[tokio::test]
    async fn vendor_rejection_without_message_uses_default() {
        let vendor = FakeVendor::new(|_, _| {
            Err(VendorError::Rejected {
                status: 503,
                reason: "Service Unavailable".into(),
                body: VendorErrorBody::Json(json!({ "code": 1 })),
            })
        });
        let (status, body) = call(
            app(vendor),
            post_json("/generate", r#"{"prompt":"A cat","duration":6,"resolution":"1080P"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"], "Failed to generate video");
    }
}
