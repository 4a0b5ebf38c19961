//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors always leave the process as a
//! JSON [`ErrorBody`] with an appropriate status code.
//!
//! Transport and internal failures are logged with full detail but only a
//! generic message is returned to the caller.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::Value;
use thiserror::Error;
use tracing::{error, warn};
use vidgen_types::{ErrorBody, ValidationError};
use vidgen_vendor::{VendorError, VendorErrorBody};

pub const MSG_API_KEY_MISSING: &str = "API Key missing";
pub const MSG_NETWORK: &str = "Network error contacting video provider";

/// All errors that can occur in the vidgen-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// The caller sent missing or malformed input; the vendor was not contacted.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The server is missing required configuration (vendor credentials).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The vendor rejected the call; its status code is passed through.
    #[error("vendor error {status}: {message}")]
    Vendor {
        status: u16,
        message: String,
        details: Option<Value>,
    },

    /// The vendor could not be reached.
    #[error("network error: {0}")]
    Network(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// Classify a vendor failure. `describe` shapes the message and
    /// diagnostics for a rejection, which differ per route.
    pub fn from_vendor(
        err: VendorError,
        describe: impl FnOnce(u16, &str, &VendorErrorBody) -> (String, Value),
    ) -> Self {
        match err {
            VendorError::MissingApiKey => ServerError::Configuration(MSG_API_KEY_MISSING.to_owned()),
            VendorError::Transport(e) => ServerError::Network(e.to_string()),
            VendorError::Rejected { status, reason, body } => {
                let (message, details) = describe(status, &reason, &body);
                ServerError::Vendor {
                    status,
                    message,
                    details: Some(details),
                }
            }
            VendorError::Decode(m) => ServerError::Internal(format!("undecodable vendor reply: {m}")),
            VendorError::InvalidUrl(m) => ServerError::Internal(m),
        }
    }
}

impl From<ValidationError> for ServerError {
    fn from(e: ValidationError) -> Self {
        ServerError::BadRequest(e.to_string())
    }
}

impl From<JsonRejection> for ServerError {
    fn from(rejection: JsonRejection) -> Self {
        ServerError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            // Client-facing errors: expose the message directly.
            ServerError::BadRequest(m) => (StatusCode::BAD_REQUEST, ErrorBody::new(m)),
            ServerError::Vendor { status, message, details } => {
                warn!(status, message = %message, "vendor error passed through");
                let code = StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
                (code, ErrorBody { error: message, details })
            }

            // Server-side errors: log the detail, keep the body generic.
            ServerError::Configuration(m) => {
                error!(message = %m, "server is misconfigured");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(m))
            }
            ServerError::Network(m) => {
                error!(error = %m, "vendor unreachable");
                (StatusCode::BAD_GATEWAY, ErrorBody::new(MSG_NETWORK))
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorBody::new("internal server error"),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}
