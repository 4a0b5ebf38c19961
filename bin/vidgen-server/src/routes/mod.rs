//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI document (disable with `VIDGEN_ENABLE_SWAGGER=false`)
//! - Health route
//! - Video proxy routes (`/generate`, `/status`, `/download-video`)
//! - Provider webhook (`/callback`) and the credential-free `/test-status` fixture

mod callback;
pub mod doc;
mod download;
mod generate;
mod health;
mod status;
mod test_status;

use std::sync::Arc;

use axum::{Router, middleware};
use tower::ServiceBuilder;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let mut app = Router::new()
        .merge(health::router())
        .merge(generate::router())
        .merge(status::router())
        .merge(download::router())
        .merge(callback::router())
        .merge(test_status::router());

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(ServiceBuilder::new().layer(cors::cors_layer(&state)))
        .layer(middleware::from_fn(trace::trace_middleware))
        .with_state(state)
}

/// Reject identifiers that are empty once trimmed.
fn require_id<'a>(raw: &'a str, message: &str) -> Result<&'a str, crate::error::ServerError> {
    let id = raw.trim();
    if id.is_empty() {
        Err(crate::error::ServerError::BadRequest(message.to_owned()))
    } else {
        Ok(id)
    }
}
