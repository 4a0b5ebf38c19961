use utoipa::OpenApi;

use crate::routes::{callback, download, generate, health, status, test_status};

#[derive(OpenApi)]
#[openapi(info(
    title = "vidgen-server",
    description = "Text-to-video proxy in front of the MiniMax video API"
))]
pub struct ApiDoc;

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(generate::GenerateApi::openapi());
    root.merge(status::StatusApi::openapi());
    root.merge(download::DownloadApi::openapi());
    root.merge(callback::CallbackApi::openapi());
    root.merge(test_status::TestStatusApi::openapi());
    root
}
