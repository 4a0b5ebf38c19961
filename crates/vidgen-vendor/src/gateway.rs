use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use vidgen_types::GenerateRequest;

use crate::error::{VendorError, VendorErrorBody};

/// The three vendor operations the proxy layer forwards to.
#[async_trait]
pub trait VendorGateway: Send + Sync + 'static {
    /// Start a generation; the reply carries the vendor `task_id`.
    async fn create_generation(&self, request: &GenerateRequest) -> Result<Value, VendorError>;

    /// Query the lifecycle status of `task_id`.
    async fn query_generation(&self, task_id: &str) -> Result<Value, VendorError>;

    /// Exchange a `file_id` for file metadata including its download URL.
    async fn retrieve_file(&self, file_id: &str) -> Result<Value, VendorError>;
}

/// Connection settings for [`MinimaxGateway`].
#[derive(Debug, Clone)]
pub struct VendorConfig {
    /// Scheme and host, e.g. `https://api.minimax.io`.
    pub base_url: String,
    /// Bearer token. `None` makes every call fail with [`VendorError::MissingApiKey`].
    pub api_key: Option<String>,
    /// Model identifier sent with generation requests.
    pub model: String,
    pub timeout: Duration,
}

impl Default for VendorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.minimax.io".to_owned(),
            api_key: None,
            model: vidgen_types::DEFAULT_MODEL.to_owned(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// `reqwest`-backed gateway for the MiniMax video API.
pub struct MinimaxGateway {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl std::fmt::Debug for MinimaxGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MinimaxGateway")
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("model", &self.model)
            .finish()
    }
}

impl MinimaxGateway {
    pub fn new(config: VendorConfig) -> Result<Self, VendorError> {
        let client = Client::builder()
            .user_agent(concat!("vidgen/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_owned(),
            api_key: config.api_key.filter(|k| !k.trim().is_empty()),
            model: config.model,
        })
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    fn api_key(&self) -> Result<&str, VendorError> {
        self.api_key.as_deref().ok_or(VendorError::MissingApiKey)
    }

    fn url(&self, path: &str, query: &[(&str, &str)]) -> Result<Url, VendorError> {
        let raw = format!("{}{}", self.base_url, path);
        let parsed = if query.is_empty() {
            Url::parse(&raw)
        } else {
            Url::parse_with_params(&raw, query)
        };
        parsed.map_err(|e| VendorError::InvalidUrl(e.to_string()))
    }

    /// Send `request` and decode a 2xx JSON reply.
    async fn send(&self, op: &'static str, request: RequestBuilder) -> Result<Value, VendorError> {
        let started = Instant::now();
        let response = request.send().await.map_err(|e| {
            warn!(op, error = %e, "vendor request failed");
            VendorError::Transport(e)
        })?;

        let status = response.status();
        let text = response.text().await?;
        info!(
            op,
            status = status.as_u16(),
            latency_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "vendor replied"
        );

        if !status.is_success() {
            warn!(op, status = status.as_u16(), body = %text, "vendor rejected request");
            return Err(VendorError::Rejected {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_owned(),
                body: VendorErrorBody::parse(text),
            });
        }

        debug!(op, body = %text, "vendor reply body");
        serde_json::from_str(&text).map_err(|e| VendorError::Decode(e.to_string()))
    }
}

#[async_trait]
impl VendorGateway for MinimaxGateway {
    async fn create_generation(&self, request: &GenerateRequest) -> Result<Value, VendorError> {
        let key = self.api_key()?;
        let url = self.url("/v1/video_generation", &[])?;
        info!(
            prompt = %request.prompt,
            duration = request.duration.seconds(),
            resolution = %request.resolution,
            "submitting video generation"
        );

        let body = json!({
            "prompt": request.prompt,
            "model": self.model,
            "duration": request.duration.seconds(),
            "resolution": request.resolution.to_string(),
        });
        self.send("create_generation", self.client.post(url).bearer_auth(key).json(&body))
            .await
    }

    async fn query_generation(&self, task_id: &str) -> Result<Value, VendorError> {
        let key = self.api_key()?;
        let url = self.url("/v1/query/video_generation", &[("task_id", task_id)])?;
        debug!(task_id, "querying generation status");
        self.send("query_generation", self.client.get(url).bearer_auth(key))
            .await
    }

    async fn retrieve_file(&self, file_id: &str) -> Result<Value, VendorError> {
        let key = self.api_key()?;
        let url = self.url("/v1/files/retrieve", &[("file_id", file_id)])?;
        debug!(file_id, "retrieving file");
        self.send("retrieve_file", self.client.get(url).bearer_auth(key))
            .await
    }
}
