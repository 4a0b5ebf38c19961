//! Client for the local proxy surface (`/generate`, `/status`, `/download-video`).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, warn};
use vidgen_types::{ErrorBody, FileResponse, GenerateRequest, StatusResponse, SubmitResponse};

use crate::machine::{MSG_DOWNLOAD_FAILED, MSG_NETWORK, MSG_STATUS_FAILED};

/// Errors surfaced by [`ProxyApi`] calls.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// The proxy could not be reached or the connection broke.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The proxy answered with a non-2xx status and, usually, an [`ErrorBody`].
    #[error("proxy returned {status}: {}", .body.as_ref().map(|b| b.error.as_str()).unwrap_or("no error body"))]
    Rejected { status: u16, body: Option<ErrorBody> },

    /// A 2xx reply that does not match the expected envelope.
    #[error("unexpected proxy reply: {0}")]
    Decode(String),

    /// The proxy accepted a submission but returned no task id.
    #[error("submission accepted without a task id")]
    MissingTaskId,

    #[error("invalid proxy URL: {0}")]
    InvalidUrl(String),
}

impl ProxyError {
    /// Message recorded on the session when a status check fails.
    pub fn status_message(&self) -> String {
        match self {
            ProxyError::Network(_) => MSG_NETWORK.to_owned(),
            ProxyError::Rejected { body: Some(body), .. } if !body.error.is_empty() => {
                body.error.clone()
            }
            _ => MSG_STATUS_FAILED.to_owned(),
        }
    }

    /// Message recorded on the session when file resolution fails.
    pub fn download_message(&self) -> String {
        match self {
            ProxyError::Network(_) => MSG_NETWORK.to_owned(),
            _ => MSG_DOWNLOAD_FAILED.to_owned(),
        }
    }
}

/// Operations the polling session needs from the proxy layer.
#[async_trait]
pub trait ProxyApi: Send + Sync + 'static {
    async fn submit(&self, request: &GenerateRequest) -> Result<SubmitResponse, ProxyError>;

    async fn status(&self, task_id: &str) -> Result<StatusResponse, ProxyError>;

    async fn download(&self, file_id: &str) -> Result<FileResponse, ProxyError>;
}

/// `reqwest` implementation of [`ProxyApi`] against a running vidgen server.
#[derive(Debug, Clone)]
pub struct HttpProxyClient {
    client: Client,
    base_url: Url,
}

impl HttpProxyClient {
    pub fn new(base_url: &str) -> Result<Self, ProxyError> {
        Self::with_timeout(base_url, Duration::from_secs(60))
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> Result<Self, ProxyError> {
        let base_url = Url::parse(base_url).map_err(|e| ProxyError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ProxyError::InvalidUrl(base_url.to_string()));
        }
        let client = Client::builder()
            .user_agent(concat!("vidgen-cli/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self { client, base_url })
    }

    /// Append percent-encoded path segments to the base URL.
    fn endpoint(&self, segments: &[&str]) -> Result<Url, ProxyError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ProxyError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, ProxyError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(status = status.as_u16(), body = %text, "proxy rejected request");
            return Err(ProxyError::Rejected {
                status: status.as_u16(),
                body: serde_json::from_str(&text).ok(),
            });
        }

        debug!(status = status.as_u16(), body = %text, "proxy reply");
        serde_json::from_str(&text).map_err(|e| ProxyError::Decode(e.to_string()))
    }
}

#[async_trait]
impl ProxyApi for HttpProxyClient {
    async fn submit(&self, request: &GenerateRequest) -> Result<SubmitResponse, ProxyError> {
        let url = self.endpoint(&["generate"])?;
        self.send(self.client.post(url).json(request)).await
    }

    async fn status(&self, task_id: &str) -> Result<StatusResponse, ProxyError> {
        let url = self.endpoint(&["status", task_id])?;
        self.send(self.client.get(url)).await
    }

    async fn download(&self, file_id: &str) -> Result<FileResponse, ProxyError> {
        let url = self.endpoint(&["download-video", file_id])?;
        self.send(self.client.get(url)).await
    }
}
