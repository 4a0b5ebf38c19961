//! Response envelopes for the local HTTP surface.
//!
//! Named fields always take precedence over vendor fields of the same name;
//! colliding vendor keys are always removed from `extra`, whatever their
//! shape, so the flattened output never carries a key twice. `base_resp` is
//! passed through as the vendor sent it.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::request::{GenerateRequest, Resolution, VideoDuration};
use crate::status::LifecycleStatus;

/// Vendor status block attached to most replies. Documents the usual shape of
/// the untyped `base_resp` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct BaseResp {
    pub status_code: i64,
    #[serde(default)]
    pub status_msg: String,
}

/// Body returned by every failing route.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<Object>))]
    pub details: Option<Value>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self { error: error.into(), details: None }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Reply of `POST /generate`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct SubmitResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub status: String,
    pub prompt: String,
    #[cfg_attr(feature = "openapi", schema(value_type = u8))]
    pub duration: VideoDuration,
    pub resolution: Resolution,
    pub submitted_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<BaseResp>))]
    pub base_resp: Option<Value>,
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extra: Map<String, Value>,
}

impl SubmitResponse {
    /// Wrap a vendor submission reply.
    ///
    /// The vendor's `task_id` is taken as-is when it is a string and in its
    /// decimal form when it is a number; any other shape is dropped.
    pub fn from_vendor(request: &GenerateRequest, vendor: Value, submitted_at: String) -> Self {
        let mut extra = into_map(vendor);
        let task_id = take_identifier(&mut extra, "task_id");
        let base_resp = extra.remove("base_resp");
        for key in ["status", "prompt", "duration", "resolution", "submitted_at"] {
            extra.remove(key);
        }

        Self {
            task_id,
            status: LifecycleStatus::SUBMITTED.to_owned(),
            prompt: request.prompt.clone(),
            duration: request.duration,
            resolution: request.resolution,
            submitted_at,
            base_resp,
            extra,
        }
    }
}

/// Reply of `GET /status/{task_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct StatusResponse {
    pub task_id: String,
    #[serde(default = "unknown_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[cfg_attr(feature = "openapi", schema(value_type = Option<BaseResp>))]
    pub base_resp: Option<Value>,
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extra: Map<String, Value>,
}

fn unknown_status() -> String {
    LifecycleStatus::UNKNOWN.to_owned()
}

impl StatusResponse {
    /// Wrap a vendor status reply for `task_id`.
    ///
    /// A missing or empty vendor status becomes `"unknown"`.
    pub fn from_vendor(task_id: &str, vendor: Value) -> Self {
        let mut extra = into_map(vendor);
        let task_id = take_string(&mut extra, "task_id")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| task_id.to_owned());
        let status = take_string(&mut extra, "status")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(unknown_status);
        let file_id = take_identifier(&mut extra, "file_id");
        let base_resp = extra.remove("base_resp");

        Self { task_id, status, file_id, base_resp, extra }
    }

    pub fn lifecycle(&self) -> LifecycleStatus {
        LifecycleStatus::from(self.status.as_str())
    }

    /// The vendor's failure explanation, if it sent one.
    pub fn vendor_error(&self) -> Option<&str> {
        self.extra
            .get("error")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

/// Reply of `GET /download-video/{file_id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct FileResponse {
    pub file_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(default)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub file_info: Value,
    #[serde(flatten)]
    #[cfg_attr(feature = "openapi", schema(value_type = Object))]
    pub extra: Map<String, Value>,
}

impl FileResponse {
    /// Wrap a vendor file-retrieve reply. The nested `file` object is kept in
    /// `extra` and mirrored into `file_info`.
    pub fn from_vendor(file_id: &str, vendor: Value) -> Self {
        let mut extra = into_map(vendor);
        for key in ["file_id", "download_url", "file_info"] {
            extra.remove(key);
        }
        let file_info = extra.get("file").cloned().unwrap_or(Value::Null);
        let download_url = file_info
            .get("download_url")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Self {
            file_id: file_id.to_owned(),
            download_url,
            file_info,
            extra,
        }
    }

    /// The download URL, treating an empty string as not yet available.
    pub fn usable_download_url(&self) -> Option<&str> {
        self.download_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn into_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Remove `key` and keep it only when it is a string.
fn take_string(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) => Some(s),
        _ => None,
    }
}

/// Accept identifiers sent either as strings or as bare numbers.
fn take_identifier(map: &mut Map<String, Value>, key: &str) -> Option<String> {
    match map.remove(key)? {
        Value::String(s) if !s.is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
