use serde_json::Value;
use thiserror::Error;

/// Errors returned by vendor gateway operations.
#[derive(Debug, Error)]
pub enum VendorError {
    /// No API key is configured; nothing was sent.
    #[error("vendor API key is not configured")]
    MissingApiKey,

    /// The request never produced an HTTP response (DNS, connect, timeout, ...).
    #[error("vendor request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The vendor answered with a non-2xx status.
    #[error("vendor returned {status} {reason}")]
    Rejected {
        status: u16,
        reason: String,
        body: VendorErrorBody,
    },

    /// A 2xx reply whose body was not JSON.
    #[error("vendor reply is not valid JSON: {0}")]
    Decode(String),

    /// The configured base URL cannot be combined with the endpoint path.
    #[error("invalid vendor URL: {0}")]
    InvalidUrl(String),
}

/// Body of a rejected vendor call: parsed JSON when possible, raw text otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum VendorErrorBody {
    Json(Value),
    Text(String),
}

impl VendorErrorBody {
    pub fn parse(text: String) -> Self {
        match serde_json::from_str::<Value>(&text) {
            Ok(v) => VendorErrorBody::Json(v),
            Err(_) => VendorErrorBody::Text(text),
        }
    }

    /// The vendor's own message: `error` first, then `message`.
    pub fn message(&self) -> Option<&str> {
        match self {
            VendorErrorBody::Json(v) => ["error", "message"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str))
                .filter(|m| !m.is_empty()),
            VendorErrorBody::Text(_) => None,
        }
    }

    /// Body as JSON for diagnostics; text becomes a JSON string.
    pub fn to_value(&self) -> Value {
        match self {
            VendorErrorBody::Json(v) => v.clone(),
            VendorErrorBody::Text(t) => Value::String(t.clone()),
        }
    }

    /// Body as the raw text the vendor sent.
    pub fn to_text(&self) -> String {
        match self {
            VendorErrorBody::Json(v) => v.to_string(),
            VendorErrorBody::Text(t) => t.clone(),
        }
    }
}
