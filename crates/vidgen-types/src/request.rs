//! Generation request input and its validation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

/// Clip length accepted by the vendor, serialized as the bare integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum VideoDuration {
    Six,
    Ten,
}

impl VideoDuration {
    pub fn seconds(self) -> u8 {
        match self {
            VideoDuration::Six => 6,
            VideoDuration::Ten => 10,
        }
    }
}

impl TryFrom<u8> for VideoDuration {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            6 => Ok(VideoDuration::Six),
            10 => Ok(VideoDuration::Ten),
            _ => Err(ValidationError::Duration),
        }
    }
}

impl From<VideoDuration> for u8 {
    fn from(value: VideoDuration) -> Self {
        value.seconds()
    }
}

/// Output resolution. Wire strings are case-sensitive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub enum Resolution {
    #[serde(rename = "1080P")]
    #[strum(serialize = "1080P")]
    P1080,
    #[serde(rename = "768P")]
    #[strum(serialize = "768P")]
    P768,
}

/// Client-side input errors, reported before the vendor is contacted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Prompt is required")]
    Prompt,

    #[error("Duration must be 6 or 10 seconds")]
    Duration,

    #[error("Resolution must be 1080P or 768P")]
    Resolution,
}

/// Loosely typed body of `POST /generate`.
///
/// Fields stay untyped so that a wrong type produces the same message as a
/// wrong value instead of a deserializer error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawGenerateRequest {
    #[serde(default)]
    pub prompt: Option<Value>,
    #[serde(default)]
    pub duration: Option<Value>,
    #[serde(default)]
    pub resolution: Option<Value>,
}

/// A validated generation request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct GenerateRequest {
    pub prompt: String,
    #[cfg_attr(feature = "openapi", schema(value_type = u8, example = 6))]
    pub duration: VideoDuration,
    pub resolution: Resolution,
}

impl GenerateRequest {
    /// Build a request, applying the same checks as [`RawGenerateRequest::validate`].
    pub fn new(
        prompt: impl Into<String>,
        duration: VideoDuration,
        resolution: Resolution,
    ) -> Result<Self, ValidationError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ValidationError::Prompt);
        }
        Ok(Self { prompt, duration, resolution })
    }
}

impl RawGenerateRequest {
    /// Check fields in order: prompt, then duration, then resolution.
    pub fn validate(self) -> Result<GenerateRequest, ValidationError> {
        let prompt = match self.prompt {
            Some(Value::String(p)) if !p.trim().is_empty() => p,
            _ => return Err(ValidationError::Prompt),
        };

        let duration = self
            .duration
            .as_ref()
            .and_then(Value::as_f64)
            .and_then(|secs| match secs {
                s if s == 6.0 => Some(VideoDuration::Six),
                s if s == 10.0 => Some(VideoDuration::Ten),
                _ => None,
            })
            .ok_or(ValidationError::Duration)?;

        let resolution = self
            .resolution
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|r| r.parse::<Resolution>().ok())
            .ok_or(ValidationError::Resolution)?;

        Ok(GenerateRequest { prompt, duration, resolution })
    }
}
