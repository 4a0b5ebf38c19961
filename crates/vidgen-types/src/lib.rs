//! Shared wire types for vidgen.
//!
//! The proxy server produces these envelopes and the polling client consumes
//! them. Every envelope names the fields vidgen relies on and carries the
//! remaining vendor fields in a flattened `extra` map so nothing the vendor
//! sends is lost on the way through.

pub mod envelope;
pub mod request;
pub mod status;

pub use envelope::{BaseResp, ErrorBody, FileResponse, StatusResponse, SubmitResponse};
pub use request::{GenerateRequest, RawGenerateRequest, Resolution, ValidationError, VideoDuration};
pub use status::LifecycleStatus;

/// Model identifier sent with every generation request unless overridden.
pub const DEFAULT_MODEL: &str = "MiniMax-Hailuo-02";
