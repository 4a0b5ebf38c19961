//! HTTP middleware stack.
//!
//! [`cors`] builds the CORS layer from configuration; [`trace`] tags every
//! request with an `x-trace-id` and logs it inside its own span.

pub mod cors;
pub mod trace;
