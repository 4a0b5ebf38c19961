//! Vendor gateway for text-to-video generation.
//!
//! [`VendorGateway`] is the seam the proxy server talks through;
//! [`MinimaxGateway`] is the production implementation backed by `reqwest`.

mod error;
mod gateway;

pub use error::{VendorError, VendorErrorBody};
pub use gateway::{MinimaxGateway, VendorConfig, VendorGateway};
