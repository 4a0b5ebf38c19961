//! Status polling for vidgen generation tasks.
//!
//! The crate is split into a pure state machine ([`machine`]), the cadence
//! policy ([`schedule`]), the HTTP client for the local proxy ([`client`]) and
//! the tokio-driven session that ties them together ([`session`]).
//!
//! ```rust,ignore
//! let api = Arc::new(HttpProxyClient::new("http://127.0.0.1:3000")?);
//! let mut poller = Poller::new(api, PollSchedule::default());
//! let mut state = poller.submit(request).await?;
//! let done = state.wait_for(|s| s.phase.is_terminal()).await?;
//! ```

pub mod client;
pub mod machine;
pub mod schedule;
pub mod session;

pub use client::{HttpProxyClient, ProxyApi, ProxyError};
pub use machine::{CheckOrigin, NextAction, Phase, PollEvent, PollState, Task, transition};
pub use schedule::PollSchedule;
pub use session::{Poller, PollingSession};
