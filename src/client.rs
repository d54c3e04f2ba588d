//! Client for the generation endpoints.
//!
//! Keep the public surface small and predictable. Implementation details are
//! split into submodules under `src/client/`.

pub mod builder;
pub mod clock;
pub mod core;
pub mod error_classification;
mod execution;
mod policy;
mod poller;
pub mod types;

pub use builder::StabilityClientBuilder;
pub use clock::{Clock, ManualClock, SystemClock};
pub use core::StabilityClient;
pub use error_classification::classify_response;
pub use policy::{PollPolicy, MAX_BACKOFF_DELAY};
pub use types::{CallStats, CancelHandle, PollOptions};
