use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call statistics for observability.
#[derive(Debug, Clone)]
pub struct CallStats {
    pub endpoint_id: String,
    /// Request path, e.g. `/v2beta/stable-image/generate/core`.
    pub endpoint: String,
    pub http_status: u16,
    /// Transport attempts, including the successful one.
    pub attempts: u32,
    pub duration_ms: u128,
    /// Locally generated id used to correlate log lines.
    pub client_request_id: String,
    pub upstream_request_id: Option<String>,
}

/// Cancels an in-progress poll. Cloning yields handles to the same signal.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    token: CancellationToken,
}

impl CancelHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) async fn cancelled(&self) {
        self.token.cancelled().await;
    }
}

/// Deadline and cancellation for a poll loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub timeout: Duration,
    pub cancel: Option<CancelHandle>,
}

impl PollOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            cancel: None,
        }
    }

    pub fn with_cancel(mut self, handle: CancelHandle) -> Self {
        self.cancel = Some(handle);
        self
    }
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(Duration::from_secs(600))
    }
}
