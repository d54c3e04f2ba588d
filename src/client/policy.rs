use crate::{Error, ErrorContext, Result};
use rand::Rng;
use std::time::Duration;

/// Largest accepted `max_delay`.
pub const MAX_BACKOFF_DELAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Internal decision for how to proceed after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Decision {
    Retry { delay: Duration },
    Fail,
}

/// Backoff and transient-failure budget for polling and transport retries.
///
/// Delay for attempt `n` (0-based) is `base_delay * multiplier^n`, capped at
/// `max_delay`, then jittered by up to `± jitter_factor`. A provider
/// `Retry-After` acts as a floor.
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
    pub jitter_factor: f64,
    /// Consecutive transient failures tolerated before giving up.
    pub max_transient_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            multiplier: 1.5,
            jitter_factor: 0.2,
            max_transient_failures: 5,
        }
    }
}

impl PollPolicy {
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// `0.0` disables jitter.
    pub fn with_jitter(mut self, factor: f64) -> Self {
        self.jitter_factor = factor;
        self
    }

    pub fn with_max_transient_failures(mut self, n: u32) -> Self {
        self.max_transient_failures = n;
        self
    }

    pub fn validate(&self) -> Result<()> {
        let problem = if self.base_delay.is_zero() {
            Some("base_delay must be positive")
        } else if self.max_delay < self.base_delay {
            Some("max_delay must be >= base_delay")
        } else if self.max_delay > MAX_BACKOFF_DELAY {
            Some("max_delay must not exceed 24 hours")
        } else if !self.multiplier.is_finite() || self.multiplier < 1.0 {
            Some("multiplier must be a finite value >= 1.0")
        } else if !(0.0..=1.0).contains(&self.jitter_factor) {
            Some("jitter_factor must be within [0, 1]")
        } else {
            None
        };
        match problem {
            Some(msg) => Err(Error::configuration_with_context(
                msg,
                ErrorContext::new()
                    .with_field_path("builder.poll_policy")
                    .with_source("client_builder"),
            )),
            None => Ok(()),
        }
    }

    pub(crate) fn backoff_delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exp = self.multiplier.powi(attempt.min(i32::MAX as u32) as i32);
        let max = self.max_delay.as_secs_f64();
        let mut secs = (self.base_delay.as_secs_f64() * exp).min(max);
        if self.jitter_factor > 0.0 {
            let r = rand::thread_rng().gen_range(-self.jitter_factor..=self.jitter_factor);
            secs = (secs * (1.0 + r)).clamp(0.0, max);
        }
        let delay = Duration::from_secs_f64(secs);
        match retry_after {
            Some(floor) if floor > delay => floor,
            _ => delay,
        }
    }

    /// Decide what to do after the `failures`-th consecutive transient failure
    /// (1-based). Business failures always fail.
    pub(crate) fn decide(&self, err: &Error, failures: u32, budget: u32, attempt: u32) -> Decision {
        if err.is_retryable() && failures <= budget {
            let retry_after = err.api().and_then(|a| a.retry_after);
            return Decision::Retry {
                delay: self.backoff_delay(attempt, retry_after),
            };
        }
        Decision::Fail
    }
}
