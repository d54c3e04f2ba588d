//! 异步结果轮询：显式状态机 + 可注入时钟。
//!
//! Result poller for async jobs.
//!
//! Each poll loop is an explicit state machine owning its backoff counter and
//! deadline:
//!
//! ```text
//! Pending --202--> Pending (after backoff)
//! Pending --200--> Terminal
//! Pending --404--> Expired
//! Pending --transient--> Pending (bounded) | Failed
//! Pending --cancel--> Cancelled   (checked between attempts and during backoff)
//! ```
//!
//! An in-flight GET is never abandoned for a cancel: if it returns the
//! artifact after cancellation was requested, the artifact is still returned.
//! The caller's deadline is different. It bounds the GET as well, whatever
//! the transport timeout is.

use crate::client::error_classification::{classify_response, classify_transport, log_failure};
use crate::client::execution::decode_artifact;
use crate::client::policy::Decision;
use crate::client::types::{CancelHandle, PollOptions};
use crate::encoding::{accept_for, base_headers};
use crate::error::ApiError;
use crate::error_code::ErrorKind;
use crate::registry::HttpMethod;
use crate::transport::HttpRequest;
use crate::types::{AsyncJob, GenerationResult, JobStatus};
use crate::{Error, Result};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::core::StabilityClient;

#[derive(Debug)]
enum PollState {
    Pending,
    Terminal(GenerationResult),
    Expired(ApiError),
    Failed(Error),
    Cancelled,
}

struct PollLoop<'a> {
    client: &'a StabilityClient,
    job: &'a AsyncJob,
    /// `None` when the timeout is too large to represent.
    deadline: Option<Instant>,
    cancel: Option<CancelHandle>,
    /// Waits scheduled so far; drives the backoff exponent.
    attempt: u32,
    /// Consecutive transient failures.
    transient: u32,
}

fn not_found(job: &AsyncJob, why: &str) -> ApiError {
    ApiError::new(
        ErrorKind::NotFoundOrExpired,
        format!("generation {} {}", job.id(), why),
    )
}

impl<'a> PollLoop<'a> {
    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|c| c.is_cancelled()).unwrap_or(false)
    }

    async fn run(mut self) -> Result<GenerationResult> {
        let mut state = PollState::Pending;
        loop {
            state = match state {
                PollState::Pending => self.step().await,
                PollState::Terminal(result) => return Ok(result),
                PollState::Expired(api) => return Err(Error::Api(api)),
                PollState::Failed(err) => return Err(err),
                PollState::Cancelled => {
                    return Err(Error::Api(ApiError::new(
                        ErrorKind::Cancelled,
                        format!("polling for {} was cancelled", self.job.id()),
                    )))
                }
            };
        }
    }

    fn timed_out(&self) -> PollState {
        debug!(generation_id = self.job.id(), "poll deadline reached");
        PollState::Failed(Error::Api(ApiError::new(
            ErrorKind::Timeout,
            format!(
                "generation {} not ready before the caller's deadline",
                self.job.id()
            ),
        )))
    }

    async fn step(&mut self) -> PollState {
        if self.is_cancelled() {
            return PollState::Cancelled;
        }

        let client = self.client;
        let job = self.job;
        let fetched = match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                r = client.fetch_result(job) => Some(r),
                _ = client.clock.sleep_until(deadline) => None,
            },
            None => Some(client.fetch_result(job).await),
        };
        let Some(fetched) = fetched else {
            return self.timed_out();
        };

        match fetched {
            Ok(JobStatus::Complete(result)) => {
                debug!(generation_id = self.job.id(), "poll reached terminal result");
                PollState::Terminal(result)
            }
            Ok(JobStatus::Running) => {
                self.transient = 0;
                let delay = self.client.poll_policy.backoff_delay(self.attempt, None);
                self.wait(delay).await
            }
            Err(Error::Api(api)) if api.kind == ErrorKind::NotFoundOrExpired => {
                PollState::Expired(api)
            }
            Err(err) => {
                self.transient += 1;
                let policy = &self.client.poll_policy;
                match policy.decide(
                    &err,
                    self.transient,
                    policy.max_transient_failures,
                    self.attempt,
                ) {
                    Decision::Retry { delay } => {
                        warn!(
                            generation_id = self.job.id(),
                            transient_failures = self.transient,
                            delay_ms = delay.as_millis() as u64,
                            error = %err,
                            "transient poll failure, retrying"
                        );
                        self.wait(delay).await
                    }
                    Decision::Fail => PollState::Failed(err),
                }
            }
        }
    }

    /// Sleeps before the next attempt, unless the deadline or a cancel comes first.
    async fn wait(&mut self, delay: Duration) -> PollState {
        if let Some(deadline) = self.deadline {
            let wake = self.client.clock.now().checked_add(delay);
            if wake.map_or(true, |at| at >= deadline) {
                return self.timed_out();
            }
        }
        self.attempt += 1;
        debug!(
            generation_id = self.job.id(),
            attempt = self.attempt,
            delay_ms = delay.as_millis() as u64,
            "generation pending"
        );
        let sleep = self.client.clock.sleep(delay);
        match &self.cancel {
            Some(cancel) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => PollState::Cancelled,
                    _ = sleep => PollState::Pending,
                }
            }
            None => {
                sleep.await;
                PollState::Pending
            }
        }
    }
}

impl StabilityClient {
    /// One poll step: a single GET for the job's result.
    ///
    /// Jobs created under another credential, or older than the retention
    /// window, resolve to `NotFoundOrExpired` without a network call. A result
    /// is handed out at most once; fetching a finished job again may yield 404.
    pub async fn fetch_result(&self, job: &AsyncJob) -> Result<JobStatus> {
        if job.owner() != self.credential.fingerprint() {
            return Err(Error::Api(not_found(job, "is not visible to this credential")));
        }
        if job.is_expired(self.clock.now()) {
            return Err(Error::Api(not_found(job, "is past the retention window")));
        }

        let path = format!("{}/{}", self.results_path, job.id());
        let request = HttpRequest {
            method: HttpMethod::Get,
            url: self.url(&path),
            headers: base_headers(
                &self.credential,
                &self.identity,
                accept_for(job.artifact(), self.response_encoding),
            ),
            form: None,
        };

        let start = Instant::now();
        let resp = self
            .transport
            .send(&request)
            .await
            .map_err(|e| Error::Api(classify_transport(&e, 1)))?;

        match resp.status {
            200 => decode_artifact(
                job.endpoint_id(),
                job.artifact(),
                job.output_format(),
                &resp,
                Some(job.id().to_string()),
            )
            .map(JobStatus::Complete),
            202 => Ok(JobStatus::Running),
            404 => Err(Error::Api(
                not_found(job, "was not found or has expired").with_status(404),
            )),
            _ => {
                let api = classify_response(&resp);
                log_failure(&api, &path, start);
                Err(Error::Api(api))
            }
        }
    }

    /// Polls until the job finishes, the deadline passes, or `options.cancel` fires.
    pub async fn poll(&self, job: &AsyncJob, options: PollOptions) -> Result<GenerationResult> {
        PollLoop {
            client: self,
            job,
            deadline: self.clock.now().checked_add(options.timeout),
            cancel: options.cancel,
            attempt: 0,
            transient: 0,
        }
        .run()
        .await
    }
}
