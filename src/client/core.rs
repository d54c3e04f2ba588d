use crate::client::clock::Clock;
use crate::client::policy::PollPolicy;
use crate::client::types::{CallStats, PollOptions};
use crate::encoding::{self, ClientIdentity, EncodedRequest, ResponseEncoding};
use crate::pricing::{self, CostEstimate};
use crate::registry::{EndpointDescriptor, ParamKind, Registry, Scalar};
use crate::transport::Transport;
use crate::types::{
    AsyncJob, Credential, GenerationResult, RequestDraft, Submission, ValidatedRequest,
};
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;

/// Client for the generation endpoints.
///
/// Holds everything a call needs (credential, base URL, transport, clock and
/// descriptor registry) as explicit state; there is no global configuration.
pub struct StabilityClient {
    pub(crate) registry: Arc<Registry>,
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) credential: Credential,
    pub(crate) base_url: String,
    pub(crate) results_path: String,
    pub(crate) identity: ClientIdentity,
    pub(crate) response_encoding: ResponseEncoding,
    pub(crate) poll_policy: PollPolicy,
    pub(crate) network_retries: u32,
}

impl std::fmt::Debug for StabilityClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityClient")
            .field("base_url", &self.base_url)
            .field("results_path", &self.results_path)
            .field("endpoints", &self.registry.len())
            .field("response_encoding", &self.response_encoding)
            .field("network_retries", &self.network_retries)
            .finish_non_exhaustive()
    }
}

impl StabilityClient {
    /// Client configured from the environment (`STABILITY_API_KEY` etc.).
    pub fn from_env() -> Result<Self> {
        crate::client::builder::StabilityClientBuilder::new().build()
    }

    pub fn builder() -> crate::client::builder::StabilityClientBuilder {
        crate::client::builder::StabilityClientBuilder::new()
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn descriptor(&self, endpoint_id: &str) -> Result<Arc<EndpointDescriptor>> {
        self.registry.get(endpoint_id)
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Checks a draft against its endpoint contract. No network I/O.
    pub fn validate(&self, draft: &RequestDraft) -> Result<ValidatedRequest> {
        let descriptor = self.registry.get(draft.endpoint())?;
        crate::validation::validate(&descriptor, draft)
    }

    /// Informational credit estimate for a draft.
    pub fn estimate_cost(&self, draft: &RequestDraft) -> Result<CostEstimate> {
        let request = self.validate(draft)?;
        pricing::estimate(&request)
    }

    /// Wire form of a validated request, using this client's credential.
    pub fn encode(&self, request: &ValidatedRequest) -> EncodedRequest {
        encoding::encode(
            request,
            &self.credential,
            &self.identity,
            self.response_encoding,
        )
    }

    /// Sends one validated request.
    pub async fn submit(&self, request: &ValidatedRequest) -> Result<Submission> {
        self.submit_with_stats(request).await.map(|(s, _)| s)
    }

    pub async fn submit_with_stats(
        &self,
        request: &ValidatedRequest,
    ) -> Result<(Submission, CallStats)> {
        self.execute_submission(request).await
    }

    /// Validate, submit and (for async endpoints) poll to completion.
    pub async fn generate(
        &self,
        draft: &RequestDraft,
        options: PollOptions,
    ) -> Result<GenerationResult> {
        let request = self.validate(draft)?;
        match self.submit(&request).await? {
            Submission::Complete(result) => Ok(result),
            Submission::Pending(job) => self.poll(&job, options).await,
        }
    }

    /// Runs several generations with bounded concurrency.
    ///
    /// Results preserve input order. Each async job gets its own deadline from
    /// `options`; a shared cancel handle stops every pending poll.
    pub async fn generate_batch(
        &self,
        drafts: Vec<RequestDraft>,
        concurrency_limit: Option<usize>,
        options: PollOptions,
    ) -> Vec<Result<GenerationResult>> {
        use futures::StreamExt;

        let n = drafts.len();
        if n == 0 {
            return Vec::new();
        }

        let limit = concurrency_limit.unwrap_or(4).max(1);
        let mut out: Vec<Option<Result<GenerationResult>>> = (0..n).map(|_| None).collect();

        let results: Vec<(usize, Result<GenerationResult>)> =
            futures::stream::iter(drafts.into_iter().enumerate())
                .map(|(idx, draft)| {
                    let options = options.clone();
                    async move { (idx, self.generate(&draft, options).await) }
                })
                .buffer_unordered(limit)
                .collect()
                .await;

        for (idx, r) in results {
            out[idx] = Some(r);
        }

        out.into_iter()
            .map(|o| o.unwrap_or_else(|| Err(Error::runtime("batch result missing"))))
            .collect()
    }

    /// Rebuilds a handle for a generation id issued earlier under this
    /// client's credential, assuming the endpoint's default `output_format`.
    ///
    /// The creation time is unknown, so the retention window restarts now;
    /// the provider still answers 404 once the real window has passed.
    pub fn resume_job(&self, generation_id: &str, endpoint_id: &str) -> Result<AsyncJob> {
        self.resume_job_with_format(generation_id, endpoint_id, None)
    }

    /// Like [`resume_job`](Self::resume_job), for jobs submitted with an
    /// explicit `output_format`. It decides the media type of JSON-encoded
    /// results.
    pub fn resume_job_with_format(
        &self,
        generation_id: &str,
        endpoint_id: &str,
        output_format: Option<&str>,
    ) -> Result<AsyncJob> {
        let descriptor = self.registry.get(endpoint_id)?;
        if !descriptor.is_async() {
            return Err(Error::configuration_with_context(
                format!("endpoint '{}' does not produce async jobs", endpoint_id),
                ErrorContext::new()
                    .with_field_path("endpoint_id")
                    .with_source("resume_job"),
            ));
        }
        if !AsyncJob::is_valid_id(generation_id) {
            return Err(Error::configuration_with_context(
                "generation id must be 64 ASCII alphanumerics",
                ErrorContext::new()
                    .with_field_path("generation_id")
                    .with_details(format!("len={}", generation_id.len()))
                    .with_source("resume_job"),
            ));
        }

        let format_spec = descriptor.param("output_format");
        let output_format = match output_format {
            Some(format) => {
                let declared = match format_spec.map(|p| &p.kind) {
                    Some(ParamKind::Enum { choices }) => choices.iter().any(|c| c == format),
                    _ => false,
                };
                if !declared {
                    return Err(Error::configuration_with_context(
                        format!("endpoint '{}' has no output format '{}'", endpoint_id, format),
                        ErrorContext::new()
                            .with_field_path("output_format")
                            .with_source("resume_job"),
                    ));
                }
                Some(format.to_string())
            }
            None => format_spec
                .and_then(|p| p.default.as_ref())
                .and_then(|d| match d {
                    Scalar::Text(s) => Some(s.clone()),
                    _ => None,
                }),
        };

        Ok(AsyncJob::new(
            generation_id.to_string(),
            descriptor.id.clone(),
            self.clock.now(),
            self.credential.fingerprint(),
            descriptor.artifact,
            output_format,
        ))
    }
}
