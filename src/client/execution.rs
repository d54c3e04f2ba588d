//! 请求执行逻辑：单次提交、传输层重试与结果解码。
//!
//! Request execution (one submission per call).
//!
//! Only transport failures (no response at all) are retried here. Any HTTP
//! response, success or failure, ends the submission.

use crate::client::error_classification::{
    classify_response, classify_transport, log_failure, REQUEST_ID_HEADERS,
};
use crate::client::policy::Decision;
use crate::client::types::CallStats;
use crate::registry::{ArtifactKind, EndpointDescriptor};
use crate::transport::{HttpRequest, HttpResponse};
use crate::types::{AsyncJob, FieldValue, FinishReason, GenerationResult, Submission, ValidatedRequest};
use crate::{Error, ErrorContext, Result};
use base64::Engine;
use serde::Deserialize;
use std::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::core::StabilityClient;

#[derive(Debug, Deserialize)]
struct AcceptedBody {
    id: String,
}

#[derive(Debug, Deserialize)]
struct JsonArtifact {
    #[serde(default)]
    image: Option<String>,
    #[serde(default)]
    audio: Option<String>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    finish_reason: Option<String>,
}

fn protocol_error(msg: impl Into<String>, endpoint_id: &str, source: &str) -> Error {
    Error::runtime_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(endpoint_id)
            .with_source(source),
    )
}

fn content_type_essence(resp: &HttpResponse) -> Option<String> {
    let raw = resp.header("content-type")?;
    let essence = raw.split(';').next().unwrap_or_default().trim();
    (!essence.is_empty()).then(|| essence.to_ascii_lowercase())
}

/// Builds a [`GenerationResult`] from a 200 response, raw or JSON.
pub(crate) fn decode_artifact(
    endpoint_id: &str,
    artifact: ArtifactKind,
    output_format: Option<&str>,
    resp: &HttpResponse,
    generation_id: Option<String>,
) -> Result<GenerationResult> {
    let content_type = content_type_essence(resp);
    let request_id = resp.header_first(REQUEST_ID_HEADERS);

    if content_type.as_deref() == Some("application/json") {
        let body: JsonArtifact = serde_json::from_slice(&resp.body).map_err(|e| {
            protocol_error(
                format!("malformed JSON result: {}", e),
                endpoint_id,
                "result_decoder",
            )
        })?;
        let encoded = match artifact {
            ArtifactKind::Image => body.image,
            ArtifactKind::Audio => body.audio,
            ArtifactKind::Model => body.model,
        }
        .ok_or_else(|| {
            protocol_error(
                format!("JSON result has no {:?} payload", artifact),
                endpoint_id,
                "result_decoder",
            )
        })?;
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| {
                protocol_error(
                    format!("invalid base64 artifact: {}", e),
                    endpoint_id,
                    "result_decoder",
                )
            })?;
        return Ok(GenerationResult {
            endpoint_id: endpoint_id.to_string(),
            artifact: bytes.into(),
            media_type: artifact.media_type_for(output_format),
            seed: body.seed,
            finish_reason: body.finish_reason.as_deref().map(FinishReason::parse),
            generation_id,
            request_id,
        });
    }

    Ok(GenerationResult {
        endpoint_id: endpoint_id.to_string(),
        artifact: resp.body.clone(),
        media_type: content_type.unwrap_or_else(|| artifact.media_type_for(output_format)),
        seed: resp.header("seed").and_then(|s| s.trim().parse().ok()),
        finish_reason: resp.header("finish-reason").map(FinishReason::parse),
        generation_id,
        request_id,
    })
}

impl StabilityClient {
    /// Sends `request`, retrying transport failures up to `network_retries`
    /// times. Returns the response and the number of attempts made.
    pub(crate) async fn send_with_retries(
        &self,
        request: &HttpRequest,
        endpoint_id: &str,
    ) -> Result<(HttpResponse, u32)> {
        let mut failures = 0u32;
        loop {
            match self.transport.send(request).await {
                Ok(resp) => return Ok((resp, failures + 1)),
                Err(e) => {
                    failures += 1;
                    let err = Error::Api(classify_transport(&e, failures));
                    match self.poll_policy.decide(
                        &err,
                        failures,
                        self.network_retries,
                        failures - 1,
                    ) {
                        Decision::Retry { delay } => {
                            warn!(
                                endpoint = endpoint_id,
                                attempt = failures,
                                delay_ms = delay.as_millis() as u64,
                                error = %e,
                                "transport failure, retrying"
                            );
                            self.clock.sleep(delay).await;
                        }
                        Decision::Fail => return Err(err),
                    }
                }
            }
        }
    }

    fn accept_job(
        &self,
        descriptor: &EndpointDescriptor,
        resp: &HttpResponse,
        output_format: Option<String>,
    ) -> Result<AsyncJob> {
        let body: AcceptedBody = serde_json::from_slice(&resp.body).map_err(|e| {
            protocol_error(
                format!("malformed 202 body: {}", e),
                &descriptor.id,
                "execution_core",
            )
        })?;
        if !AsyncJob::is_valid_id(&body.id) {
            return Err(protocol_error(
                format!("generation id '{}' is not 64 alphanumerics", body.id),
                &descriptor.id,
                "execution_core",
            ));
        }
        Ok(AsyncJob::new(
            body.id,
            descriptor.id.clone(),
            self.clock.now(),
            self.credential.fingerprint(),
            descriptor.artifact,
            output_format,
        ))
    }

    pub(crate) async fn execute_submission(
        &self,
        request: &ValidatedRequest,
    ) -> Result<(Submission, CallStats)> {
        let descriptor = request.descriptor();
        let encoded = self.encode(request);
        let client_request_id = Uuid::new_v4().to_string();
        let http = HttpRequest {
            method: encoded.method,
            url: self.url(&encoded.path),
            headers: encoded.headers,
            form: Some(encoded.parts),
        };

        debug!(
            endpoint = descriptor.id.as_str(),
            client_request_id = client_request_id.as_str(),
            "submitting generation request"
        );
        let start = Instant::now();
        let (resp, attempts) = self.send_with_retries(&http, &descriptor.id).await?;
        let output_format = request
            .get("output_format")
            .and_then(FieldValue::as_text)
            .map(str::to_string);

        let submission = match resp.status {
            200 => Submission::Complete(decode_artifact(
                &descriptor.id,
                descriptor.artifact,
                output_format.as_deref(),
                &resp,
                None,
            )?),
            202 if descriptor.is_async() => {
                Submission::Pending(self.accept_job(descriptor, &resp, output_format)?)
            }
            202 => {
                return Err(protocol_error(
                    "sync endpoint answered 202 Accepted",
                    &descriptor.id,
                    "execution_core",
                ))
            }
            s if (200..300).contains(&s) => {
                return Err(protocol_error(
                    format!("unexpected success status {}", s),
                    &descriptor.id,
                    "execution_core",
                ))
            }
            _ => {
                let api = classify_response(&resp);
                log_failure(&api, &descriptor.path, start);
                return Err(Error::Api(api));
            }
        };

        let stats = CallStats {
            endpoint_id: descriptor.id.clone(),
            endpoint: descriptor.path.clone(),
            http_status: resp.status,
            attempts,
            duration_ms: start.elapsed().as_millis(),
            client_request_id,
            upstream_request_id: resp.header_first(REQUEST_ID_HEADERS),
        };
        info!(
            endpoint = stats.endpoint.as_str(),
            http_status = stats.http_status,
            attempts = stats.attempts,
            duration_ms = stats.duration_ms,
            client_request_id = stats.client_request_id.as_str(),
            generation_id = submission.job().map(|j| j.id()).unwrap_or(""),
            "stability request completed"
        );
        Ok((submission, stats))
    }
}
