//! 错误分类：把 HTTP 失败响应映射到统一的错误类型。
//!
//! Error classification shared by submission and polling.
//!
//! The provider reports failures as `{ "name": "...", "errors": ["..."] }`.
//! Statuses that decide retry behaviour (404, 429, 5xx) are classified by
//! status alone; for the remaining 4xx the provider `name` refines the kind.

use crate::error::ApiError;
use crate::error_code::ErrorKind;
use crate::transport::{HttpResponse, TransportError};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::info;

/// Headers that may carry an upstream request id, in preference order.
pub(crate) const REQUEST_ID_HEADERS: &[&str] =
    &["x-request-id", "request-id", "x-amzn-requestid", "cf-ray"];

const MAX_MESSAGE_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    errors: Vec<String>,
    #[serde(default)]
    message: Option<String>,
}

/// Best-effort parsing of `Retry-After`.
///
/// Only the `Retry-After: <seconds>` form is supported.
pub(crate) fn retry_after(resp: &HttpResponse) -> Option<Duration> {
    let raw = resp.header_first(&["retry-after"])?;
    let secs: u64 = raw.parse().ok()?;
    Some(Duration::from_secs(secs))
}

/// Classifies a non-success response.
pub fn classify_response(resp: &HttpResponse) -> ApiError {
    let status = resp.status;
    let body: Option<ProviderErrorBody> = serde_json::from_slice(&resp.body).ok();
    let provider_name = body.as_ref().and_then(|b| b.name.clone());

    let status_kind = ErrorKind::from_http_status(status);
    let kind = match status {
        404 | 410 | 429 | 500..=599 => status_kind,
        _ => provider_name
            .as_deref()
            .and_then(ErrorKind::from_provider_name)
            .unwrap_or(status_kind),
    };

    let message = body
        .as_ref()
        .and_then(|b| {
            if b.errors.is_empty() {
                b.message.clone()
            } else {
                Some(b.errors.join("; "))
            }
        })
        .or_else(|| {
            let text = String::from_utf8_lossy(&resp.body);
            let text = text.trim();
            (!text.is_empty()).then(|| text.chars().take(MAX_MESSAGE_CHARS).collect())
        })
        .unwrap_or_else(|| format!("HTTP {}", status));

    ApiError::new(kind, message)
        .with_status(status)
        .with_provider_name(provider_name)
        .with_retry_after(retry_after(resp))
        .with_request_id(resp.header_first(REQUEST_ID_HEADERS))
}

/// A transport failure with no response.
pub(crate) fn classify_transport(err: &TransportError, attempts: u32) -> ApiError {
    ApiError::new(
        ErrorKind::Unavailable,
        format!("no response after {} attempt(s): {}", attempts, err),
    )
}

pub(crate) fn log_failure(err: &ApiError, endpoint: &str, started: Instant) {
    info!(
        http_status = err.status.unwrap_or(0),
        error_class = err.kind.name(),
        provider_name = err.provider_name.as_deref().unwrap_or(""),
        request_id = err.request_id.as_deref().unwrap_or(""),
        endpoint,
        duration_ms = started.elapsed().as_millis(),
        "stability request failed"
    );
}
