//! 错误分类体系：所有失败都映射到一个封闭的错误种类集合。
//!
//! Closed error taxonomy.
//!
//! Every failure surfaced by the engine (validation, submission, polling) is
//! projected onto exactly one [`ErrorKind`], so callers never branch on raw
//! HTTP status codes.
//!
//! ## Categories
//!
//! | Category    | Meaning                                   | Kinds |
//! |-------------|-------------------------------------------|-------|
//! | `request`   | fix the request before sending again      | ValidationFailed, InvalidRequest, ContentRejected, UnknownEndpoint, UnknownField |
//! | `account`   | fix the credential or the account balance | AuthRejected, InsufficientCredits |
//! | `transient` | try again later                           | RateLimited, Unavailable |
//! | `caller`    | outcome chosen by the caller              | Timeout, Cancelled, NotFoundOrExpired |
//! | `unknown`   | could not be classified                   | Unknown |
//!
//! ## Example
//!
//! ```rust
//! use stability_rs::error_code::ErrorKind;
//!
//! let kind = ErrorKind::from_http_status(429);
//! assert_eq!(kind, ErrorKind::RateLimited);
//! assert!(kind.retryable());
//! assert_eq!(kind.category(), "transient");
//! ```

use std::fmt;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request violated its descriptor; it was never sent.
    ValidationFailed,
    /// Bad or missing credential (HTTP 401).
    AuthRejected,
    /// Provider-side policy rejection of the prompt or content. Not charged.
    ContentRejected,
    /// The account has no credits left for this operation (HTTP 402).
    InsufficientCredits,
    /// The provider rejected the request shape (HTTP 400/413/422).
    InvalidRequest,
    /// Too many requests; retryable after the provider-suggested delay.
    RateLimited,
    /// Result resource unknown, expired, or owned by another credential.
    NotFoundOrExpired,
    /// Transient network failure or provider 5xx.
    Unavailable,
    /// The caller-imposed poll timeout elapsed.
    Timeout,
    /// The caller cancelled a pending poll.
    Cancelled,
    /// No descriptor is registered under the requested endpoint id.
    UnknownEndpoint,
    /// The request carried a field its descriptor does not declare.
    UnknownField,
    /// Anything that could not be classified.
    Unknown,
}

impl ErrorKind {
    /// Stable snake_case name (e.g. `"not_found_or_expired"`).
    #[inline]
    pub fn name(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "validation_failed",
            Self::AuthRejected => "auth_rejected",
            Self::ContentRejected => "content_rejected",
            Self::InsufficientCredits => "insufficient_credits",
            Self::InvalidRequest => "invalid_request",
            Self::RateLimited => "rate_limited",
            Self::NotFoundOrExpired => "not_found_or_expired",
            Self::Unavailable => "unavailable",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::UnknownEndpoint => "unknown_endpoint",
            Self::UnknownField => "unknown_field",
            Self::Unknown => "unknown",
        }
    }

    /// Whether an automatic retry may succeed without changing the request.
    ///
    /// Only the poll loop acts on this; submissions never auto-retry
    /// business failures.
    #[inline]
    pub fn retryable(&self) -> bool {
        matches!(self, Self::RateLimited | Self::Unavailable)
    }

    /// Coarse grouping: `"request"`, `"account"`, `"transient"`, `"caller"` or `"unknown"`.
    #[inline]
    pub fn category(&self) -> &'static str {
        match self {
            Self::ValidationFailed
            | Self::InvalidRequest
            | Self::ContentRejected
            | Self::UnknownEndpoint
            | Self::UnknownField => "request",
            Self::AuthRejected | Self::InsufficientCredits => "account",
            Self::RateLimited | Self::Unavailable => "transient",
            Self::Timeout | Self::Cancelled | Self::NotFoundOrExpired => "caller",
            Self::Unknown => "unknown",
        }
    }

    /// True for kinds that are resolved locally before any network call.
    #[inline]
    pub fn is_pre_flight(&self) -> bool {
        matches!(
            self,
            Self::ValidationFailed | Self::UnknownEndpoint | Self::UnknownField
        )
    }

    /// Maps a provider error `name` (from the JSON error body) to a kind.
    ///
    /// Returns `None` for names that carry no classification signal, in which
    /// case the HTTP status decides.
    pub fn from_provider_name(name: &str) -> Option<Self> {
        let kind = match name {
            "content_moderation" | "content_filtered" | "moderation" => Self::ContentRejected,
            "unauthorized" | "invalid_api_key" | "authentication_error" => Self::AuthRejected,
            "payment_required" | "insufficient_balance" => Self::InsufficientCredits,
            "rate_limit_exceeded" | "too_many_requests" => Self::RateLimited,
            "not_found" | "generation_not_found" => Self::NotFoundOrExpired,
            "bad_request" | "invalid_parameters" | "payload_too_large" | "invalid_language" => {
                Self::InvalidRequest
            }
            "internal_error" | "server_error" | "service_unavailable" => Self::Unavailable,
            _ => return None,
        };
        Some(kind)
    }

    /// Maps an HTTP failure status to the most likely kind.
    pub fn from_http_status(status: u16) -> Self {
        match status {
            400 | 413 | 422 => Self::InvalidRequest,
            401 => Self::AuthRejected,
            402 => Self::InsufficientCredits,
            403 => Self::ContentRejected,
            404 | 410 => Self::NotFoundOrExpired,
            408 => Self::Unavailable,
            429 => Self::RateLimited,
            500..=599 => Self::Unavailable,
            405..=499 => Self::InvalidRequest,
            _ => Self::Unknown,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
