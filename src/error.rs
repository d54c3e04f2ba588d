use crate::error_code::ErrorKind;
use crate::registry::RegistryError;
use crate::transport::TransportError;
use crate::validation::{Constraint, ValidationError};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "builder.base_url", "descriptor.params[3]")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected shape, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "client_builder", "result_decoder")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// A classified failure reported by (or on behalf of) the remote service.
///
/// Produced by submission and polling alike; see
/// [`crate::client::error_classification`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ApiError {
    pub kind: ErrorKind,
    /// HTTP status, absent for failures where no response arrived.
    pub status: Option<u16>,
    pub message: String,
    pub retryable: bool,
    /// Provider-suggested delay before trying again (`Retry-After`).
    pub retry_after: Option<Duration>,
    /// Provider error `name` from the JSON error body, when present.
    pub provider_name: Option<String>,
    /// Upstream request id echoed in response headers, when present.
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
            retryable: kind.retryable(),
            retry_after: None,
            provider_name: None,
            request_id: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_retry_after(mut self, delay: Option<Duration>) -> Self {
        self.retry_after = delay;
        self
    }

    pub fn with_provider_name(mut self, name: Option<String>) -> Self {
        self.provider_name = name;
        self
    }

    pub fn with_request_id(mut self, id: Option<String>) -> Self {
        self.request_id = id;
        self
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{} (HTTP {}): {}", self.kind, status, self.message)?,
            None => write!(f, "{}: {}", self.kind, self.message)?,
        }
        if let Some(ref name) = self.provider_name {
            write!(f, " [{}]", name)?;
        }
        Ok(())
    }
}

/// Unified error type for the generation engine.
///
/// Every variant projects onto the closed taxonomy through [`Error::kind`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("Validation failed: {}", format_violations(.0))]
    ValidationFailed(Vec<ValidationError>),

    #[error("Unknown endpoint: {0}")]
    UnknownEndpoint(String),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Descriptor registry error: {0}")]
    Registry(#[from] RegistryError),

    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Runtime error: {message}{}", format_context(.context))]
    Runtime {
        message: String,
        context: ErrorContext,
    },

    #[error("Network transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

fn format_violations(violations: &[ValidationError]) -> String {
    violations
        .iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl Error {
    /// Create a new runtime error with structured context
    pub fn runtime_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Runtime {
            message: msg.into(),
            context,
        }
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn runtime(msg: impl Into<String>) -> Self {
        Self::runtime_with_context(msg, ErrorContext::new())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::Runtime { context, .. } => Some(context),
            _ => None,
        }
    }

    /// Project this error onto the closed taxonomy.
    ///
    /// A validation failure that includes an undeclared field reports
    /// [`ErrorKind::UnknownField`]; the full violation list stays available
    /// through [`Error::violations`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::ValidationFailed(violations) => {
                if violations
                    .iter()
                    .any(|v| matches!(v.constraint, Constraint::UnknownField))
                {
                    ErrorKind::UnknownField
                } else {
                    ErrorKind::ValidationFailed
                }
            }
            Error::UnknownEndpoint(_) => ErrorKind::UnknownEndpoint,
            Error::Api(api) => api.kind,
            Error::Transport(_) => ErrorKind::Unavailable,
            Error::Registry(_)
            | Error::Configuration { .. }
            | Error::Runtime { .. }
            | Error::Io(_)
            | Error::Serialization(_) => ErrorKind::Unknown,
        }
    }

    /// Whether trying again later (unchanged) may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api(api) => api.retryable,
            Error::Transport(_) => true,
            _ => false,
        }
    }

    /// Validation violations, empty for every other variant.
    pub fn violations(&self) -> &[ValidationError] {
        match self {
            Error::ValidationFailed(v) => v,
            _ => &[],
        }
    }

    /// The classified API error, if this failure came from the remote side.
    pub fn api(&self) -> Option<&ApiError> {
        match self {
            Error::Api(api) => Some(api),
            _ => None,
        }
    }
}
