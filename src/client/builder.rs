use crate::client::clock::{Clock, SystemClock};
use crate::client::core::StabilityClient;
use crate::client::policy::PollPolicy;
use crate::encoding::{ClientIdentity, ResponseEncoding};
use crate::registry::Registry;
use crate::transport::{ReqwestTransport, Transport};
use crate::types::Credential;
use crate::{Error, ErrorContext, Result};
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://api.stability.ai";
pub const DEFAULT_RESULTS_PATH: &str = "/v2beta/results";

/// Builder for [`StabilityClient`].
///
/// Explicit setters win; otherwise these environment variables are read:
/// - `STABILITY_API_KEY` (required)
/// - `STABILITY_BASE_URL` (default `https://api.stability.ai`)
/// - `STABILITY_CLIENT_ID`, `STABILITY_CLIENT_USER_ID`, `STABILITY_CLIENT_VERSION`
/// - `STABILITY_HTTP_TIMEOUT_SECS` (default 60), `STABILITY_PROXY_URL`
/// - `STABILITY_NETWORK_RETRIES` (default 2)
pub struct StabilityClientBuilder {
    api_key: Option<String>,
    /// Override base URL (primarily for testing with mock servers)
    base_url_override: Option<String>,
    results_path: Option<String>,
    identity: ClientIdentity,
    response_encoding: ResponseEncoding,
    poll_policy: PollPolicy,
    network_retries: Option<u32>,
    http_timeout: Option<Duration>,
    proxy_url: Option<String>,
    transport: Option<Arc<dyn Transport>>,
    clock: Option<Arc<dyn Clock>>,
    registry: Option<Registry>,
}

fn env_nonempty(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn config_error(msg: impl Into<String>, field: &str) -> Error {
    Error::configuration_with_context(
        msg,
        ErrorContext::new()
            .with_field_path(field)
            .with_source("client_builder"),
    )
}

/// Parses an optional setting read from `var`; unparsable text is an error.
fn parse_setting<T: std::str::FromStr>(
    var: &str,
    raw: Option<String>,
    field: &str,
    expected: &str,
) -> Result<Option<T>> {
    match raw {
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            config_error(
                format!("{} must be {}, got '{}'", var, expected, raw),
                field,
            )
        }),
        None => Ok(None),
    }
}

impl StabilityClientBuilder {
    pub fn new() -> Self {
        Self {
            api_key: None,
            base_url_override: None,
            results_path: None,
            identity: ClientIdentity::default(),
            response_encoding: ResponseEncoding::Raw,
            poll_policy: PollPolicy::default(),
            network_retries: None,
            http_timeout: None,
            proxy_url: None,
            transport: None,
            clock: None,
            registry: None,
        }
    }

    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Override the provider base URL.
    ///
    /// Primarily for testing with mock servers.
    pub fn base_url_override(mut self, base_url: impl Into<String>) -> Self {
        self.base_url_override = Some(base_url.into());
        self
    }

    /// Path prefix for async result lookups (`{results_path}/{id}`).
    pub fn results_path(mut self, path: impl Into<String>) -> Self {
        self.results_path = Some(path.into());
        self
    }

    pub fn client_id(mut self, id: impl Into<String>) -> Self {
        self.identity.client_id = Some(id.into());
        self
    }

    pub fn client_user_id(mut self, id: impl Into<String>) -> Self {
        self.identity.user_id = Some(id.into());
        self
    }

    pub fn client_version(mut self, version: impl Into<String>) -> Self {
        self.identity.version = Some(version.into());
        self
    }

    pub fn response_encoding(mut self, encoding: ResponseEncoding) -> Self {
        self.response_encoding = encoding;
        self
    }

    pub fn poll_policy(mut self, policy: PollPolicy) -> Self {
        self.poll_policy = policy;
        self
    }

    /// Retries for submissions that got no response at all.
    pub fn network_retries(mut self, n: u32) -> Self {
        self.network_retries = Some(n);
        self
    }

    pub fn http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = Some(timeout);
        self
    }

    pub fn proxy_url(mut self, url: impl Into<String>) -> Self {
        self.proxy_url = Some(url.into());
        self
    }

    /// Replace the reqwest transport (tests, custom stacks).
    pub fn with_transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Use a custom descriptor registry instead of the built-in catalog.
    pub fn with_registry(mut self, registry: Registry) -> Self {
        self.registry = Some(registry);
        self
    }

    fn resolve_base_url(&self) -> Result<String> {
        let raw = self
            .base_url_override
            .clone()
            .or_else(|| env_nonempty("STABILITY_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let parsed = url::Url::parse(&raw)
            .map_err(|e| config_error(format!("invalid base URL '{}': {}", raw, e), "builder.base_url"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(config_error(
                format!("base URL must be http(s), got '{}'", parsed.scheme()),
                "builder.base_url",
            ));
        }
        Ok(raw.trim_end_matches('/').to_string())
    }

    /// Build the client.
    pub fn build(self) -> Result<StabilityClient> {
        let api_key = self
            .api_key
            .clone()
            .or_else(|| env_nonempty("STABILITY_API_KEY"))
            .ok_or_else(|| {
                config_error(
                    "missing API key (set STABILITY_API_KEY or call api_key())",
                    "builder.api_key",
                )
            })?;
        let credential = Credential::new(api_key);
        if credential.is_empty() {
            return Err(config_error("API key is blank", "builder.api_key"));
        }

        let base_url = self.resolve_base_url()?;
        self.poll_policy.validate()?;

        let results_path = self
            .results_path
            .clone()
            .unwrap_or_else(|| DEFAULT_RESULTS_PATH.to_string());
        if !results_path.starts_with('/') {
            return Err(config_error(
                format!("results path must start with '/', got '{}'", results_path),
                "builder.results_path",
            ));
        }
        let results_path = results_path.trim_end_matches('/').to_string();

        let network_retries = match self.network_retries {
            Some(n) => n,
            None => parse_setting(
                "STABILITY_NETWORK_RETRIES",
                env_nonempty("STABILITY_NETWORK_RETRIES"),
                "builder.network_retries",
                "a non-negative integer",
            )?
            .unwrap_or(2),
        };

        let identity = ClientIdentity {
            client_id: self
                .identity
                .client_id
                .or_else(|| env_nonempty("STABILITY_CLIENT_ID")),
            user_id: self
                .identity
                .user_id
                .or_else(|| env_nonempty("STABILITY_CLIENT_USER_ID")),
            version: self
                .identity
                .version
                .or_else(|| env_nonempty("STABILITY_CLIENT_VERSION")),
        };

        let transport: Arc<dyn Transport> = match self.transport {
            Some(t) => t,
            None => {
                let timeout = match self.http_timeout {
                    Some(t) => t,
                    None => {
                        let secs = parse_setting::<u64>(
                            "STABILITY_HTTP_TIMEOUT_SECS",
                            env_nonempty("STABILITY_HTTP_TIMEOUT_SECS"),
                            "builder.http_timeout",
                            "a positive number of seconds",
                        )?
                        .unwrap_or(60);
                        if secs == 0 {
                            return Err(config_error(
                                "STABILITY_HTTP_TIMEOUT_SECS must be a positive number of seconds, got '0'",
                                "builder.http_timeout",
                            ));
                        }
                        Duration::from_secs(secs)
                    }
                };
                let proxy = self.proxy_url.or_else(|| env_nonempty("STABILITY_PROXY_URL"));
                Arc::new(ReqwestTransport::new(timeout, proxy.as_deref())?)
            }
        };

        let registry = self
            .registry
            .unwrap_or_else(|| Registry::builtin().clone());

        Ok(StabilityClient {
            registry: Arc::new(registry),
            transport,
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
            credential,
            base_url,
            results_path,
            identity,
            response_encoding: self.response_encoding,
            poll_policy: self.poll_policy,
            network_retries,
        })
    }
}

impl Default for StabilityClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
