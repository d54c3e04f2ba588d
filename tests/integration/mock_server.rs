//! Mock HTTP server setup for integration tests

use mockito::{Matcher, Mock, Server, ServerGuard};
use stability_rs::client::PollPolicy;
use stability_rs::{ResponseEncoding, StabilityClient};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

pub const API_KEY: &str = "sk-mock";

/// Test fixture that manages a mock server
pub struct MockServerFixture {
    pub server: Arc<Mutex<ServerGuard>>,
    pub base_url: String,
}

impl MockServerFixture {
    pub async fn new() -> Self {
        let server = Server::new_async().await;
        let base_url = server.url();
        Self {
            server: Arc::new(Mutex::new(server)),
            base_url,
        }
    }

    /// Create a test client with the mock server as base URL
    pub fn create_test_client(&self) -> stability_rs::Result<StabilityClient> {
        self.create_client_with(ResponseEncoding::Raw)
    }

    pub fn create_client_with(
        &self,
        encoding: ResponseEncoding,
    ) -> stability_rs::Result<StabilityClient> {
        StabilityClient::builder()
            .api_key(API_KEY)
            .base_url_override(&self.base_url)
            .client_id("mock-suite")
            .client_version("0.0.1")
            .response_encoding(encoding)
            .network_retries(0)
            .poll_policy(
                PollPolicy::default()
                    .with_base_delay(Duration::from_millis(10))
                    .with_max_delay(Duration::from_millis(50))
                    .with_jitter(0.0),
            )
            .build()
    }

    /// Create a mock for a successful raw artifact response
    pub async fn mock_artifact(&self, path: &str, content_type: &str, body: &[u8]) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .match_header("authorization", format!("Bearer {}", API_KEY).as_str())
            .with_status(200)
            .with_header("content-type", content_type)
            .with_header("seed", "314")
            .with_header("finish-reason", "SUCCESS")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for a JSON response
    pub async fn mock_json_response(
        &self,
        method: &str,
        path: &str,
        status: usize,
        body: &str,
    ) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock(method, path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await
    }

    /// Create a mock for an error response, expected exactly once
    pub async fn mock_error_response(&self, path: &str, status: usize, error_body: &str) -> Mock {
        let mut server = self.server.lock().await;
        server
            .mock("POST", path)
            .with_status(status)
            .with_header("content-type", "application/json")
            .with_body(error_body)
            .expect(1)
            .create_async()
            .await
    }

    /// Create a mock that only matches a multipart body containing every `fragment`
    pub async fn mock_multipart(&self, path: &str, fragments: &[&str], body: &[u8]) -> Mock {
        let mut server = self.server.lock().await;
        let matchers = fragments
            .iter()
            .map(|f| Matcher::Regex(regex_escape(f)))
            .collect();
        server
            .mock("POST", path)
            .match_header(
                "content-type",
                Matcher::Regex("^multipart/form-data; boundary=".to_string()),
            )
            .match_body(Matcher::AllOf(matchers))
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(body)
            .create_async()
            .await
    }
}

fn regex_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if "\\.+*?()|[]{}^$".contains(c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
