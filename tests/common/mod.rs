//! Shared helpers: a scripted in-process transport and client constructors.
#![allow(dead_code)]

use async_trait::async_trait;
use stability_rs::client::{CancelHandle, ManualClock, PollPolicy};
use stability_rs::transport::{HttpRequest, HttpResponse, Transport, TransportError};
use stability_rs::StabilityClient;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub enum Step {
    Respond(HttpResponse),
    /// No response at all (connection reset, DNS failure, ...).
    Fail(&'static str),
    /// Fires the handle while the request is in flight, then responds.
    CancelThenRespond(CancelHandle, HttpResponse),
    /// Responds only after a tokio sleep (a stalled upstream).
    RespondAfter(Duration, HttpResponse),
}

/// Replays a fixed script of responses and records every request.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Step>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub fn new(steps: Vec<Step>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(steps.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        let step = self.script.lock().unwrap().pop_front();
        match step {
            Some(Step::Respond(resp)) => Ok(resp),
            Some(Step::Fail(msg)) => Err(TransportError::Other(msg.to_string())),
            Some(Step::CancelThenRespond(handle, resp)) => {
                handle.cancel();
                tokio::task::yield_now().await;
                Ok(resp)
            }
            Some(Step::RespondAfter(delay, resp)) => {
                tokio::time::sleep(delay).await;
                Ok(resp)
            }
            None => Err(TransportError::Other("script exhausted".to_string())),
        }
    }
}

pub fn pending() -> Step {
    Step::Respond(HttpResponse::new(202, r#"{"id":"","status":"in-progress"}"#))
}

pub fn accepted(id: &str) -> Step {
    Step::Respond(
        HttpResponse::new(202, format!(r#"{{"id":"{}"}}"#, id))
            .with_header("content-type", "application/json"),
    )
}

pub fn audio_done(bytes: &[u8]) -> Step {
    Step::Respond(
        HttpResponse::new(200, bytes.to_vec())
            .with_header("content-type", "audio/mpeg")
            .with_header("seed", "7")
            .with_header("finish-reason", "SUCCESS"),
    )
}

pub fn status(code: u16, body: &str) -> Step {
    Step::Respond(HttpResponse::new(code, body.to_string()).with_header("content-type", "application/json"))
}

pub fn generation_id(c: char) -> String {
    std::iter::repeat(c).take(64).collect()
}

/// Deterministic policy: 1s, 2s, 4s, ... capped at 8s, no jitter.
pub fn flat_policy() -> PollPolicy {
    PollPolicy::default()
        .with_base_delay(Duration::from_secs(1))
        .with_multiplier(2.0)
        .with_max_delay(Duration::from_secs(8))
        .with_jitter(0.0)
        .with_max_transient_failures(3)
}

pub fn client(transport: Arc<ScriptedTransport>, clock: Arc<ManualClock>) -> StabilityClient {
    client_with_key(transport, clock, "sk-test")
}

pub fn client_with_key(
    transport: Arc<ScriptedTransport>,
    clock: Arc<ManualClock>,
    key: &str,
) -> StabilityClient {
    StabilityClient::builder()
        .api_key(key)
        .base_url_override("https://api.example.test")
        .poll_policy(flat_policy())
        .network_retries(2)
        .with_transport(transport)
        .with_clock(clock)
        .build()
        .expect("client")
}
