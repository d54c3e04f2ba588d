use super::{HttpRequest, HttpResponse, Transport, TransportError};
use crate::encoding::PartContent;
use crate::registry::HttpMethod;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Proxy;
use std::env;
use std::time::Duration;

/// Default [`Transport`] backed by a pooled `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// `STABILITY_HTTP_POOL_MAX_IDLE_PER_HOST` tunes the idle pool (default 16).
    pub fn new(timeout: Duration, proxy_url: Option<&str>) -> Result<Self, TransportError> {
        let mut builder = reqwest::Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(
                env::var("STABILITY_HTTP_POOL_MAX_IDLE_PER_HOST")
                    .ok()
                    .and_then(|s| s.parse::<usize>().ok())
                    .unwrap_or(16),
            )
            .pool_idle_timeout(Some(Duration::from_secs(90)));

        if let Some(url) = proxy_url.filter(|u| !u.trim().is_empty()) {
            let proxy = Proxy::all(url)
                .map_err(|e| TransportError::Other(format!("invalid proxy url: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        let client = builder.build()?;
        Ok(Self { client })
    }

    fn build_form(parts: &[crate::encoding::FormPart]) -> Result<Form, TransportError> {
        let mut form = Form::new();
        for part in parts {
            form = match &part.content {
                PartContent::Text(value) => form.text(part.name.clone(), value.clone()),
                PartContent::Binary {
                    bytes,
                    media_type,
                    file_name,
                } => {
                    let len = bytes.len() as u64;
                    let p = Part::stream_with_length(bytes.clone(), len)
                        .file_name(file_name.clone())
                        .mime_str(media_type)?;
                    form.part(part.name.clone(), p)
                }
            };
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut req = match request.method {
            HttpMethod::Post => self.client.post(&request.url),
            HttpMethod::Get => self.client.get(&request.url),
        };
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        // the form is rebuilt per attempt; parts share the attachment buffers
        if let Some(parts) = &request.form {
            req = req.multipart(Self::build_form(parts)?);
        }

        let resp = req.send().await?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp.bytes().await?;
        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}
