use bytes::Bytes;
use std::fmt;

/// Provider verdict echoed alongside an artifact (`finish-reason`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Success,
    ContentFiltered,
    Other(String),
}

impl FinishReason {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => FinishReason::Success,
            "CONTENT_FILTERED" => FinishReason::ContentFiltered,
            other => FinishReason::Other(other.to_string()),
        }
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FinishReason::Success => f.write_str("SUCCESS"),
            FinishReason::ContentFiltered => f.write_str("CONTENT_FILTERED"),
            FinishReason::Other(s) => f.write_str(s),
        }
    }
}

/// A finished artifact, from either a sync response or a completed poll.
#[derive(Clone, PartialEq)]
pub struct GenerationResult {
    pub endpoint_id: String,
    pub artifact: Bytes,
    pub media_type: String,
    /// Seed echoed by the provider.
    pub seed: Option<u64>,
    pub finish_reason: Option<FinishReason>,
    /// Generation id for async jobs.
    pub generation_id: Option<String>,
    /// Upstream request id from response headers.
    pub request_id: Option<String>,
}

impl GenerationResult {
    /// Suggested file extension for the artifact's media type.
    pub fn file_extension(&self) -> &'static str {
        let essence = self
            .media_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        match essence {
            "image/png" => "png",
            "image/jpeg" | "image/jpg" => "jpeg",
            "image/webp" => "webp",
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "model/gltf-binary" => "glb",
            _ => "bin",
        }
    }

    pub fn is_filtered(&self) -> bool {
        self.finish_reason == Some(FinishReason::ContentFiltered)
    }
}

impl fmt::Debug for GenerationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationResult")
            .field("endpoint_id", &self.endpoint_id)
            .field("media_type", &self.media_type)
            .field("len", &self.artifact.len())
            .field("seed", &self.seed)
            .field("finish_reason", &self.finish_reason)
            .field("generation_id", &self.generation_id)
            .field("request_id", &self.request_id)
            .finish()
    }
}
