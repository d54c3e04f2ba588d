//! Async job handles.

use super::credential::CredentialFingerprint;
use super::result::GenerationResult;
use crate::registry::ArtifactKind;
use std::time::{Duration, Instant};

/// How long the provider keeps an async result resolvable.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Length of a provider generation id.
pub const GENERATION_ID_LEN: usize = 64;

/// Handle for a pending async generation.
#[derive(Debug, Clone, PartialEq)]
pub struct AsyncJob {
    id: String,
    endpoint_id: String,
    created_at: Instant,
    owner: CredentialFingerprint,
    artifact: ArtifactKind,
    output_format: Option<String>,
}

impl AsyncJob {
    pub(crate) fn new(
        id: String,
        endpoint_id: String,
        created_at: Instant,
        owner: CredentialFingerprint,
        artifact: ArtifactKind,
        output_format: Option<String>,
    ) -> Self {
        Self {
            id,
            endpoint_id,
            created_at,
            owner,
            artifact,
            output_format,
        }
    }

    /// Provider ids are 64 ASCII alphanumerics.
    pub fn is_valid_id(id: &str) -> bool {
        id.len() == GENERATION_ID_LEN && id.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn endpoint_id(&self) -> &str {
        &self.endpoint_id
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn owner(&self) -> CredentialFingerprint {
        self.owner
    }

    pub fn artifact(&self) -> ArtifactKind {
        self.artifact
    }

    pub fn output_format(&self) -> Option<&str> {
        self.output_format.as_deref()
    }

    pub fn expires_at(&self) -> Instant {
        self.created_at + RETENTION_WINDOW
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at()
    }
}

/// Outcome of a single submission.
#[derive(Debug, Clone)]
pub enum Submission {
    /// Sync endpoints: the artifact arrived with the response.
    Complete(GenerationResult),
    /// Async endpoints: poll the job for the artifact.
    Pending(AsyncJob),
}

impl Submission {
    pub fn into_result(self) -> Option<GenerationResult> {
        match self {
            Submission::Complete(r) => Some(r),
            Submission::Pending(_) => None,
        }
    }

    pub fn job(&self) -> Option<&AsyncJob> {
        match self {
            Submission::Pending(j) => Some(j),
            Submission::Complete(_) => None,
        }
    }
}

/// Outcome of one result fetch.
#[derive(Debug, Clone)]
pub enum JobStatus {
    /// 202: still running.
    Running,
    Complete(GenerationResult),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_format() {
        assert!(AsyncJob::is_valid_id(&"a1".repeat(32)));
        assert!(!AsyncJob::is_valid_id("short"));
        assert!(!AsyncJob::is_valid_id(&format!("{}-", "a".repeat(63))));
    }

    #[test]
    fn retention() {
        let now = Instant::now();
        let job = AsyncJob::new(
            "a".repeat(64),
            "text-to-audio".into(),
            now,
            CredentialFingerprint::of("k"),
            ArtifactKind::Audio,
            Some("mp3".into()),
        );
        assert!(!job.is_expired(now + Duration::from_secs(3600)));
        assert!(job.is_expired(now + RETENTION_WINDOW));
    }
}
