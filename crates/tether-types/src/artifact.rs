//! Artifacts attached to an interaction (files touched, fixes applied, ...).

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Prefix for derived chunk identifiers.
pub const CHUNK_ID_PREFIX: &str = "chunk_";

/// Number of digest bytes kept in a chunk identifier (24 base64 chars).
const CHUNK_DIGEST_BYTES: usize = 18;

/// Outcome status of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    Success,
    Failed,
    #[default]
    Draft,
}

/// A piece of work product associated with an interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub status: ArtifactStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_id: Option<String>,
}

impl Artifact {
    /// Create a draft artifact with only an identifier.
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            path: None,
            language: None,
            summary: None,
            status: ArtifactStatus::Draft,
            outcome: None,
            tags: Vec::new(),
            test_status: None,
            diff: None,
            chunk_id: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_status(mut self, status: ArtifactStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_outcome(mut self, outcome: impl Into<String>) -> Self {
        self.outcome = Some(outcome.into());
        self
    }

    /// The explicit chunk id, or the one derived from identifier and path.
    pub fn effective_chunk_id(&self) -> String {
        match &self.chunk_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => chunk_id(&self.identifier, self.path.as_deref()),
        }
    }

    /// Fill in `chunk_id` if absent.
    pub fn with_resolved_chunk_id(mut self) -> Self {
        self.chunk_id = Some(self.effective_chunk_id());
        self
    }
}

/// Derive a stable chunk identifier from an artifact identifier and path.
///
/// `chunk_` followed by the URL-safe, unpadded base64 encoding of the first
/// 18 bytes of `SHA-256(identifier || 0x00 || path)`, where a missing path
/// hashes as the empty string. The separator byte keeps `("ab", "c")` and
/// `("a", "bc")` distinct.
pub fn chunk_id(identifier: &str, path: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(identifier.as_bytes());
    hasher.update([0u8]);
    hasher.update(path.unwrap_or_default().as_bytes());
    let digest = hasher.finalize();
    format!(
        "{}{}",
        CHUNK_ID_PREFIX,
        URL_SAFE_NO_PAD.encode(&digest[..CHUNK_DIGEST_BYTES])
    )
}
