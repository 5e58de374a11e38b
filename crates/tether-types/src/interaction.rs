//! Interaction types produced by correlating before/after events.

use serde::{Deserialize, Serialize};

use crate::artifact::Artifact;
use crate::{Timestamp, now};

/// A submitted prompt waiting for its response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingInteraction {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub created_at: Timestamp,
}

impl PendingInteraction {
    /// Create a pending interaction stamped with the current time.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            conversation_key: None,
            generation_key: None,
            model: None,
            created_at: now(),
        }
    }

    pub fn with_conversation_key(mut self, key: impl Into<String>) -> Self {
        self.conversation_key = Some(key.into());
        self
    }

    pub fn with_generation_key(mut self, key: impl Into<String>) -> Self {
        self.generation_key = Some(key.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Pair this pending prompt with its response.
    pub fn complete(self, response: impl Into<String>) -> CorrelatedInteraction {
        CorrelatedInteraction {
            query: self.query,
            response: response.into(),
            artifacts: Vec::new(),
            model: self.model,
            started_at: Some(self.created_at),
        }
    }
}

/// A fully correlated (query, response) pair ready for synchronization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelatedInteraction {
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// When the originating before event was recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<Timestamp>,
}

impl CorrelatedInteraction {
    /// Create an interaction with no artifacts.
    pub fn new(query: impl Into<String>, response: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            response: response.into(),
            artifacts: Vec::new(),
            model: None,
            started_at: None,
        }
    }

    /// Attach an artifact.
    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn with_artifacts(mut self, artifacts: impl IntoIterator<Item = Artifact>) -> Self {
        self.artifacts.extend(artifacts);
        self
    }
}
