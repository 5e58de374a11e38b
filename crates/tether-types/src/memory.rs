//! Wire types for the remote memory store.
//!
//! The store exposes two operations: `record` (write an interaction) and
//! `context` (read back sections, entities and free text for a query).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::artifact::Artifact;

/// Write request for the `record` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecordRequest {
    pub user_id: String,
    pub session_id: String,
    pub query: String,
    pub response: String,
    #[serde(default)]
    pub artifacts: Vec<Artifact>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl MemoryRecordRequest {
    /// Build a request; artifacts get their chunk ids resolved.
    pub fn new(
        user_id: impl Into<String>,
        session_id: impl Into<String>,
        query: impl Into<String>,
        response: impl Into<String>,
        artifacts: Vec<Artifact>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: session_id.into(),
            query: query.into(),
            response: response.into(),
            artifacts: artifacts
                .into_iter()
                .map(Artifact::with_resolved_chunk_id)
                .collect(),
            metadata: Map::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Response of the `record` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecordResponse {
    pub success: bool,
    pub stored_artifacts: u64,
    pub memories_created: u64,
    pub memory_stats: Value,
}

/// Read request for the `context` operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRequest {
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub query: String,
    pub limit: usize,
    pub include_graph: bool,
    pub include_entities: bool,
    pub include_memories: bool,
    pub include_search_hits: bool,
}

impl ContextRequest {
    /// Request everything the enhancer can use.
    pub fn new(user_id: impl Into<String>, query: impl Into<String>, limit: usize) -> Self {
        Self {
            user_id: user_id.into(),
            session_id: None,
            query: query.into(),
            limit,
            include_graph: true,
            include_entities: true,
            include_memories: true,
            include_search_hits: true,
        }
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// Counts reported alongside a context response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextStats {
    #[serde(alias = "total_memories", alias = "memories_found")]
    pub memories: u64,
    #[serde(alias = "total_entities")]
    pub entities: u64,
    pub search_hits: u64,
}

impl ContextStats {
    /// Whether the store reported nothing at all (typically still indexing).
    pub fn is_empty(&self) -> bool {
        self.memories == 0 && self.entities == 0 && self.search_hits == 0
    }
}

/// Response of the `context` operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryContextResponse {
    pub stats: ContextStats,
    pub sections: Vec<Section>,
    pub entities: Vec<Entity>,
    #[serde(alias = "context")]
    pub context_text: String,
}

/// A titled group of labelled fact lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub title: String,
    #[serde(default)]
    pub items: Vec<SectionItem>,
}

impl Section {
    /// Create an empty section.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    /// Append an item.
    pub fn push(&mut self, label: impl Into<String>, values: Vec<String>) {
        self.items.push(SectionItem {
            label: label.into(),
            values,
        });
    }

    /// Case-insensitive title comparison.
    pub fn has_title(&self, title: &str) -> bool {
        self.title.trim().eq_ignore_ascii_case(title.trim())
    }
}

/// One labelled entry in a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SectionItem {
    pub label: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// A historical fact extracted by the remote store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// May be empty when the store only puts the name in `properties`.
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "type", alias = "entity_type", skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Entity {
    /// Create an entity with no properties.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Set a property (builder style).
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    /// A property rendered as text. Null and blank values count as absent.
    pub fn property(&self, key: &str) -> Option<String> {
        match self.properties.get(key)? {
            Value::Null => None,
            Value::String(s) if s.trim().is_empty() => None,
            Value::String(s) => Some(s.trim().to_string()),
            Value::Bool(b) => Some(b.to_string()),
            Value::Number(n) => Some(n.to_string()),
            other => Some(other.to_string()),
        }
    }

    /// Display name: the top-level `name`, else `properties.name`.
    pub fn display_name(&self) -> String {
        let name = self.name.trim();
        if !name.is_empty() {
            return name.to_string();
        }
        self.property("name").unwrap_or_default()
    }

    /// A property compared case-insensitively.
    pub fn property_is(&self, key: &str, expected: &str) -> bool {
        self.property(key)
            .is_some_and(|v| v.eq_ignore_ascii_case(expected))
    }

    pub fn status(&self) -> Option<String> {
        self.property("status")
    }

    pub fn outcome(&self) -> Option<String> {
        self.property("outcome")
    }

    pub fn test_status(&self) -> Option<String> {
        self.property("test_status")
    }
}
