//! Hook event payloads and the intake discovery record.
//!
//! The host emits three lifecycle events per interaction. Field names follow
//! the host's hook payloads so that the dispatcher can forward stdin verbatim.

use serde::{Deserialize, Serialize};

use crate::{Artifact, Timestamp};

/// The kind of lifecycle event received from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HookKind {
    /// A prompt was submitted.
    Before,
    /// A response was produced.
    After,
    /// An intermediate reasoning event.
    Thought,
}

impl HookKind {
    /// All hook kinds, in lifecycle order.
    pub const ALL: [HookKind; 3] = [HookKind::Before, HookKind::After, HookKind::Thought];

    /// Path segment used by the intake surface (`/hook/<segment>`).
    pub fn as_str(&self) -> &'static str {
        match self {
            HookKind::Before => "before",
            HookKind::After => "after",
            HookKind::Thought => "thought",
        }
    }
}

impl std::fmt::Display for HookKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for HookKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "before" => Ok(HookKind::Before),
            "after" => Ok(HookKind::After),
            "thought" => Ok(HookKind::Thought),
            other => Err(format!("unknown hook kind: {other}")),
        }
    }
}

/// Body of `POST /hook/before`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeforeEvent {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// Body of `POST /hook/after`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AfterEvent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
    /// Work product the host attached to the response, if any.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,
}

/// Body of `POST /hook/thought`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThoughtEvent {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generation_id: Option<String>,
}

/// Normalize an optional correlation key: blank strings count as absent.
pub fn correlation_key(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Record published to the discovery file so the dispatcher can find the
/// running intake surface.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryInfo {
    pub port: u16,
    pub token: String,
    pub updated_at: Timestamp,
}

// Hand-written so the token never ends up in logs.
impl std::fmt::Debug for DiscoveryInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiscoveryInfo")
            .field("port", &self.port)
            .field("token", &"<redacted>")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hook_kind_round_trips_through_str() {
        for kind in HookKind::ALL {
            assert_eq!(kind.as_str().parse::<HookKind>().unwrap(), kind);
        }
        assert_eq!("AFTER".parse::<HookKind>().unwrap(), HookKind::After);
        assert!("stop".parse::<HookKind>().is_err());
    }

    #[test]
    fn test_before_event_optional_fields() {
        let event: BeforeEvent = serde_json::from_str(r#"{"prompt":"hi"}"#).unwrap();
        assert_eq!(event.prompt, "hi");
        assert!(event.conversation_id.is_none());
        assert!(event.generation_id.is_none());
        assert!(event.model.is_none());
    }

    #[test]
    fn test_correlation_key_treats_blank_as_absent() {
        assert_eq!(correlation_key(Some("  ")), None);
        assert_eq!(correlation_key(None), None);
        assert_eq!(correlation_key(Some(" gen-1 ")), Some("gen-1"));
    }

    #[test]
    fn test_discovery_info_uses_camel_case() {
        let info = DiscoveryInfo {
            port: 4312,
            token: "secret".to_string(),
            updated_at: crate::now(),
        };
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["port"], 4312);
        assert!(json.get("updatedAt").is_some());
    }

    #[test]
    fn test_discovery_info_debug_redacts_token() {
        let info = DiscoveryInfo {
            port: 1,
            token: "super-secret-token".to_string(),
            updated_at: crate::now(),
        };
        let debug = format!("{:?}", info);
        assert!(!debug.contains("super-secret-token"));
        assert!(debug.contains("<redacted>"));
    }
}
