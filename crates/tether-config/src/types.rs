//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [memory]   # remote memory store connection
//! [sync]     # synchronization sequencer timing and artifact location
//! [cache]    # local context cache
//! [server]   # event intake surface
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Defaults
// ─────────────────────────────────────────────────────────────────────────────

pub mod defaults {
    pub const MEMORY_BASE_URL: &str = "http://127.0.0.1:8000";
    pub const MEMORY_TIMEOUT_SECS: u64 = 30;
    pub const CONTEXT_LIMIT: usize = 20;
    pub const SETTLE_DELAY_MS: u64 = 2_000;
    pub const READ_RETRY_ATTEMPTS: u32 = 3;
    pub const READ_RETRY_BACKOFF_MS: u64 = 1_500;
    pub const ARTIFACT_PATH: &str = ".tether/memory-context.md";
    pub const CACHE_TTL_SECS: u64 = 30;
    pub const CACHE_PREFIX_LEN: usize = 50;
    pub const MAX_BODY_SIZE: usize = 1024 * 1024;
    pub const FALLBACK_USER_ID: &str = "default";
}

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (project-local
/// overrides) can be loaded and merged section by section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TetherConfig {
    pub memory: Option<MemoryConfig>,
    pub sync: Option<SyncConfig>,
    pub cache: Option<CacheSection>,
    pub server: Option<ServerSection>,
}

impl TetherConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: TetherConfig) {
        if other.memory.is_some() {
            self.memory = other.memory;
        }
        if other.sync.is_some() {
            self.sync = other.sync;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
        if other.server.is_some() {
            self.server = other.server;
        }
    }

    /// Memory store settings, falling back to defaults.
    pub fn memory(&self) -> MemoryConfig {
        self.memory.clone().unwrap_or_default()
    }

    /// Sequencer settings, falling back to defaults.
    pub fn sync(&self) -> SyncConfig {
        self.sync.clone().unwrap_or_default()
    }

    /// Cache settings, falling back to defaults.
    pub fn cache(&self) -> CacheSection {
        self.cache.clone().unwrap_or_default()
    }

    /// Intake server settings, falling back to defaults.
    pub fn server(&self) -> ServerSection {
        self.server.clone().unwrap_or_default()
    }

    /// Check values that parse fine but cannot work.
    pub fn validate(&self) -> Result<()> {
        let memory = self.memory();
        if memory.base_url.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "memory.base_url".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if memory.context_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "memory.context_limit".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sync().artifact_path.is_absolute() {
            return Err(ConfigError::InvalidValue {
                field: "sync.artifact_path".to_string(),
                reason: "must be relative to the host context".to_string(),
            });
        }
        if self.cache().prefix_len == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.prefix_len".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Sections
// ─────────────────────────────────────────────────────────────────────────────

/// Remote memory store connection (`[memory]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Base URL of the memory service.
    pub base_url: String,
    /// API key. Prefer `TETHER_API_KEY` over storing this in a file.
    pub api_key: Option<String>,
    /// User the interactions are recorded for.
    pub user_id: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Maximum number of facts requested per context read.
    pub context_limit: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::MEMORY_BASE_URL.to_string(),
            api_key: None,
            user_id: std::env::var("USER")
                .ok()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| defaults::FALLBACK_USER_ID.to_string()),
            timeout_secs: defaults::MEMORY_TIMEOUT_SECS,
            context_limit: defaults::CONTEXT_LIMIT,
        }
    }
}

impl MemoryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Whether the API key came from a file rather than the environment.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.is_empty())
    }
}

/// Synchronization sequencer settings (`[sync]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Wait after a successful write before reading context back.
    pub settle_delay_ms: u64,
    /// Context reads attempted while the store reports nothing indexed.
    pub read_retry_attempts: u32,
    /// Pause between those reads.
    pub read_retry_backoff_ms: u64,
    /// Proactive refresh interval; 0 disables it.
    pub refresh_interval_secs: u64,
    /// Output artifact location, relative to the host context.
    pub artifact_path: PathBuf,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            read_retry_attempts: defaults::READ_RETRY_ATTEMPTS,
            read_retry_backoff_ms: defaults::READ_RETRY_BACKOFF_MS,
            refresh_interval_secs: 0,
            artifact_path: PathBuf::from(defaults::ARTIFACT_PATH),
        }
    }
}

impl SyncConfig {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn read_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.read_retry_backoff_ms)
    }

    pub fn refresh_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

/// Local context cache settings (`[cache]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    pub ttl_secs: u64,
    /// Number of query characters that form the cache key.
    pub prefix_len: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            ttl_secs: defaults::CACHE_TTL_SECS,
            prefix_len: defaults::CACHE_PREFIX_LEN,
        }
    }
}

impl CacheSection {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

/// Event intake settings (`[server]`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub max_body_size: usize,
    pub request_logging: bool,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            max_body_size: defaults::MAX_BODY_SIZE,
            request_logging: true,
        }
    }
}
