//! CLI command handlers.

pub mod clear_cache;
pub mod context;
pub mod hook;
pub mod serve;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tether_cache::{CacheConfig, ContextCache};
use tether_client::{MemoryClient, SharedMemoryStore};
use tether_config::{LoadedConfig, TetherConfig, paths};
use tether_sync::{HostContext, RetryPolicy, Sequencer, SequencerConfig};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// Workspace override; the current directory otherwise.
    pub project_dir: Option<PathBuf>,
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
}

impl Context {
    /// Load layered configuration, printing load warnings to stderr.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = tether_config::load_config_with_options(
            self.project_dir.as_deref(),
            self.config_dir.as_deref(),
        )?;

        for warning in &loaded.warnings {
            eprintln!("warning: {}", warning);
        }
        if self.verbose {
            let sources = loaded.loaded_from();
            if sources.is_empty() {
                eprintln!("No config files found, using defaults");
            } else {
                for source in sources {
                    eprintln!("Loaded config: {}", source.display());
                }
            }
        }
        Ok(loaded)
    }

    /// The workspace context is published for.
    pub fn host_context(&self) -> Result<HostContext> {
        let root = match &self.project_dir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("cannot determine current directory")?,
        };
        Ok(HostContext::new(root))
    }

    pub fn discovery_path(&self) -> Result<PathBuf> {
        match &self.config_dir {
            Some(dir) => Ok(dir.join(paths::DISCOVERY_FILE)),
            None => Ok(tether_config::discovery_file_path()?),
        }
    }

    pub fn log_dir(&self) -> PathBuf {
        match &self.config_dir {
            Some(dir) => dir.join(paths::LOG_DIR),
            None => tether_config::log_dir(),
        }
    }
}

/// HTTP client for the configured memory store.
pub fn memory_store(config: &TetherConfig) -> Result<SharedMemoryStore> {
    let memory = config.memory();
    let client = MemoryClient::builder()
        .base_url(&memory.base_url)
        .maybe_api_key(memory.api_key.clone())
        .timeout(memory.timeout())
        .build()
        .with_context(|| format!("invalid memory store settings ({})", memory.base_url))?;
    Ok(Arc::new(client))
}

/// Sequencer wired from the `[memory]`, `[sync]` and `[cache]` sections.
pub fn sequencer(config: &TetherConfig, store: SharedMemoryStore) -> Sequencer {
    let memory = config.memory();
    let sync = config.sync();
    let cache = config.cache();

    let cache = ContextCache::new(
        CacheConfig::new()
            .with_ttl(cache.ttl())
            .with_prefix_len(cache.prefix_len),
    );
    let sequencer_config = SequencerConfig::new(memory.user_id)
        .with_context_limit(memory.context_limit)
        .with_settle_delay(sync.settle_delay())
        .with_retry(RetryPolicy::new(
            sync.read_retry_attempts,
            sync.read_retry_backoff(),
        ))
        .with_artifact_path(sync.artifact_path);

    Sequencer::new(store, cache, sequencer_config)
}
