//! Locating and layering tether config files.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/tether/config.toml` (user config)
//! 2. `./tether.toml` (project-local)
//! 3. `TETHER_MEMORY_URL`, `TETHER_API_KEY`, `TETHER_USER_ID` env vars
//! 4. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, MemoryConfig, Result, TetherConfig};

/// File name looked up in the project directory.
const PROJECT_CONFIG_FILE: &str = "tether.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for config directory resolution.
const APP_NAME: &str = "tether";

/// Overrides the user config directory.
const CONFIG_DIR_ENV: &str = "TETHER_CONFIG_DIR";

pub const MEMORY_URL_ENV: &str = "TETHER_MEMORY_URL";
pub const API_KEY_ENV: &str = "TETHER_API_KEY";
pub const USER_ID_ENV: &str = "TETHER_USER_ID";

/// One config layer that was looked up.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Where the layer was looked for.
    pub path: PathBuf,
    /// Found and merged.
    pub loaded: bool,
}

/// Merged configuration plus how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// All layers merged, env overrides applied.
    pub config: TetherConfig,
    /// Layers checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Non-fatal problems: unreadable layers, plaintext keys.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of the layers that existed.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load the user and project layers, then apply env overrides.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// [`load_config`] with an explicit user config directory.
///
/// `config_dir` overrides both `TETHER_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = TetherConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    // 1. User layer
    let user_config = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    // 2. Project layer
    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    if config
        .memory
        .as_ref()
        .is_some_and(MemoryConfig::has_plaintext_api_key)
    {
        warnings.push(format!(
            "[memory] contains a plaintext api_key. Consider setting {} instead.",
            API_KEY_ENV
        ));
    }

    // 3. Environment
    apply_env_overrides(&mut config, |name| std::env::var(name).ok());

    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Parse one config file.
pub fn load_config_file(path: &Path) -> Result<TetherConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    TetherConfig::from_toml(&contents)
}

/// Get the user config file path.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// Get the user config directory for tether.
///
/// Checks `TETHER_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/tether` on Linux, `~/Library/Application Support/tether` on macOS).
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Apply environment overrides using the given lookup.
pub(crate) fn apply_env_overrides<F>(config: &mut TetherConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    let url = get(MEMORY_URL_ENV);
    let key = get(API_KEY_ENV);
    let user = get(USER_ID_ENV);
    if url.is_none() && key.is_none() && user.is_none() {
        return;
    }

    let memory = config.memory.get_or_insert_with(MemoryConfig::default);
    if let Some(url) = url {
        memory.base_url = url;
    }
    if let Some(key) = key {
        memory.api_key = Some(key);
    }
    if let Some(user) = user {
        memory.user_id = user;
    }
}

/// Merge one layer if present; a broken file becomes a warning.
///
/// A missing file is skipped; a malformed one is skipped with a warning.
fn load_layer(config: &mut TetherConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/tether.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(loaded.config.sync.is_none());
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_load_config_layered_merge() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[sync]
settle_delay_ms = 1000

[cache]
ttl_secs = 60
"#,
        )
        .unwrap();
        fs::write(
            project_dir.path().join("tether.toml"),
            r#"
[sync]
settle_delay_ms = 250
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();

        // Project-local overrides the user layer section by section
        assert_eq!(loaded.config.sync().settle_delay_ms, 250);
        assert_eq!(loaded.config.cache().ttl_secs, 60);
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_malformed_config_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(dir.path().join("tether.toml"), "not valid toml {{{{").unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert!(!loaded.warnings.is_empty());
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_plaintext_key_warning() {
        let dir = TempDir::new().unwrap();
        let empty_config_dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("tether.toml"),
            r#"
[memory]
api_key = "mem-secret"
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(dir.path()), Some(empty_config_dir.path())).unwrap();
        assert_eq!(loaded.warnings.len(), 1);
        assert!(loaded.warnings[0].contains("plaintext"));
    }

    #[test]
    fn test_env_overrides_create_memory_section() {
        let vars: HashMap<&str, &str> = [
            (MEMORY_URL_ENV, "http://memory.local:9000"),
            (USER_ID_ENV, "dana"),
            (API_KEY_ENV, "  "),
        ]
        .into_iter()
        .collect();

        let mut config = TetherConfig::new();
        apply_env_overrides(&mut config, |name| vars.get(name).map(|v| v.to_string()));

        let memory = config.memory();
        assert_eq!(memory.base_url, "http://memory.local:9000");
        assert_eq!(memory.user_id, "dana");
        // Blank values are ignored
        assert!(memory.api_key.is_none());
    }

    #[test]
    fn test_env_overrides_noop_without_vars() {
        let mut config = TetherConfig::new();
        apply_env_overrides(&mut config, |_| None);
        assert!(config.memory.is_none());
    }
}
