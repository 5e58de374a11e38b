//! Runtime file locations derived from the user config directory.

use std::path::PathBuf;

use crate::discovery::user_config_dir;
use crate::{ConfigError, Result};

/// Discovery file written by a running intake server.
pub const DISCOVERY_FILE: &str = "hook-server.json";

/// Subdirectory for rolling log files.
pub const LOG_DIR: &str = "logs";

/// Path of the discovery file (`<config dir>/hook-server.json`).
pub fn discovery_file_path() -> Result<PathBuf> {
    user_config_dir()
        .map(|d| d.join(DISCOVERY_FILE))
        .ok_or(ConfigError::NoConfigDir)
}

/// Directory for log files, falling back to `./logs`.
pub fn log_dir() -> PathBuf {
    user_config_dir()
        .map(|d| d.join(LOG_DIR))
        .unwrap_or_else(|| PathBuf::from(LOG_DIR))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discovery_file_name() {
        // May be unavailable in stripped-down CI environments
        if let Ok(path) = discovery_file_path() {
            assert!(path.ends_with(DISCOVERY_FILE));
        }
    }

    #[test]
    fn test_log_dir_ends_with_logs() {
        assert!(log_dir().ends_with(LOG_DIR));
    }
}
