//! Configuration system for tether.
//!
//! Provides TOML-based configuration with:
//! - Config file layering (user config dir + project-local overrides)
//! - Environment overrides for the memory store connection
//! - Runtime path helpers (discovery file, log directory)

pub mod discovery;
pub mod error;
pub mod paths;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use paths::{discovery_file_path, log_dir};
pub use types::*;
