//! Server configuration.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::auth::generate_token;

/// Default max body size for hook payloads (1 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 1024 * 1024;

/// Server configuration.
#[derive(Clone)]
pub struct ServerConfig {
    /// Address to bind. Loopback with an OS-assigned port unless overridden.
    pub bind_address: SocketAddr,

    /// Token every request must present in `X-Hook-Token`.
    pub token: String,

    /// Maximum request body size in bytes. Larger bodies get 413.
    pub max_body_size: usize,

    /// Enable request logging.
    pub request_logging: bool,

    /// Where to publish `{port, token, updatedAt}` while running.
    pub discovery_path: Option<PathBuf>,

    /// Period of the background context refresh. `None` disables it.
    pub refresh_interval: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::LOCALHOST, 0)),
            token: generate_token(),
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            request_logging: true,
            discovery_path: None,
            refresh_interval: None,
        }
    }
}

impl ServerConfig {
    /// Create a config with a freshly generated token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed token instead of a generated one.
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = token.into();
        self
    }

    pub fn with_bind_address(mut self, addr: SocketAddr) -> Self {
        self.bind_address = addr;
        self
    }

    pub fn with_max_body_size(mut self, size: usize) -> Self {
        self.max_body_size = size;
        self
    }

    pub fn with_request_logging(mut self, enabled: bool) -> Self {
        self.request_logging = enabled;
        self
    }

    pub fn with_discovery_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.discovery_path = Some(path.into());
        self
    }

    pub fn with_refresh_interval(mut self, interval: Option<Duration>) -> Self {
        self.refresh_interval = interval.filter(|d| !d.is_zero());
        self
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("bind_address", &self.bind_address)
            .field("token", &"<redacted>")
            .field("max_body_size", &self.max_body_size)
            .field("request_logging", &self.request_logging)
            .field("discovery_path", &self.discovery_path)
            .field("refresh_interval", &self.refresh_interval)
            .finish()
    }
}
