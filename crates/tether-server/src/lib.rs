//! Loopback hook intake for tether.
//!
//! The host's lifecycle hooks reach this server through the short-lived
//! `tether hook` dispatcher, which finds it through the discovery file.
//!
//! # Endpoints
//!
//! - `POST /hook/before`: a prompt was submitted
//! - `POST /hook/after`: a response was produced; pairs it and starts a sync
//! - `POST /hook/thought`: intermediate reasoning, logged only
//! - `POST /control/clear-cache`: empty the local context cache
//!
//! Every request needs `X-Hook-Token`; the check runs before routing, so an
//! unauthenticated request gets 401 whatever its path or method.

pub mod auth;
pub mod config;
pub mod discovery;
pub mod error;
pub mod logging;
pub mod routes;
pub mod state;

pub use auth::{AuthError, HOOK_TOKEN_HEADER, auth_middleware, generate_token};
pub use config::ServerConfig;
pub use discovery::{read_discovery, remove_discovery, write_discovery};
pub use error::{Result, ServerError};
pub use logging::request_logging_middleware;
pub use routes::{ClearCacheResponse, HookResponse};
pub use state::{AppState, IntakeSnapshot, IntakeStats};

use std::future::Future;
use std::net::SocketAddr;

use axum::extract::DefaultBodyLimit;
use axum::routing::post;
use axum::{Router, middleware};
use tether_sync::RefreshTask;
use tether_types::DiscoveryInfo;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

/// Build the router with all routes and middleware.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/hook/before", post(routes::before_handler))
        .route("/hook/after", post(routes::after_handler))
        .route("/hook/thought", post(routes::thought_handler))
        .route("/control/clear-cache", post(routes::clear_cache_handler))
        .fallback(routes::not_found_handler)
        // Auth covers routes and fallback alike
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::auth_middleware,
        ))
        // Request logging (outside auth so rejections are logged too)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            logging::request_logging_middleware,
        ))
        .layer(DefaultBodyLimit::max(state.config.max_body_size))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A bound, not yet running intake server.
pub struct Server {
    state: AppState,
    listener: TcpListener,
}

impl Server {
    /// Bind the configured address (loopback, OS-assigned port by default).
    pub async fn bind(state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(state.config.bind_address).await?;
        Ok(Self { state, listener })
    }

    /// The address actually bound.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn router(&self) -> Router {
        router(self.state.clone())
    }

    /// Serve until `shutdown` resolves.
    ///
    /// Publishes the discovery file first and removes it on the way out,
    /// after pending prompts are dropped and in-flight syncs have finished.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self.local_addr()?;
        let config = self.state.config.clone();

        if let Some(path) = &config.discovery_path {
            let info = DiscoveryInfo {
                port: addr.port(),
                token: config.token.clone(),
                updated_at: tether_types::now(),
            };
            discovery::write_discovery(path, &info)?;
        }

        let refresh = config.refresh_interval.map(|interval| {
            RefreshTask::spawn(
                self.state.sequencer.clone(),
                self.state.host.as_ref().clone(),
                interval,
            )
        });

        info!(%addr, host = %self.state.host, "Hook intake listening");

        let router = self.router();
        let served = axum::serve(self.listener, router)
            .with_graceful_shutdown(shutdown)
            .await;

        if let Some(task) = refresh {
            task.shutdown().await;
        }
        self.state.shutdown().await;

        if let Some(path) = &config.discovery_path
            && let Err(e) = discovery::remove_discovery(path)
        {
            warn!(error = %e, "Failed to remove discovery file");
        }

        info!("Hook intake stopped");
        served.map_err(ServerError::Io)
    }
}
