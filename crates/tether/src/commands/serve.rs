//! Serve command - runs the hook intake server for one workspace.

use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;

use anyhow::Result;
use clap::Args;
use console::style;
use tether_server::{AppState, Server, ServerConfig};
use tracing::info;

use super::Context;

/// Arguments for the serve command.
///
/// CLI arguments override config file values.
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Port to listen on (default: any free port)
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Memory store URL (overrides config)
    #[arg(long)]
    pub memory_url: Option<String>,

    /// User to record interactions for (overrides config)
    #[arg(long)]
    pub user_id: Option<String>,

    /// Proactive refresh interval in seconds, 0 disables (overrides config)
    #[arg(long)]
    pub refresh_interval: Option<u64>,
}

/// Run the serve command.
pub async fn run(args: ServeArgs, ctx: &Context) -> Result<()> {
    let mut config = ctx.load_config()?.config;

    // ── CLI overrides ───────────────────────────────────────────────────

    let memory = config.memory.get_or_insert_with(Default::default);
    if let Some(url) = args.memory_url {
        memory.base_url = url;
    }
    if let Some(user_id) = args.user_id {
        memory.user_id = user_id;
    }
    if let Some(secs) = args.refresh_interval {
        config.sync.get_or_insert_with(Default::default).refresh_interval_secs = secs;
    }
    config.validate()?;

    // ── Wire components ─────────────────────────────────────────────────

    let host = ctx.host_context()?;
    let store = super::memory_store(&config)?;
    let sequencer = Arc::new(super::sequencer(&config, store));

    let server_section = config.server();
    let refresh = config.sync().refresh_interval();
    let server_config = ServerConfig::new()
        .with_bind_address(SocketAddr::from((Ipv4Addr::LOCALHOST, args.port.unwrap_or(0))))
        .with_max_body_size(server_section.max_body_size)
        .with_request_logging(server_section.request_logging)
        .with_discovery_path(ctx.discovery_path()?)
        .with_refresh_interval(refresh);

    let state = AppState::new(server_config, sequencer.clone(), host.clone());
    let server = Server::bind(state).await?;
    let addr = server.local_addr()?;

    if !ctx.json_output {
        eprintln!(
            "{} {} for {}",
            style("tether").bold(),
            style(format!("listening on {}", addr)).green(),
            host
        );
        eprintln!(
            "  {} {}",
            style("Artifact:").dim(),
            sequencer.artifact_path(&host).display()
        );
        if let Some(interval) = refresh {
            eprintln!("  {} every {}s", style("Refresh:").dim(), interval.as_secs());
        }
    }

    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    Ok(())
}
