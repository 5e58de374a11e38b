//! Status command - shows whether an intake server is running.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use console::{Style, style};
use serde::Serialize;
use tether_server::read_discovery;
use tokio::net::TcpStream;

use super::Context;

/// How long to wait for the TCP probe.
const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Arguments for the status command.
#[derive(Args, Debug)]
pub struct StatusArgs {}

/// Status for JSON output. Never carries the token.
#[derive(Debug, Serialize)]
struct StatusOutput {
    running: bool,
    port: Option<u16>,
    age_secs: Option<i64>,
    reachable: bool,
}

/// Run the status command.
pub async fn run(_args: StatusArgs, ctx: &Context) -> Result<()> {
    let path = ctx.discovery_path()?;

    let output = match read_discovery(&path) {
        Ok(info) => {
            let age = (tether_types::now() - info.updated_at).num_seconds().max(0);
            let reachable = probe(info.port).await;
            StatusOutput {
                running: reachable,
                port: Some(info.port),
                age_secs: Some(age),
                reachable,
            }
        }
        Err(_) => StatusOutput {
            running: false,
            port: None,
            age_secs: None,
            reachable: false,
        },
    };

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let dim = Style::new().dim();
    println!();
    println!("{}", style("tether Status").bold());
    println!("{}", dim.apply_to("─".repeat(40)));
    println!();

    match output.port {
        Some(port) => {
            let state = if output.reachable {
                Style::new().green().apply_to("● running")
            } else {
                Style::new().yellow().apply_to("● stale discovery file")
            };
            println!("  {} {}", dim.apply_to("Status:"), state);
            println!("  {} {}", dim.apply_to("Port:"), port);
            if let Some(age) = output.age_secs {
                println!("  {} {}s ago", dim.apply_to("Started:"), age);
            }
        }
        None => {
            println!(
                "  {} {}",
                dim.apply_to("Status:"),
                Style::new().red().apply_to("● not running")
            );
            println!();
            println!("  {}", dim.apply_to("Start the server with: tether serve"));
        }
    }
    if ctx.verbose {
        println!("  {} {}", dim.apply_to("Discovery:"), path.display());
    }
    println!();

    Ok(())
}

/// Whether something accepts TCP connections on the loopback port.
async fn probe(port: u16) -> bool {
    matches!(
        tokio::time::timeout(PROBE_TIMEOUT, TcpStream::connect(("127.0.0.1", port))).await,
        Ok(Ok(_))
    )
}
