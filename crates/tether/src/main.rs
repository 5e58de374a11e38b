//! tether - keeps an editor session tethered to a long-term memory store.
//!
//! Main entry point for the tether CLI.

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

mod client;
mod commands;

use commands::{clear_cache, context, hook, serve, status};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// tether - sync editor interactions with long-term memory
#[derive(Parser)]
#[command(name = "tether")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Workspace to publish context for (default: current directory)
    #[arg(long, global = true)]
    pub project: Option<PathBuf>,

    /// User config directory (default: platform config dir)
    #[arg(long, global = true, env = "TETHER_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the hook intake server for a workspace
    Serve(serve::ServeArgs),

    /// Forward one hook event from stdin to the running server
    Hook(hook::HookArgs),

    /// Show whether an intake server is running
    Status(status::StatusArgs),

    /// Print the memory context for a query
    Context(context::ContextArgs),

    /// Empty the running server's context cache
    ClearCache(clear_cache::ClearCacheArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        project_dir: cli.project,
        config_dir: cli.config_dir,
    };

    // Hook output is consumed by the host, so that command logs to file only
    let console = !matches!(cli.command, Commands::Hook(_));
    let _guard = init_tracing(cli.verbose, console, &ctx.log_dir());

    match cli.command {
        Commands::Serve(args) => serve::run(args, &ctx).await,
        Commands::Hook(args) => hook::run(args, &ctx).await,
        Commands::Status(args) => status::run(args, &ctx).await,
        Commands::Context(args) => context::run(args, &ctx).await,
        Commands::ClearCache(args) => clear_cache::run(args, &ctx).await,
    }
}

/// Console layer (stderr, human-readable) plus a daily JSON file.
///
/// An unusable log directory disables the file layer rather than failing.
fn init_tracing(verbose: bool, console: bool, log_dir: &Path) -> Option<WorkerGuard> {
    let filter = if verbose {
        "tether=debug,tether_sync=debug,tether_server=debug,tether_client=debug,tether_config=debug,info"
    } else {
        "tether=info,tether_sync=info,tether_server=info,tether_client=info,warn"
    };
    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    let console_layer = console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_writer(std::io::stderr)
            .with_filter(console_filter)
    });

    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("tether.log")
        .build(log_dir)
        .ok();
    let (file_layer, guard) = match appender {
        Some(appender) => {
            let (non_blocking, guard) = tracing_appender::non_blocking(appender);
            let layer = tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(EnvFilter::new(
                    "tether=trace,tether_sync=trace,tether_server=trace,tether_client=trace,tether_config=trace,info",
                ));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .init();

    guard
}
