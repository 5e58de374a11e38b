//! Hook command - the per-event dispatcher.
//!
//! Invoked by the host once per lifecycle event with the event JSON on
//! stdin. Forwards it verbatim to the running intake server. Never blocks
//! or fails the host: every problem is logged and the exit status is 0.

use std::time::Duration;

use anyhow::Result;
use clap::{Args, ValueEnum};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use super::Context;
use crate::client::IntakeClient;

/// Arguments for the hook command.
#[derive(Args, Debug)]
pub struct HookArgs {
    /// Which lifecycle event this is
    #[arg(value_enum)]
    pub kind: HookKind,

    /// Give up on the server after this many milliseconds
    #[arg(long, default_value_t = 2000)]
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HookKind {
    /// A prompt was submitted
    Before,
    /// A response was produced
    After,
    /// Intermediate reasoning
    Thought,
}

impl HookKind {
    pub fn path(self) -> &'static str {
        match self {
            HookKind::Before => "/hook/before",
            HookKind::After => "/hook/after",
            HookKind::Thought => "/hook/thought",
        }
    }
}

/// Run the hook command.
pub async fn run(args: HookArgs, ctx: &Context) -> Result<()> {
    if let Err(e) = dispatch(&args, ctx).await {
        warn!(kind = ?args.kind, error = %format!("{:#}", e), "Hook event not delivered");
    }
    Ok(())
}

async fn dispatch(args: &HookArgs, ctx: &Context) -> Result<()> {
    let mut payload = String::new();
    tokio::io::stdin().read_to_string(&mut payload).await?;
    if payload.trim().is_empty() {
        debug!(kind = ?args.kind, "Empty hook payload, nothing to forward");
        return Ok(());
    }

    let client = IntakeClient::discover(
        &ctx.discovery_path()?,
        Duration::from_millis(args.timeout_ms),
    )?;
    client.post(args.kind.path(), payload).await?;

    debug!(kind = ?args.kind, "Hook event delivered");
    Ok(())
}
