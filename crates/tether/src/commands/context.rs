//! Context command - one-shot lookup without a running server.

use anyhow::Result;
use clap::Args;
use console::style;
use tether_sync::write_atomic;

use super::Context;

/// Arguments for the context command.
#[derive(Args, Debug)]
pub struct ContextArgs {
    /// Query to fetch memory context for
    pub query: String,

    /// Write the artifact into the workspace instead of printing it
    #[arg(short, long)]
    pub write: bool,
}

/// Run the context command.
pub async fn run(args: ContextArgs, ctx: &Context) -> Result<()> {
    let config = ctx.load_config()?.config;
    let host = ctx.host_context()?;
    let sequencer = super::sequencer(&config, super::memory_store(&config)?);

    let rendered = sequencer.lookup(&host, &args.query).await?;

    if args.write {
        let path = sequencer.artifact_path(&host);
        write_atomic(&path, &rendered)?;
        eprintln!("{} {}", style("Wrote").green(), path.display());
    } else {
        print!("{}", rendered);
    }
    Ok(())
}
