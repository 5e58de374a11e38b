//! Clear-cache command - resets the running server's context cache.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use tether_server::ClearCacheResponse;

use super::Context;
use crate::client::IntakeClient;

/// Arguments for the clear-cache command.
#[derive(Args, Debug)]
pub struct ClearCacheArgs {
    /// Request timeout in seconds
    #[arg(long, default_value_t = 5)]
    pub timeout: u64,
}

/// Run the clear-cache command.
pub async fn run(args: ClearCacheArgs, ctx: &Context) -> Result<()> {
    let client = IntakeClient::discover(
        &ctx.discovery_path()?,
        Duration::from_secs(args.timeout),
    )?;
    let response: ClearCacheResponse = client
        .post_json("/control/clear-cache", String::new())
        .await?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&response)?);
    } else {
        println!("Cleared {} cached context(s)", response.cleared);
    }
    Ok(())
}
