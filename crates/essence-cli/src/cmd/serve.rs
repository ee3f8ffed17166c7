//! `ess serve`: run the HTTP proxy.

use anyhow::Context;
use clap::Args;
use std::sync::Arc;

use super::CmdContext;

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Address to bind, e.g. 127.0.0.1:3000. Defaults to `[server] bind`.
    #[arg(long)]
    pub bind: Option<String>,
}

pub fn run_serve(args: &ServeArgs, ctx: &CmdContext) -> anyhow::Result<()> {
    let bind = args
        .bind
        .clone()
        .unwrap_or_else(|| ctx.config.server.bind.clone());
    let forwarder = Arc::from(essence_proxy::forward::from_config(&ctx.config));

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    runtime.block_on(essence_proxy::serve(&bind, forwarder))
}
