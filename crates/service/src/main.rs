//! Entry point for the talentmatch query service.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use core_types::config::load_or_create_config;
use mimalloc::MiMalloc;
use service::{init_tracing_with_config, run_app};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Debug, Parser)]
#[command(name = "talentmatch-service", version, about = "Serve candidate matches over HTTP")]
struct Args {
    /// Config file (defaults to $TALENTMATCH_CONFIG or ./talentmatch.toml).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override `service.bind`, e.g. 0.0.0.0:5002.
    #[arg(long)]
    bind: Option<String>,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let mut cfg = load_or_create_config(args.config.as_deref())?;
    if let Some(bind) = args.bind {
        cfg.service.bind = bind;
    }
    let _guard = init_tracing_with_config(&cfg.logging)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async {
        let result = run_app(&cfg, shutdown_signal()).await;
        if let Err(err) = &result {
            tracing::error!("query service exited with error: {err:#}");
        }
        result
    })
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for ctrl-c; running until killed");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
}
