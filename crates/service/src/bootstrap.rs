//! Wire configuration, startup, and the HTTP listener together.

use std::future::Future;
use std::sync::Arc;

use anyhow::{Context, Result};
use core_types::config::AppConfig;
use ipc::RequestLimits;
use semantic_index::{ArtifactPaths, Embedder, HashingEmbedder, check_pinned_version};
use tokio::net::TcpListener;
use tracing::info;

use crate::http::{AppState, router};
use crate::metrics::ServiceMetrics;
use crate::state::{ServiceHost, StartupError};

/// Query embedder described by the `[embedder]` config section.
pub fn embedder_from_config(cfg: &AppConfig) -> Result<Arc<dyn Embedder>, StartupError> {
    let embedder = HashingEmbedder::new(cfg.embedder.dimension)?;
    check_pinned_version(&embedder, &cfg.embedder.version)?;
    Ok(Arc::new(embedder))
}

/// Run startup against the configured artifacts and assemble handler state.
///
/// Returns an error (with the host left in `Failed`) when the artifacts are
/// missing, corrupt, misaligned, or built with a different embedder.
pub fn prepare_state(cfg: &AppConfig) -> Result<AppState> {
    let host = Arc::new(ServiceHost::new());
    let paths = ArtifactPaths::from(&cfg.resolved_paths());
    let embedder = embedder_from_config(cfg)?;
    let matcher = host
        .load(&paths, embedder)
        .context("refusing to start query service")?;

    let limits = RequestLimits {
        default_top_n: cfg.service.default_top_n.max(1),
        max_top_n: cfg.service.max_top_n.max(1),
    };
    let mut state = AppState::new(host).with_limits(limits);
    if cfg.metrics.enabled {
        let metrics = Arc::new(ServiceMetrics::new()?);
        metrics.set_indexed(matcher.indexed());
        state = state.with_metrics(metrics);
    }
    Ok(state)
}

/// Serve `state` on an already-bound listener until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, state: AppState, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr().context("listener address")?;
    info!(%addr, "query service listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown)
        .await
        .context("http server")?;
    info!("query service stopped");
    Ok(())
}

/// Start the service described by `cfg`: load artifacts, bind, serve.
pub async fn run_app<F>(cfg: &AppConfig, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let cfg_for_load = cfg.clone();
    let state = tokio::task::spawn_blocking(move || prepare_state(&cfg_for_load))
        .await
        .context("startup task")??;
    let listener = TcpListener::bind(&cfg.service.bind)
        .await
        .with_context(|| format!("bind {}", cfg.service.bind))?;
    serve(listener, state, shutdown).await
}
