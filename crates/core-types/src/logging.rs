//! Process-wide tracing setup shared by the service and the offline indexer.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt};

use crate::config::LoggingSection;

/// Install a stderr subscriber at `info` (or `RUST_LOG`).
pub fn init_tracing() -> Result<()> {
    init_tracing_with_config(&LoggingSection::default()).map(|_| ())
}

/// Install the global subscriber described by `cfg`.
///
/// `RUST_LOG` takes precedence over `cfg.level`. When `cfg.file` is set, logs
/// go to a daily-rolling file through a non-blocking writer; keep the returned
/// guard alive until shutdown so buffered lines are flushed.
pub fn init_tracing_with_config(cfg: &LoggingSection) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = env_filter(&cfg.level, rust_log.as_deref())?;

    let Some((dir, file_name)) = log_target(&cfg.file)? else {
        let builder = fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false);
        let res = if cfg.json {
            builder.json().try_init()
        } else {
            builder.try_init()
        };
        res.map_err(|e| anyhow!("install tracing subscriber: {e}"))?;
        return Ok(None);
    };

    std::fs::create_dir_all(&dir).with_context(|| format!("create log dir {}", dir.display()))?;
    let appender = tracing_appender::rolling::daily(&dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let builder = fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false);
    let res = if cfg.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    res.map_err(|e| anyhow!("install tracing subscriber: {e}"))?;
    Ok(Some(guard))
}

/// A valid `RUST_LOG` wins; otherwise the configured level must parse.
fn env_filter(level: &str, rust_log: Option<&str>) -> Result<EnvFilter> {
    if let Some(filter) = rust_log.and_then(|raw| EnvFilter::try_new(raw).ok()) {
        return Ok(filter);
    }
    EnvFilter::try_new(level).with_context(|| format!("invalid log level {level:?}"))
}

/// Split `logging.file` into the rolling appender's directory and file prefix.
/// An empty setting means stderr.
fn log_target(file: &str) -> Result<Option<(PathBuf, OsString)>> {
    if file.is_empty() {
        return Ok(None);
    }
    let path = Path::new(file);
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file path {file:?} has no file name"))?;
    Ok(Some((dir.to_path_buf(), file_name.to_os_string())))
}
