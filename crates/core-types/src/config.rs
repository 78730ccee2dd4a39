//! Layered configuration: built-in defaults, then `talentmatch.toml`, then
//! `TALENTMATCH_*` environment overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "talentmatch.toml";
pub const CONFIG_ENV: &str = "TALENTMATCH_CONFIG";
const ENV_PREFIX: &str = "TALENTMATCH_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub paths: PathsSection,
    pub embedder: EmbedderSection,
    pub service: ServiceSection,
    pub logging: LoggingSection,
    pub metrics: MetricsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppSection {
    /// Root directory that relative artifact paths resolve against.
    pub data_dir: String,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            data_dir: "data".into(),
        }
    }
}

/// Locations of pipeline inputs and build artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsSection {
    /// Raw profile dump consumed by the export stage.
    pub profiles: String,
    /// Flattened `{candidate_id, document}` records.
    pub documents: String,
    /// Embedding Store matrix.
    pub embeddings: String,
    /// Embedding Store identifier column.
    pub embedding_ids: String,
    /// Published Similarity Index artifact.
    pub index: String,
    /// Published identifier mapping artifact.
    pub mapping: String,
}

impl Default for PathsSection {
    fn default() -> Self {
        Self {
            profiles: "candidate_profiles.json".into(),
            documents: "candidates_processed.json".into(),
            embeddings: "embeddings.bin".into(),
            embedding_ids: "embedding_ids.json".into(),
            index: "candidates.index".into(),
            mapping: "candidate_ids.json".into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderSection {
    pub dimension: usize,
    pub batch_size: usize,
    /// Expected embedder version label. Empty accepts whatever the configured
    /// embedder reports; otherwise the indexer and the service refuse to run
    /// with an embedder whose label differs.
    pub version: String,
}

impl Default for EmbedderSection {
    fn default() -> Self {
        Self {
            dimension: 384,
            batch_size: 64,
            version: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSection {
    pub bind: String,
    pub default_top_n: usize,
    /// Upper bound accepted at the request boundary.
    pub max_top_n: usize,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5002".into(),
            default_top_n: crate::DEFAULT_TOP_N,
            max_top_n: 1000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    pub level: String,
    /// Rolling log file; empty means stderr only.
    pub file: String,
    pub json: bool,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSection {
    pub enabled: bool,
}

impl Default for MetricsSection {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Fully resolved artifact locations for one data directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPaths {
    pub profiles: PathBuf,
    pub documents: PathBuf,
    pub embeddings: PathBuf,
    pub embedding_ids: PathBuf,
    pub index: PathBuf,
    pub mapping: PathBuf,
}

impl AppConfig {
    /// Resolve every configured path against `app.data_dir` (absolute paths are kept).
    pub fn resolved_paths(&self) -> ResolvedPaths {
        let root = Path::new(&self.app.data_dir);
        let resolve = |p: &str| {
            let path = Path::new(p);
            if path.is_absolute() {
                path.to_path_buf()
            } else {
                root.join(path)
            }
        };
        ResolvedPaths {
            profiles: resolve(&self.paths.profiles),
            documents: resolve(&self.paths.documents),
            embeddings: resolve(&self.paths.embeddings),
            embedding_ids: resolve(&self.paths.embedding_ids),
            index: resolve(&self.paths.index),
            mapping: resolve(&self.paths.mapping),
        }
    }
}

/// Load the config at `path` (or `$TALENTMATCH_CONFIG`, or `./talentmatch.toml`),
/// writing defaults first if the file does not exist, then apply env overrides.
pub fn load_or_create_config(path: Option<&Path>) -> Result<AppConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME)),
    };

    let mut cfg = if path.exists() {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("read config {}", path.display()))?;
        toml::from_str::<AppConfig>(&text)
            .with_context(|| format!("parse config {}", path.display()))?
    } else {
        let cfg = AppConfig::default();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("create config dir {}", parent.display()))?;
        }
        let text = toml::to_string_pretty(&cfg).context("serialize default config")?;
        fs::write(&path, text).with_context(|| format!("write config {}", path.display()))?;
        cfg
    };

    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;
    Ok(cfg)
}

/// Apply `TALENTMATCH_*` overrides using the given variable lookup.
pub fn apply_env_overrides<F>(cfg: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

    if let Some(v) = get("DATA_DIR") {
        cfg.app.data_dir = v;
    }
    if let Some(v) = get("BIND") {
        cfg.service.bind = v;
    }
    if let Some(v) = get("DEFAULT_TOP_N") {
        cfg.service.default_top_n = v
            .parse()
            .with_context(|| format!("{ENV_PREFIX}DEFAULT_TOP_N must be an integer, got {v:?}"))?;
    }
    if let Some(v) = get("EMBEDDER_DIMENSION") {
        cfg.embedder.dimension = v.parse().with_context(|| {
            format!("{ENV_PREFIX}EMBEDDER_DIMENSION must be an integer, got {v:?}")
        })?;
    }
    if let Some(v) = get("EMBEDDER_VERSION") {
        cfg.embedder.version = v;
    }
    if let Some(v) = get("LOG_LEVEL") {
        cfg.logging.level = v;
    }
    if let Some(v) = get("LOG_FILE") {
        cfg.logging.file = v;
    }
    if let Some(v) = get("LOG_JSON") {
        cfg.logging.json = parse_bool(&v);
    }
    if let Some(v) = get("METRICS_ENABLED") {
        cfg.metrics.enabled = parse_bool(&v);
    }
    Ok(())
}

fn parse_bool(v: &str) -> bool {
    matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn creates_default_file_when_missing() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let cfg = load_or_create_config(Some(&path))?;
        assert!(path.exists());
        assert_eq!(cfg.service.default_top_n, 20);
        assert_eq!(cfg.embedder.dimension, 384);
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE_NAME);
        fs::write(&path, "[service]\nbind = \"0.0.0.0:9000\"\n")?;
        let cfg = load_or_create_config(Some(&path))?;
        assert_eq!(cfg.service.bind, "0.0.0.0:9000");
        assert_eq!(cfg.service.max_top_n, 1000);
        assert_eq!(cfg.paths.mapping, "candidate_ids.json");
        Ok(())
    }

    #[test]
    fn env_overrides_win() -> Result<()> {
        let vars: HashMap<&str, &str> = [
            ("TALENTMATCH_DATA_DIR", "/srv/tm"),
            ("TALENTMATCH_EMBEDDER_DIMENSION", "8"),
            ("TALENTMATCH_EMBEDDER_VERSION", "fnv1a-hash-v1/d8"),
            ("TALENTMATCH_METRICS_ENABLED", "off"),
        ]
        .into_iter()
        .collect();
        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| vars.get(k).map(|v| v.to_string()))?;
        assert_eq!(cfg.app.data_dir, "/srv/tm");
        assert_eq!(cfg.embedder.dimension, 8);
        assert_eq!(cfg.embedder.version, "fnv1a-hash-v1/d8");
        assert!(!cfg.metrics.enabled);
        Ok(())
    }

    #[test]
    fn bad_numeric_override_is_an_error() {
        let mut cfg = AppConfig::default();
        let res = apply_env_overrides(&mut cfg, |k| {
            (k == "TALENTMATCH_DEFAULT_TOP_N").then(|| "many".to_string())
        });
        assert!(res.is_err());
    }

    #[test]
    fn relative_paths_resolve_against_data_dir() {
        let mut cfg = AppConfig::default();
        cfg.app.data_dir = "/var/lib/tm".into();
        cfg.paths.index = "/mnt/shared/candidates.index".into();
        let paths = cfg.resolved_paths();
        assert_eq!(paths.mapping, PathBuf::from("/var/lib/tm/candidate_ids.json"));
        assert_eq!(paths.index, PathBuf::from("/mnt/shared/candidates.index"));
    }
}
