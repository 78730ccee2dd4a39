//! The three offline stages: export → embed → build.
//!
//! Each stage reads the previous stage's file output, so they can be run
//! one at a time or chained with [`run_all`].

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail, ensure};
use core_types::CandidateDocument;
use core_types::config::ResolvedPaths;
use indicatif::{ProgressBar, ProgressStyle};
use semantic_index::{ArtifactPaths, Embedder, EmbeddingStore, IndexBuilder, SimilarityIndex};
use tracing::{info, warn};

use crate::profile::CandidateProfile;

/// Summary of one pipeline run, for logging and the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StageCounts {
    pub exported: usize,
    pub embedded: usize,
    pub indexed: usize,
}

/// Flatten the profile dump at `profiles` into `{candidate_id, document}` records.
pub fn export_stage(profiles: &Path, documents: &Path) -> Result<usize> {
    let text = fs::read_to_string(profiles)
        .with_context(|| format!("read profiles {}", profiles.display()))?;
    let records: Vec<CandidateProfile> = serde_json::from_str(&text)
        .with_context(|| format!("parse profiles {}", profiles.display()))?;

    let docs: Vec<CandidateDocument> = records.iter().map(CandidateProfile::to_document).collect();
    let blank = docs.iter().filter(|d| d.document.is_empty()).count();
    if blank > 0 {
        warn!(blank, "profiles without any indexable content");
    }

    write_json(documents, &docs)?;
    info!(
        candidates = docs.len(),
        output = %documents.display(),
        "exported candidate documents"
    );
    Ok(docs.len())
}

/// Embed every exported document and persist the Embedding Store.
///
/// An empty document set halts the pipeline before anything is written.
pub fn embed_stage(
    documents: &Path,
    embeddings: &Path,
    embedding_ids: &Path,
    embedder: &dyn Embedder,
    batch_size: usize,
    show_progress: bool,
) -> Result<EmbeddingStore> {
    let text = fs::read_to_string(documents)
        .with_context(|| format!("read documents {}", documents.display()))?;
    let docs: Vec<CandidateDocument> = serde_json::from_str(&text)
        .with_context(|| format!("parse documents {}", documents.display()))?;
    if docs.is_empty() {
        bail!("no candidate documents in {}", documents.display());
    }

    let bar = if show_progress {
        let bar = ProgressBar::new(docs.len() as u64);
        bar.set_style(
            ProgressStyle::with_template("{spinner} embedding [{bar:40}] {pos}/{len} ({eta})")
                .context("progress bar template")?
                .progress_chars("=> "),
        );
        bar
    } else {
        ProgressBar::hidden()
    };

    let mut ids = Vec::with_capacity(docs.len());
    let mut vectors = Vec::with_capacity(docs.len());
    for batch in docs.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|d| d.document.clone()).collect();
        let embedded = embedder
            .embed_batch(&texts)
            .context("embed candidate documents")?;
        ensure!(
            embedded.len() == batch.len(),
            "embedder returned {} vectors for {} documents",
            embedded.len(),
            batch.len()
        );
        ids.extend(batch.iter().map(|d| d.candidate_id.clone()));
        vectors.extend(embedded);
        bar.inc(batch.len() as u64);
    }
    bar.finish_and_clear();

    let store = EmbeddingStore::new(ids, vectors).context("assemble embedding store")?;
    store
        .save(embeddings, embedding_ids)
        .context("write embedding store")?;
    info!(
        candidates = store.len(),
        dimension = store.dimension(),
        embedder = embedder.version(),
        "embedded candidate documents"
    );
    Ok(store)
}

/// Build the exact index from a persisted Embedding Store and publish it.
pub fn build_stage(
    embeddings: &Path,
    embedding_ids: &Path,
    artifacts: ArtifactPaths,
    embedder: &dyn Embedder,
) -> Result<usize> {
    let store = EmbeddingStore::load(embeddings, embedding_ids).context("load embedding store")?;
    ensure!(
        store.dimension() == embedder.dimension(),
        "embedding store has dimension {} but the configured embedder produces {}",
        store.dimension(),
        embedder.dimension()
    );
    let index = IndexBuilder::new(artifacts)
        .with_embedder_version(embedder.version())
        .build_from_store(&store)
        .context("build similarity index")?;
    Ok(index.len())
}

/// Run export, embed, and build back to back.
pub fn run_all(
    paths: &ResolvedPaths,
    embedder: &dyn Embedder,
    batch_size: usize,
    show_progress: bool,
) -> Result<StageCounts> {
    let exported = export_stage(&paths.profiles, &paths.documents)?;
    let store = embed_stage(
        &paths.documents,
        &paths.embeddings,
        &paths.embedding_ids,
        embedder,
        batch_size,
        show_progress,
    )?;
    let indexed = build_stage(
        &paths.embeddings,
        &paths.embedding_ids,
        ArtifactPaths::from(paths),
        embedder,
    )?;
    Ok(StageCounts {
        exported,
        embedded: store.len(),
        indexed,
    })
}

/// Write pretty JSON through a synced temporary sibling, then rename it into place.
fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let bytes = serde_json::to_vec_pretty(value).context("serialize documents")?;

    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    let tmp = path.with_file_name(name);
    let staged = (|| -> Result<()> {
        let mut file = File::create(&tmp).with_context(|| format!("create {}", tmp.display()))?;
        file.write_all(&bytes).with_context(|| format!("write {}", tmp.display()))?;
        file.sync_all().with_context(|| format!("sync {}", tmp.display()))
    })();
    if let Err(err) = staged {
        let _ = fs::remove_file(&tmp);
        return Err(err);
    }
    fs::rename(&tmp, path).with_context(|| format!("replace {}", path.display()))
}
