//! `talentmatch-indexer`: run the export / embed / build stages.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use core_types::config::load_or_create_config;
use core_types::logging::init_tracing_with_config;
use index_worker::{build_stage, embed_stage, export_stage, run_all};
use mimalloc::MiMalloc;
use semantic_index::{ArtifactPaths, HashingEmbedder, check_pinned_version};

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser, Debug)]
#[command(name = "talentmatch-indexer", version, about = "Build talentmatch index artifacts")]
struct Cli {
    /// Config file (defaults to $TALENTMATCH_CONFIG or ./talentmatch.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Hide the embedding progress bar.
    #[arg(long, global = true)]
    no_progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Flatten the profile dump into candidate documents.
    Export,
    /// Embed candidate documents into the Embedding Store.
    Embed,
    /// Build and publish the index and identifier mapping.
    Build,
    /// Run export, embed, and build in sequence.
    All,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = load_or_create_config(cli.config.as_deref())?;
    let _guard = init_tracing_with_config(&cfg.logging)?;

    let paths = cfg.resolved_paths();
    let embedder = HashingEmbedder::new(cfg.embedder.dimension).context("configure embedder")?;
    check_pinned_version(&embedder, &cfg.embedder.version).context("configure embedder")?;
    let show_progress = !cli.no_progress;

    match cli.command {
        Commands::Export => {
            export_stage(&paths.profiles, &paths.documents)?;
        }
        Commands::Embed => {
            embed_stage(
                &paths.documents,
                &paths.embeddings,
                &paths.embedding_ids,
                &embedder,
                cfg.embedder.batch_size,
                show_progress,
            )?;
        }
        Commands::Build => {
            build_stage(
                &paths.embeddings,
                &paths.embedding_ids,
                ArtifactPaths::from(&paths),
                &embedder,
            )?;
        }
        Commands::All => {
            let counts = run_all(&paths, &embedder, cfg.embedder.batch_size, show_progress)?;
            tracing::info!(
                exported = counts.exported,
                embedded = counts.embedded,
                indexed = counts.indexed,
                "pipeline complete"
            );
        }
    }
    Ok(())
}
