use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use cli::{report_problems, requirement_text};
use console::style;
use core_types::config::load_or_create_config;
use ipc::MatchRequest;
use semantic_index::{ArtifactPaths, inspect_artifacts, load_artifacts};
use service::{Matcher, embedder_from_config};

/// Operator CLI for talentmatch artifacts.
#[derive(Parser, Debug)]
#[command(name = "talentmatch", version, about = "talentmatch operator client")]
struct Cli {
    /// Config file (defaults to $TALENTMATCH_CONFIG or ./talentmatch.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Rank candidates for a requirement against the published artifacts.
    Match {
        /// Free-form requirement text.
        text: Option<String>,
        /// Requirement JSON (title, description, subject, qualifications, benefits).
        #[arg(short, long)]
        requirement: Option<PathBuf>,
        #[arg(short = 'n', long, default_value_t = core_types::DEFAULT_TOP_N)]
        top_n: usize,
        /// Print the wire response instead of a list.
        #[arg(long)]
        json: bool,
    },
    /// Check the published index and mapping for consistency.
    Inspect,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let cfg = load_or_create_config(cli.config.as_deref())?;
    let paths = ArtifactPaths::from(&cfg.resolved_paths());

    match cli.command {
        Commands::Match {
            text,
            requirement,
            top_n,
            json,
        } => {
            let text = requirement_text(text.as_deref(), requirement.as_deref())?;
            let embedder = embedder_from_config(&cfg)?;
            let loaded = load_artifacts(&paths)?;
            let matcher = Matcher::from_artifacts(loaded, Arc::clone(&embedder))?;
            let top_n = top_n.clamp(1, cfg.service.max_top_n.max(1));
            let ranked = matcher
                .match_candidates(&MatchRequest::new(text, top_n))
                .context("match failed")?;

            if json {
                let resp = ipc::MatchResponse {
                    ranked_candidate_ids: ranked.into_iter().map(|id| id.into_inner()).collect(),
                };
                println!("{}", serde_json::to_string_pretty(&resp)?);
            } else {
                println!(
                    "{} {} of {} candidates",
                    style("Top").cyan(),
                    ranked.len(),
                    matcher.indexed()
                );
                for (rank, id) in ranked.iter().enumerate() {
                    println!("{:>4}. {}", rank + 1, style(id).bold());
                }
            }
        }
        Commands::Inspect => {
            let report = inspect_artifacts(&paths)?;
            println!("{} {}", style("index:").cyan(), paths.index.display());
            println!("{} {}", style("mapping:").cyan(), paths.mapping.display());
            println!("  vectors   {}", report.indexed);
            println!("  dimension {}", report.dimension);
            println!("  embedder  {}", report.embedder);
            println!("  ids       {}", report.mapping_len);

            let problems = report_problems(&report);
            if problems.is_empty() {
                println!("{}", style("artifacts are consistent").green());
            } else {
                for p in &problems {
                    println!("{} {p}", style("problem:").red());
                }
                bail!("artifacts are inconsistent");
            }
        }
    }
    Ok(())
}
