//! OSIU pipeline CLI
//!
//! Stages can run one at a time (each reads the previous stage's table from
//! disk) or all together with `run`.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use osiu::{Pipeline, PipelineConfig, RunOptions};

// ──────────────────────────────────────────────────────────────────────────────
// COMMAND LINE
// ──────────────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "osiu")]
#[command(version)]
#[command(about = "Normalize indicators, build latents, fit sigma weights and score regions")]
struct Cli {
    /// Path to the pipeline YAML config
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check raw indicator files for the required columns
    Validate,
    /// Normalize raw indicators into the interim table
    Normalize,
    /// Aggregate normalized indicators into latents
    Latents {
        /// Use sigma weights from a previous fit result
        #[arg(long)]
        fitted_weights: Option<PathBuf>,
    },
    /// Fit sigma indicator weights with bootstrap intervals
    Fit,
    /// Score latents and write coverage diagnostics
    Score,
    /// Run every stage in order
    Run {
        /// Skip the sigma weight fit
        #[arg(long)]
        skip_fit: bool,
        /// Aggregate sigma with the fitted weights
        #[arg(long, conflicts_with = "skip_fit")]
        apply_fitted: bool,
    },
}

// ──────────────────────────────────────────────────────────────────────────────
// LOGGING
// ──────────────────────────────────────────────────────────────────────────────

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("osiu=info")),
        1 => EnvFilter::new("osiu=debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

// ──────────────────────────────────────────────────────────────────────────────
// ENTRY POINT
// ──────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = PipelineConfig::load(&cli.config)
        .await
        .with_context(|| format!("Failed to load config {:?}", cli.config))?;
    let pipeline = Pipeline::new(config);

    match cli.command {
        Commands::Validate => {
            let report = pipeline.validate().await.context("Schema validation failed")?;
            for (path, reason) in &report.bad {
                println!("✗ {}: {}", path.display(), reason);
            }
            println!("Checked {} files; bad: {}", report.checked, report.bad.len());
            if !report.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Normalize => {
            let rows = pipeline.normalize().await.context("Normalization failed")?;
            println!("Wrote {} ({} rows)", pipeline.config().normalized_path().display(), rows.len());
        }
        Commands::Latents { fitted_weights } => {
            let rows = pipeline
                .latents(fitted_weights.as_deref())
                .await
                .context("Latent aggregation failed")?;
            println!("Wrote {} ({} rows)", pipeline.config().latents_path().display(), rows.len());
        }
        Commands::Fit => {
            let fit = pipeline.fit().await.context("Weight fitting failed")?;
            println!("Wrote {}", pipeline.config().weights_path().display());
            println!("{}", serde_json::to_string_pretty(&fit)?);
        }
        Commands::Score => {
            let report = pipeline.score().await.context("Scoring failed")?;
            println!(
                "Wrote {} ({} rows, {} below signal gate, {} unresolved)",
                pipeline.config().scores_path().display(),
                report.rows.len(),
                report.skipped_insufficient_signal,
                report.skipped_unresolved
            );
        }
        Commands::Run { skip_fit, apply_fitted } => {
            let summary = pipeline
                .run(RunOptions { skip_fit, apply_fitted })
                .await
                .context("Pipeline run failed")?;
            info!("Run summary: {:?}", summary);
            println!("{}", "═".repeat(60));
            println!("Observations:   {}", summary.normalized);
            println!("Latent rows:    {}", summary.latent_rows);
            if let Some(fit) = &summary.fit {
                println!("Sigma weights:  {:?} (loss {:.4e})", fit.weights_point, fit.loss);
            }
            println!(
                "Scored rows:    {} ({} below signal gate)",
                summary.scores.rows.len(),
                summary.scores.skipped_insufficient_signal
            );
            println!("Coverage rows:  {}", summary.coverage_rows);
            println!("{}", "═".repeat(60));
        }
    }

    Ok(())
}
