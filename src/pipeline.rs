//! Pipeline Stages
//!
//! Each stage reads the previous stage's table from disk, computes a new
//! table, and writes it. `run` chains them in one pass.

use std::path::Path;
use tracing::{info, warn};

use crate::config::PipelineConfig;
use crate::error::{PipelineError, Result};
use crate::etl::{self, NormalizedObservation, SchemaReport};
use crate::latent::{self, CoverageRow, LatentRow, ScoreReport};
use crate::model::{self, FitResult};
use crate::tables;

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    /// Skip the σ weight fit entirely
    pub skip_fit: bool,
    /// Aggregate σ with the freshly fitted point weights
    pub apply_fitted: bool,
}

#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub normalized: usize,
    pub latent_rows: usize,
    pub fit: Option<FitResult>,
    pub scores: ScoreReport,
    pub coverage_rows: usize,
}

pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(config: PipelineConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub async fn validate(&self) -> Result<SchemaReport> {
        etl::validate_dir(&self.config.output.raw_dir).await
    }

    /// Raw files → `indicators_normalized.csv`.
    pub async fn normalize(&self) -> Result<Vec<NormalizedObservation>> {
        let raw = tables::load_raw_dir(&self.config.output.raw_dir).await?;
        let normalized = etl::normalize(&raw);
        if normalized.is_empty() {
            return Err(PipelineError::empty("normalization", "no complete raw observations"));
        }
        tables::write_table(self.config.normalized_path(), &normalized).await?;
        Ok(normalized)
    }

    async fn load_normalized(&self) -> Result<Vec<NormalizedObservation>> {
        tables::read_table(self.config.normalized_path()).await
    }

    fn aggregate(&self, normalized: &[NormalizedObservation], fitted: Option<&FitResult>) -> Result<Vec<LatentRow>> {
        let mut config = self.config.clone();
        if let Some(fit) = fitted {
            config.apply_fitted_sigma(fit)?;
        }
        let rows = latent::build_latents(normalized, &config.latents);
        if rows.is_empty() {
            return Err(PipelineError::empty(
                "latent aggregation",
                "no configured indicator appears in the normalized data",
            ));
        }
        Ok(rows)
    }

    /// `indicators_normalized.csv` → `latents.csv`, optionally with σ weights
    /// taken from a previous fit.
    pub async fn latents(&self, fitted_weights: Option<&Path>) -> Result<Vec<LatentRow>> {
        let normalized = self.load_normalized().await?;
        let fitted = match fitted_weights {
            Some(path) => Some(tables::read_json::<FitResult>(path).await?),
            None => None,
        };
        let rows = self.aggregate(&normalized, fitted.as_ref())?;
        tables::write_table(self.config.latents_path(), &rows).await?;
        Ok(rows)
    }

    async fn fit_from(&self, normalized: Vec<NormalizedObservation>) -> Result<FitResult> {
        let ids = self.config.sigma_ids();
        let fit_cfg = self.config.fit.clone();
        info!("Fitting sigma weights over {} indicators", ids.len());

        let result = tokio::task::spawn_blocking(move || {
            model::fit_latent_weights(
                &normalized,
                &ids,
                &fit_cfg.point_options(),
                fit_cfg.seed,
                &fit_cfg.bootstrap_options(),
            )
        })
        .await
        .map_err(|e| PipelineError::Task(e.to_string()))??;

        tables::write_json(self.config.weights_path(), &result).await?;
        Ok(result)
    }

    /// `indicators_normalized.csv` → `weights_sigma.json`.
    pub async fn fit(&self) -> Result<FitResult> {
        let normalized = self.load_normalized().await?;
        self.fit_from(normalized).await
    }

    async fn write_coverage(&self, rows: &[LatentRow]) -> Result<Vec<CoverageRow>> {
        let coverage = latent::coverage_by_region(rows);
        if coverage.is_empty() {
            return Err(PipelineError::empty("coverage diagnostics", "latent table has no rows"));
        }
        tables::write_table(self.config.coverage_path(), &coverage).await?;
        Ok(coverage)
    }

    async fn score_rows(&self, rows: &[LatentRow]) -> Result<(ScoreReport, Vec<CoverageRow>)> {
        // Coverage is optional: no data means skip, anything else aborts.
        let coverage = match self.write_coverage(rows).await {
            Ok(coverage) => coverage,
            Err(e) if e.is_empty_data() => {
                warn!("Skipping coverage: {}", e);
                Vec::new()
            }
            Err(e) => return Err(e),
        };

        let report = latent::score(rows, &self.config.composite_params());
        tables::write_table(self.config.scores_path(), &report.rows).await?;
        Ok((report, coverage))
    }

    /// `latents.csv` → `M_timeseries.csv` and `coverage_latents_by_region.csv`.
    pub async fn score(&self) -> Result<ScoreReport> {
        let rows: Vec<LatentRow> = tables::read_table(self.config.latents_path()).await?;
        let (report, _) = self.score_rows(&rows).await?;
        Ok(report)
    }

    pub async fn run(&self, opts: RunOptions) -> Result<RunSummary> {
        let normalized = self.normalize().await?;

        // An empty design matrix aborts the run.
        let fit = if opts.skip_fit {
            None
        } else {
            Some(self.fit_from(normalized.clone()).await?)
        };

        let fitted = if opts.apply_fitted { fit.as_ref() } else { None };
        let rows = self.aggregate(&normalized, fitted)?;
        tables::write_table(self.config.latents_path(), &rows).await?;

        let (scores, coverage) = self.score_rows(&rows).await?;

        info!(
            "Run complete: {} observations, {} latent rows, {} scored",
            normalized.len(),
            rows.len(),
            scores.rows.len()
        );

        Ok(RunSummary {
            normalized: normalized.len(),
            latent_rows: rows.len(),
            fit,
            scores,
            coverage_rows: coverage.len(),
        })
    }
}
