//! Pipeline Configuration
//!
//! Latent definitions are a declarative mapping from latent name to a
//! weighted indicator list. The document is validated once at load time;
//! downstream stages only ever see a `PipelineConfig` that passed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::{PipelineError, Result};
use crate::latent::composite::CompositeParams;
use crate::latent::Latent;
use crate::model::{BootstrapOptions, FitOptions, FitResult, GradientMode};

fn default_weight() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorWeight {
    pub id: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LatentSpec {
    #[serde(default)]
    pub indicators: Vec<IndicatorWeight>,
}

impl LatentSpec {
    pub fn indicator_ids(&self) -> Vec<String> {
        self.indicators.iter().map(|i| i.id.clone()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "OutputConfig::default_raw_dir")]
    pub raw_dir: PathBuf,
    pub interim_dir: PathBuf,
    pub processed_dir: PathBuf,
    #[serde(default = "OutputConfig::default_epsilon")]
    pub epsilon: f64,
}

impl OutputConfig {
    fn default_raw_dir() -> PathBuf {
        PathBuf::from("data/raw")
    }

    fn default_epsilon() -> f64 {
        0.05
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoreConfig {
    /// Minimum non-missing pre-imputation latents for a row to be scored
    pub min_signals: usize,
    /// Lower and upper clip bounds for M
    pub clip: [f64; 2],
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            min_signals: 2,
            clip: [-0.1, 0.1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BootstrapConfig {
    pub trials: usize,
    pub max_iter: usize,
    pub lr: f64,
    /// Seed for the resampling indices, independent of the point-fit seed
    pub seed: u64,
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            trials: 50,
            max_iter: 200,
            lr: 0.2,
            seed: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FitConfig {
    pub max_iter: usize,
    pub lr: f64,
    pub tol: f64,
    pub seed: u64,
    pub gradient: GradientMode,
    pub bootstrap: BootstrapConfig,
}

impl Default for FitConfig {
    fn default() -> Self {
        Self {
            max_iter: 300,
            lr: 0.2,
            tol: 1e-6,
            seed: 42,
            gradient: GradientMode::FiniteDifference,
            bootstrap: BootstrapConfig::default(),
        }
    }
}

impl FitConfig {
    pub fn point_options(&self) -> FitOptions {
        FitOptions {
            max_iter: self.max_iter,
            lr: self.lr,
            tol: self.tol,
            gradient: self.gradient,
        }
    }

    pub fn bootstrap_options(&self) -> BootstrapOptions {
        BootstrapOptions {
            trials: self.bootstrap.trials,
            fit: FitOptions {
                max_iter: self.bootstrap.max_iter,
                lr: self.bootstrap.lr,
                tol: self.tol,
                gradient: self.gradient,
            },
            resample_seed: self.bootstrap.seed,
            init_seed: self.seed,
        }
    }
}

/// The document as written on disk, before validation.
#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    latents: BTreeMap<String, LatentSpec>,
    output: OutputConfig,
    #[serde(default)]
    score: ScoreConfig,
    #[serde(default)]
    fit: FitConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub latents: BTreeMap<Latent, LatentSpec>,
    pub output: OutputConfig,
    pub score: ScoreConfig,
    pub fit: FitConfig,
}

impl PipelineConfig {
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                PipelineError::MissingInput(format!("config file {}", path.display()))
            } else {
                PipelineError::io(path, e)
            }
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!("Loaded config from {:?} ({} latents)", path, config.latents.len());
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(content)?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        if raw.latents.is_empty() {
            return Err(PipelineError::InvalidConfig("no latents configured".to_string()));
        }

        let mut latents = BTreeMap::new();
        for (name, spec) in raw.latents {
            let latent: Latent = name.parse()?;
            if spec.indicators.is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "latent '{}' has no indicators",
                    latent
                )));
            }
            for ind in &spec.indicators {
                if ind.id.trim().is_empty() {
                    return Err(PipelineError::InvalidConfig(format!(
                        "latent '{}' has an indicator with an empty id",
                        latent
                    )));
                }
                if !ind.weight.is_finite() || ind.weight < 0.0 {
                    return Err(PipelineError::InvalidConfig(format!(
                        "indicator '{}' of latent '{}' has invalid weight {}",
                        ind.id, latent, ind.weight
                    )));
                }
            }
            if latents.insert(latent, spec).is_some() {
                return Err(PipelineError::InvalidConfig(format!(
                    "latent '{}' configured twice",
                    latent
                )));
            }
        }

        for latent in Latent::ALL {
            if !latents.contains_key(&latent) {
                return Err(PipelineError::MissingInput(format!("latent '{}' in config", latent)));
            }
        }

        if !raw.output.epsilon.is_finite() || raw.output.epsilon <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "epsilon must be a positive number, got {}",
                raw.output.epsilon
            )));
        }

        let [lo, hi] = raw.score.clip;
        if !(lo.is_finite() && hi.is_finite() && lo <= hi) {
            return Err(PipelineError::InvalidConfig(format!(
                "clip bounds [{}, {}] are not an ordered finite interval",
                lo, hi
            )));
        }
        if raw.score.min_signals > Latent::ALL.len() {
            return Err(PipelineError::InvalidConfig(format!(
                "min_signals {} exceeds the number of latents",
                raw.score.min_signals
            )));
        }

        if raw.fit.lr <= 0.0 || raw.fit.bootstrap.lr <= 0.0 {
            return Err(PipelineError::InvalidConfig("learning rates must be positive".to_string()));
        }
        if raw.fit.bootstrap.trials == 0 {
            return Err(PipelineError::InvalidConfig(
                "bootstrap needs at least one trial".to_string(),
            ));
        }

        debug!("Config validated: {:?}", latents.keys().collect::<Vec<_>>());

        Ok(Self {
            latents,
            output: raw.output,
            score: raw.score,
            fit: raw.fit,
        })
    }

    pub fn spec(&self, latent: Latent) -> &LatentSpec {
        // Presence of every latent is checked in `validate`.
        &self.latents[&latent]
    }

    pub fn sigma_ids(&self) -> Vec<String> {
        self.spec(Latent::Sigma).indicator_ids()
    }

    pub fn composite_params(&self) -> CompositeParams {
        CompositeParams {
            epsilon: self.output.epsilon,
            min_signals: self.score.min_signals,
            clip_lo: self.score.clip[0],
            clip_hi: self.score.clip[1],
        }
    }

    /// Replace the σ indicator weights with the point estimate of a fit.
    pub fn apply_fitted_sigma(&mut self, fit: &FitResult) -> Result<()> {
        let spec = self
            .latents
            .get_mut(&Latent::Sigma)
            .ok_or_else(|| PipelineError::MissingInput("latent 'sigma' in config".to_string()))?;

        if fit.indicator_ids.len() != fit.weights_point.len() {
            return Err(PipelineError::InvalidConfig(
                "fit result has mismatched ids and weights".to_string(),
            ));
        }

        for ind in spec.indicators.iter_mut() {
            let pos = fit
                .indicator_ids
                .iter()
                .position(|id| id == &ind.id)
                .ok_or_else(|| {
                    PipelineError::InvalidConfig(format!(
                        "fit result has no weight for sigma indicator '{}'",
                        ind.id
                    ))
                })?;
            ind.weight = fit.weights_point[pos];
        }
        info!("Applied fitted sigma weights: {:?}", fit.weights_point);
        Ok(())
    }

    pub fn normalized_path(&self) -> PathBuf {
        self.output.interim_dir.join(crate::tables::NORMALIZED_TABLE)
    }

    pub fn latents_path(&self) -> PathBuf {
        self.output.processed_dir.join(crate::tables::LATENTS_TABLE)
    }

    pub fn scores_path(&self) -> PathBuf {
        self.output.processed_dir.join(crate::tables::SCORES_TABLE)
    }

    pub fn coverage_path(&self) -> PathBuf {
        self.output.processed_dir.join(crate::tables::COVERAGE_TABLE)
    }

    pub fn weights_path(&self) -> PathBuf {
        self.output.processed_dir.join(crate::tables::WEIGHTS_FILE)
    }
}
