//! Model Module
//!
//! Simplex projection, the softmax/KL objective, the σ weight fitter and
//! its bootstrap.

pub mod bootstrap;
pub mod fit;
pub mod objective;
pub mod simplex;

pub use bootstrap::{bootstrap, BootstrapOptions, BootstrapSummary};
pub use fit::{fit_weights, target_distribution, DesignMatrix, FitOptions, FitResult, GradientMode, WeightFit};
pub use objective::{kl_div, softmax, Objective};
pub use simplex::project_simplex;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::error::Result;
use crate::etl::NormalizedObservation;

/// Point fit plus bootstrap for one latent's indicators.
pub fn fit_latent_weights(
    observations: &[NormalizedObservation],
    indicator_ids: &[String],
    point: &FitOptions,
    point_seed: u64,
    boot: &BootstrapOptions,
) -> Result<FitResult> {
    let design = DesignMatrix::build(observations, indicator_ids)?;
    let q = design.target();

    let mut rng = StdRng::seed_from_u64(point_seed);
    let fit = fit_weights(design.values.view(), q.view(), point, &mut rng)?;
    info!(
        "Point fit over {} rows: loss {:.4e} after {} iterations",
        design.values.nrows(),
        fit.loss,
        fit.iterations
    );

    let summary = bootstrap(design.values.view(), q.view(), boot)?;
    info!("Bootstrap over {} trials: mean loss {:.4e}", boot.trials, summary.loss_mean);

    Ok(FitResult {
        indicator_ids: design.indicator_ids,
        weights_point: fit.weights.to_vec(),
        weights_bootstrap_mean: summary.mean.to_vec(),
        weights_ci95_lo: summary.ci95_lo.to_vec(),
        weights_ci95_hi: summary.ci95_hi.to_vec(),
        loss: fit.loss,
        boot_loss_mean: summary.loss_mean,
    })
}
