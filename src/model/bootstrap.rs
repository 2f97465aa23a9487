//! Bootstrap Estimator
//!
//! Refits weights on row resamples of `(M, Q)` and summarizes the spread.
//! Trials run on the rayon pool; trial `b` draws its resampling indices from
//! a generator seeded by `(resample_seed, b)`, so results do not depend on
//! scheduling.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use tracing::debug;

use super::fit::{fit_weights, FitOptions, WeightFit};
use super::objective::STABILIZER;
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapOptions {
    pub trials: usize,
    pub fit: FitOptions,
    /// Seed for resampling indices
    pub resample_seed: u64,
    /// Seed for each trial's initial weights
    pub init_seed: u64,
}

impl Default for BootstrapOptions {
    fn default() -> Self {
        Self {
            trials: 100,
            fit: FitOptions::default(),
            resample_seed: 0,
            init_seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BootstrapSummary {
    pub mean: Array1<f64>,
    pub ci95_lo: Array1<f64>,
    pub ci95_hi: Array1<f64>,
    pub loss_mean: f64,
}

fn trial_seed(base: u64, trial: usize) -> u64 {
    base ^ (trial as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

fn run_trial(
    m: ArrayView2<'_, f64>,
    q: ArrayView1<'_, f64>,
    opts: &BootstrapOptions,
    trial: usize,
) -> Result<WeightFit> {
    let n = m.nrows();
    let mut rng = StdRng::seed_from_u64(trial_seed(opts.resample_seed, trial));
    let idx: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();

    let mb = m.select(Axis(0), &idx);
    let mut qb = q.select(Axis(0), &idx);
    let mass = qb.sum() + STABILIZER;
    qb /= mass;

    let mut init = StdRng::seed_from_u64(opts.init_seed);
    fit_weights(mb.view(), qb.view(), &opts.fit, &mut init)
}

/// Linear interpolation between order statistics, `p` in percent.
pub fn percentile(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        n => {
            let pos = (p / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
        }
    }
}

pub fn bootstrap(
    m: ArrayView2<'_, f64>,
    q: ArrayView1<'_, f64>,
    opts: &BootstrapOptions,
) -> Result<BootstrapSummary> {
    if opts.trials == 0 {
        return Err(PipelineError::Precondition("bootstrap needs at least one trial".to_string()));
    }
    if m.nrows() == 0 {
        return Err(PipelineError::empty("bootstrap", "design matrix has no rows"));
    }

    let fits = (0..opts.trials)
        .into_par_iter()
        .map(|b| run_trial(m, q, opts, b))
        .collect::<Result<Vec<_>>>()?;

    let k = m.ncols();
    let weights = Array2::from_shape_fn((fits.len(), k), |(i, j)| fits[i].weights[j]);
    let mean = weights
        .mean_axis(Axis(0))
        .ok_or_else(|| PipelineError::empty("bootstrap", "no trial results"))?;

    let mut ci95_lo = Array1::zeros(k);
    let mut ci95_hi = Array1::zeros(k);
    for (j, column) in weights.axis_iter(Axis(1)).enumerate() {
        let mut sorted = column.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));
        ci95_lo[j] = percentile(&sorted, 2.5);
        ci95_hi[j] = percentile(&sorted, 97.5);
    }

    let loss_mean = fits.iter().map(|f| f.loss).sum::<f64>() / fits.len() as f64;
    debug!("Bootstrap: {} trials, mean loss {:.3e}", fits.len(), loss_mean);

    Ok(BootstrapSummary {
        mean,
        ci95_lo,
        ci95_hi,
        loss_mean,
    })
}
