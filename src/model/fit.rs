//! Weight Fitter
//!
//! Learns simplex-constrained indicator weights for one latent by projected
//! gradient descent on `KL(Q, softmax(M·w))`. The target `Q` comes from the
//! data itself: the softmax of each row's equal-weighted mean.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, warn};

use super::objective::{softmax, Objective, STABILIZER};
use super::simplex::project_simplex;
use crate::error::{PipelineError, Result};
use crate::etl::NormalizedObservation;

/// Per-coordinate probe width for the central finite difference.
pub const FD_DELTA: f64 = 1e-3;

/// Iterations between learning-rate halvings.
pub const LR_HALVING_PERIOD: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GradientMode {
    /// Central differences with each probe re-projected onto the simplex
    #[default]
    FiniteDifference,
    /// Closed-form gradient of the softmax/KL composition
    Analytic,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitOptions {
    pub max_iter: usize,
    pub lr: f64,
    pub tol: f64,
    pub gradient: GradientMode,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            max_iter: 500,
            lr: 0.1,
            tol: 1e-6,
            gradient: GradientMode::FiniteDifference,
        }
    }
}

/// Rows are (region, year) cells observed for every indicator; columns
/// follow `indicator_ids`.
#[derive(Debug, Clone)]
pub struct DesignMatrix {
    pub indicator_ids: Vec<String>,
    pub keys: Vec<(String, i32)>,
    pub values: Array2<f64>,
}

impl DesignMatrix {
    /// Inner join of the indicators' normalized series on (region, year).
    ///
    /// Row order follows the first indicator's observations. Any row missing
    /// a value in any column is dropped.
    pub fn build(observations: &[NormalizedObservation], indicator_ids: &[String]) -> Result<Self> {
        let Some(first) = indicator_ids.first() else {
            return Err(PipelineError::Precondition(
                "design matrix needs at least one indicator".to_string(),
            ));
        };

        let mut series: HashMap<&str, HashMap<(&str, i32), f64>> = indicator_ids
            .iter()
            .map(|id| (id.as_str(), HashMap::new()))
            .collect();
        let mut row_index: Vec<(&str, i32)> = Vec::new();

        for obs in observations {
            if let Some(column) = series.get_mut(obs.id.as_str()) {
                let key = (obs.region.as_str(), obs.year);
                if column.insert(key, obs.norm).is_none() && obs.id == *first {
                    row_index.push(key);
                }
            }
        }

        for id in indicator_ids {
            if series[id.as_str()].is_empty() {
                warn!("Indicator '{}' has no normalized observations", id);
            }
        }

        let mut keys = Vec::new();
        let mut flat = Vec::new();
        for key in row_index {
            let row: Option<Vec<f64>> = indicator_ids
                .iter()
                .map(|id| series[id.as_str()].get(&key).copied())
                .collect();
            if let Some(row) = row {
                keys.push((key.0.to_string(), key.1));
                flat.extend(row);
            }
        }

        if keys.is_empty() {
            return Err(PipelineError::empty(
                "weight fitting",
                format!(
                    "no (region, year) observed for all of [{}]; ensure ids align with normalized data",
                    indicator_ids.join(", ")
                ),
            ));
        }

        let values = Array2::from_shape_vec((keys.len(), indicator_ids.len()), flat)
            .map_err(|e| PipelineError::Precondition(format!("design matrix shape: {}", e)))?;

        debug!(
            "Design matrix: {} complete rows x {} indicators",
            values.nrows(),
            values.ncols()
        );

        Ok(Self {
            indicator_ids: indicator_ids.to_vec(),
            keys,
            values,
        })
    }

    pub fn target(&self) -> Array1<f64> {
        target_distribution(self.values.view())
    }
}

/// Softmax over rows of each row's mean: what a naive equal-weighted
/// combination would imply.
pub fn target_distribution(m: ArrayView2<'_, f64>) -> Array1<f64> {
    match m.mean_axis(Axis(1)) {
        Some(avg) => softmax(avg.view()),
        None => Array1::zeros(m.nrows()),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeightFit {
    pub weights: Array1<f64>,
    /// Loss at `weights`
    pub loss: f64,
    pub iterations: usize,
}

impl<'a> Objective<'a> {
    fn finite_difference_gradient(&self, w: ArrayView1<'_, f64>) -> Result<Array1<f64>> {
        let mut grad = Array1::zeros(w.len());
        for i in 0..w.len() {
            let mut plus = w.to_owned();
            plus[i] += FD_DELTA;
            let mut minus = w.to_owned();
            minus[i] -= FD_DELTA;

            let plus = project_simplex(plus.view())?;
            let minus = project_simplex(minus.view())?;
            let span = (&plus - &minus).mapv(|d| d * d).sum().sqrt();

            grad[i] = (self.loss(plus.view()) - self.loss(minus.view())) / (span + STABILIZER);
        }
        Ok(grad)
    }

    pub fn gradient(&self, w: ArrayView1<'_, f64>, mode: GradientMode) -> Result<Array1<f64>> {
        match mode {
            GradientMode::FiniteDifference => self.finite_difference_gradient(w),
            GradientMode::Analytic => Ok(self.analytic_gradient(w)),
        }
    }
}

/// Projected gradient descent from a random simplex point drawn from `rng`.
pub fn fit_weights<'a, R: Rng + ?Sized>(
    m: ArrayView2<'a, f64>,
    q: ArrayView1<'a, f64>,
    opts: &FitOptions,
    rng: &mut R,
) -> Result<WeightFit> {
    if m.nrows() == 0 || m.ncols() == 0 {
        return Err(PipelineError::empty(
            "weight fitting",
            format!("design matrix is {}x{}", m.nrows(), m.ncols()),
        ));
    }
    if m.nrows() != q.len() {
        return Err(PipelineError::Precondition(format!(
            "target has {} entries for {} rows",
            q.len(),
            m.nrows()
        )));
    }

    let objective = Objective::new(m, q);
    let init: Array1<f64> = (0..m.ncols()).map(|_| rng.gen::<f64>()).collect();
    let mut w = project_simplex(init.view())?;

    let mut lr = opts.lr;
    let mut prev = f64::INFINITY;
    let mut iterations = 0;

    for t in 0..opts.max_iter {
        let loss = objective.loss(w.view());
        iterations = t + 1;
        if (prev - loss).abs() < opts.tol {
            debug!("Converged after {} iterations (loss {:.3e})", iterations, loss);
            break;
        }
        prev = loss;

        let grad = objective.gradient(w.view(), opts.gradient)?;
        w = project_simplex((&w - &(grad * lr)).view())?;

        if (t + 1) % LR_HALVING_PERIOD == 0 {
            lr *= 0.5;
        }
    }

    let loss = objective.loss(w.view());
    Ok(WeightFit {
        weights: w,
        loss,
        iterations,
    })
}

/// Snapshot of one fitting run, written once as `weights_sigma.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    #[serde(alias = "sigma_ids")]
    pub indicator_ids: Vec<String>,
    pub weights_point: Vec<f64>,
    pub weights_bootstrap_mean: Vec<f64>,
    pub weights_ci95_lo: Vec<f64>,
    pub weights_ci95_hi: Vec<f64>,
    pub loss: f64,
    pub boot_loss_mean: f64,
}
