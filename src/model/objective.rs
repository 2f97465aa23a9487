//! Softmax / KL Objective
//!
//! The loss surface for weight fitting: `KL(Q, softmax(M·w))` where `Q` is a
//! fixed target distribution over design-matrix rows.

use ndarray::{Array1, ArrayView1, ArrayView2};

/// Added to softmax denominators and used as the clip floor before logs.
pub const STABILIZER: f64 = 1e-12;

pub fn softmax(x: ArrayView1<'_, f64>) -> Array1<f64> {
    let max = x.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let ex = x.mapv(|v| (v - max).exp());
    let denom = ex.sum() + STABILIZER;
    ex / denom
}

/// `Σ Q_i (log Q_i − log P_i)` with both sides clipped to `[1e-12, 1]`.
pub fn kl_div(q: ArrayView1<'_, f64>, p: ArrayView1<'_, f64>) -> f64 {
    debug_assert_eq!(q.len(), p.len());
    q.iter()
        .zip(p.iter())
        .map(|(&qi, &pi)| {
            let qi = qi.clamp(STABILIZER, 1.0);
            let pi = pi.clamp(STABILIZER, 1.0);
            qi * (qi.ln() - pi.ln())
        })
        .sum()
}

/// Binds a design matrix to its target distribution.
#[derive(Debug, Clone, Copy)]
pub struct Objective<'a> {
    m: ArrayView2<'a, f64>,
    q: ArrayView1<'a, f64>,
}

impl<'a> Objective<'a> {
    pub fn new(m: ArrayView2<'a, f64>, q: ArrayView1<'a, f64>) -> Self {
        debug_assert_eq!(m.nrows(), q.len());
        Self { m, q }
    }

    pub fn ncols(&self) -> usize {
        self.m.ncols()
    }

    /// Distribution implied by weights `w`.
    pub fn predict(&self, w: ArrayView1<'_, f64>) -> Array1<f64> {
        softmax(self.m.dot(&w).view())
    }

    pub fn loss(&self, w: ArrayView1<'_, f64>) -> f64 {
        kl_div(self.q, self.predict(w).view())
    }

    /// Closed-form gradient of the loss in `w`, ignoring the clip floor:
    /// `Mᵀ (P·ΣQ − Q)`.
    pub fn analytic_gradient(&self, w: ArrayView1<'_, f64>) -> Array1<f64> {
        let p = self.predict(w);
        let q_mass = self.q.sum();
        let residual = p * q_mass - &self.q;
        self.m.t().dot(&residual)
    }
}
