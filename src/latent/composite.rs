//! Composite Score
//!
//! `M_raw = (kappa / (sigma + ε)) * rho * phi`, clipped into `M`. Only rows
//! with enough pre-imputation signal are scored.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::impute::impute_and_clamp;
use super::LatentRow;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompositeParams {
    pub epsilon: f64,
    pub min_signals: usize,
    pub clip_lo: f64,
    pub clip_hi: f64,
}

impl Default for CompositeParams {
    fn default() -> Self {
        Self {
            epsilon: 0.05,
            min_signals: 2,
            clip_lo: -0.1,
            clip_hi: 0.1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub region: String,
    pub year: i32,
    #[serde(rename = "M_raw")]
    pub m_raw: f64,
    #[serde(rename = "M")]
    pub m: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScoreReport {
    pub rows: Vec<ScoreRow>,
    /// Rows gated out for having fewer than `min_signals` latents
    pub skipped_insufficient_signal: usize,
    /// Rows with a latent that imputation could not fill
    pub skipped_unresolved: usize,
}

pub fn composite(kappa: f64, sigma: f64, rho: f64, phi: f64, epsilon: f64) -> f64 {
    (kappa / (sigma + epsilon)) * rho * phi
}

/// Gate on the raw table, impute, then score the surviving rows in table order.
pub fn score(latents: &[LatentRow], params: &CompositeParams) -> ScoreReport {
    let imputed = impute_and_clamp(latents);
    let mut report = ScoreReport::default();

    for (original, filled) in latents.iter().zip(&imputed) {
        if original.signal_count() < params.min_signals {
            report.skipped_insufficient_signal += 1;
            continue;
        }
        let (Some(kappa), Some(sigma), Some(rho), Some(phi)) =
            (filled.kappa, filled.sigma, filled.rho, filled.phi)
        else {
            report.skipped_unresolved += 1;
            continue;
        };

        let m_raw = composite(kappa, sigma, rho, phi, params.epsilon);
        report.rows.push(ScoreRow {
            region: filled.region.clone(),
            year: filled.year,
            m_raw,
            m: m_raw.clamp(params.clip_lo, params.clip_hi),
        });
    }

    if report.skipped_insufficient_signal > 0 {
        debug!(
            "{} rows below {} signals excluded from scoring",
            report.skipped_insufficient_signal, params.min_signals
        );
    }
    info!(
        "Scored {} rows ({} gated, {} unresolved)",
        report.rows.len(),
        report.skipped_insufficient_signal,
        report.skipped_unresolved
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(region: &str, year: i32, k: Option<f64>, s: Option<f64>, r: Option<f64>, p: Option<f64>) -> LatentRow {
        LatentRow { region: region.into(), year, kappa: k, sigma: s, rho: r, phi: p }
    }

    #[test]
    fn test_worked_example_clips() {
        let m_raw = composite(0.9, 0.2, 0.7, 0.6, 0.01);
        assert!((m_raw - 1.8).abs() < 1e-9);

        let params = CompositeParams { epsilon: 0.01, ..CompositeParams::default() };
        let report = score(&[row("A", 2000, Some(0.9), Some(0.2), Some(0.7), Some(0.6))], &params);
        assert_eq!(report.rows.len(), 1);
        assert!((report.rows[0].m_raw - 1.8).abs() < 1e-9);
        assert_eq!(report.rows[0].m, 0.1);
    }

    #[test]
    fn test_signal_gate_one_excluded_two_included() {
        let rows = vec![
            row("A", 2000, Some(0.5), Some(0.5), Some(0.5), Some(0.5)),
            row("B", 2000, Some(0.4), None, None, None),
            row("C", 2000, Some(0.4), Some(0.3), None, None),
        ];
        let report = score(&rows, &CompositeParams::default());
        let regions: Vec<&str> = report.rows.iter().map(|r| r.region.as_str()).collect();
        assert_eq!(regions, vec!["A", "C"]);
        assert_eq!(report.skipped_insufficient_signal, 1);
        assert_eq!(report.skipped_unresolved, 0);
    }

    #[test]
    fn test_custom_gate_and_clip() {
        let rows = vec![row("A", 2000, Some(0.2), Some(0.5), Some(0.5), None)];
        let params = CompositeParams { min_signals: 4, ..CompositeParams::default() };
        assert!(score(&rows, &params).rows.is_empty());

        let rows = vec![row("A", 2000, Some(0.2), Some(0.5), Some(0.5), Some(0.5))];
        let params = CompositeParams { clip_lo: -1.0, clip_hi: 1.0, ..CompositeParams::default() };
        let out = score(&rows, &params);
        let expected = (0.2 / 0.55) * 0.25;
        assert!((out.rows[0].m - expected).abs() < 1e-12);
    }

    #[test]
    fn test_globally_absent_latent_unresolved() {
        let rows = vec![row("A", 2000, Some(0.5), Some(0.5), Some(0.5), None)];
        let report = score(&rows, &CompositeParams::default());
        assert!(report.rows.is_empty());
        assert_eq!(report.skipped_unresolved, 1);
    }
}
