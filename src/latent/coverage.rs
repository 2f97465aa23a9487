//! Per-region coverage of each latent, from pre-imputation data.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Latent, LatentRow};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageRow {
    pub region: String,
    pub cov_kappa: f64,
    pub cov_sigma: f64,
    pub cov_rho: f64,
    pub cov_phi: f64,
}

/// Fraction of each region's rows carrying a value, per latent. Rows come
/// out sorted by region.
pub fn coverage_by_region(rows: &[LatentRow]) -> Vec<CoverageRow> {
    let mut counts: BTreeMap<&str, (usize, [usize; 4])> = BTreeMap::new();
    for row in rows {
        let (total, present) = counts.entry(row.region.as_str()).or_default();
        *total += 1;
        for (slot, latent) in present.iter_mut().zip(Latent::ALL) {
            if row.get(latent).is_some() {
                *slot += 1;
            }
        }
    }

    counts
        .into_iter()
        .map(|(region, (total, present))| {
            let frac = |n: usize| n as f64 / total as f64;
            CoverageRow {
                region: region.to_string(),
                cov_kappa: frac(present[0]),
                cov_sigma: frac(present[1]),
                cov_rho: frac(present[2]),
                cov_phi: frac(present[3]),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fractions_per_region() {
        let mut a0 = LatentRow::empty("A", 2000);
        a0.kappa = Some(0.1);
        a0.sigma = Some(0.2);
        let mut a1 = LatentRow::empty("A", 2001);
        a1.kappa = Some(0.3);
        let mut b0 = LatentRow::empty("B", 2000);
        b0.phi = Some(0.9);

        let cov = coverage_by_region(&[b0, a0, a1]);
        assert_eq!(cov.len(), 2);
        assert_eq!(cov[0].region, "A");
        assert_eq!(cov[0].cov_kappa, 1.0);
        assert_eq!(cov[0].cov_sigma, 0.5);
        assert_eq!(cov[0].cov_phi, 0.0);
        assert_eq!(cov[1].region, "B");
        assert_eq!(cov[1].cov_phi, 1.0);
        assert_eq!(cov[1].cov_rho, 0.0);
    }

    #[test]
    fn test_empty_table_has_no_rows() {
        assert!(coverage_by_region(&[]).is_empty());
    }
}
