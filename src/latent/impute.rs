//! Imputation & Clamping
//!
//! Per latent column: temporal interpolation within each region, region mean
//! fill, global median fill, then clamp to [0, 1]. Rows keep their input order.

use std::collections::BTreeMap;
use tracing::debug;

use super::{Latent, LatentRow};

/// Fill gaps in one region's series, given in year order.
///
/// Interior gaps interpolate linearly in year between the nearest observed
/// neighbours; leading and trailing gaps take the nearest observed value.
pub fn interpolate_series(years: &[i32], values: &mut [Option<f64>]) {
    debug_assert_eq!(years.len(), values.len());
    let observed: Vec<(usize, f64)> = values
        .iter()
        .enumerate()
        .filter_map(|(i, v)| v.map(|v| (i, v)))
        .collect();
    if observed.is_empty() {
        return;
    }

    for i in 0..values.len() {
        if values[i].is_some() {
            continue;
        }
        let next = observed.partition_point(|&(j, _)| j < i);
        let filled = match (next.checked_sub(1).map(|p| observed[p]), observed.get(next)) {
            (Some((i0, v0)), Some(&(i1, v1))) => {
                let (y0, y1) = (years[i0] as f64, years[i1] as f64);
                if y1 == y0 {
                    v0
                } else {
                    v0 + (v1 - v0) * (years[i] as f64 - y0) / (y1 - y0)
                }
            }
            (Some((_, v0)), None) => v0,
            (None, Some(&(_, v1))) => v1,
            (None, None) => continue,
        };
        values[i] = Some(filled);
    }
}

fn mean(values: &[f64]) -> Option<f64> {
    (!values.is_empty()).then(|| values.iter().sum::<f64>() / values.len() as f64)
}

pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    Some(if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    })
}

/// Row indices per region, each group sorted by year (stable on ties).
fn partition_by_region(rows: &[LatentRow]) -> BTreeMap<&str, Vec<usize>> {
    let mut groups: BTreeMap<&str, Vec<usize>> = BTreeMap::new();
    for (i, row) in rows.iter().enumerate() {
        groups.entry(row.region.as_str()).or_default().push(i);
    }
    for indices in groups.values_mut() {
        indices.sort_by_key(|&i| rows[i].year);
    }
    groups
}

fn impute_column(rows: &mut [LatentRow], groups: &BTreeMap<&str, Vec<usize>>, latent: Latent) {
    let mut column: Vec<Option<f64>> = rows.iter().map(|r| r.get(latent)).collect();

    for indices in groups.values() {
        let years: Vec<i32> = indices.iter().map(|&i| rows[i].year).collect();
        let mut series: Vec<Option<f64>> = indices.iter().map(|&i| column[i]).collect();

        interpolate_series(&years, &mut series);

        let present: Vec<f64> = series.iter().flatten().copied().collect();
        if let Some(region_mean) = mean(&present) {
            for v in series.iter_mut().filter(|v| v.is_none()) {
                *v = Some(region_mean);
            }
        }

        for (&i, v) in indices.iter().zip(series) {
            column[i] = v;
        }
    }

    let present: Vec<f64> = column.iter().flatten().copied().collect();
    let unresolved = column.iter().filter(|v| v.is_none()).count();
    if unresolved > 0 {
        match median(&present) {
            Some(global) => {
                debug!("Latent '{}': {} cells filled with global median {:.4}", latent, unresolved, global);
                for v in column.iter_mut().filter(|v| v.is_none()) {
                    *v = Some(global);
                }
            }
            None => debug!("Latent '{}' has no observations; left missing", latent),
        }
    }

    for (row, v) in rows.iter_mut().zip(column) {
        row.set(latent, v.map(|x| x.clamp(0.0, 1.0)));
    }
}

/// Impute every latent column and clamp to [0, 1].
pub fn impute_and_clamp(rows: &[LatentRow]) -> Vec<LatentRow> {
    let mut out = rows.to_vec();
    let groups = partition_by_region(rows);
    for latent in Latent::ALL {
        impute_column(&mut out, &groups, latent);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(region: &str, year: i32, k: Option<f64>, s: Option<f64>, r: Option<f64>, p: Option<f64>) -> LatentRow {
        LatentRow { region: region.into(), year, kappa: k, sigma: s, rho: r, phi: p }
    }

    #[test]
    fn test_interpolate_interior_by_year() {
        let years = [2000, 2001, 2004];
        let mut v = [Some(0.0), None, Some(0.8)];
        interpolate_series(&years, &mut v);
        assert!((v[1].unwrap() - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_interpolate_flat_at_both_ends() {
        let years = [2000, 2001, 2002, 2003];
        let mut v = [None, Some(0.4), Some(0.6), None];
        interpolate_series(&years, &mut v);
        assert_eq!(v, [Some(0.4), Some(0.4), Some(0.6), Some(0.6)]);
    }

    #[test]
    fn test_one_observed_one_missing_takes_observed() {
        let rows = vec![
            row("A", 2001, Some(0.3), None, None, None),
            row("A", 2000, None, None, None, None),
        ];
        let out = impute_and_clamp(&rows);
        assert_eq!(out[1].kappa, Some(0.3));
        // Original order preserved.
        assert_eq!(out[0].year, 2001);
        assert_eq!(out[1].year, 2000);
    }

    #[test]
    fn test_region_without_observations_gets_global_median() {
        let rows = vec![
            row("A", 2000, None, Some(0.1), None, None),
            row("B", 2000, None, Some(0.4), None, None),
            row("C", 2000, None, Some(0.9), None, None),
            row("D", 2000, None, None, None, None),
            row("D", 2001, None, None, None, None),
        ];
        let out = impute_and_clamp(&rows);
        assert_eq!(out[3].sigma, Some(0.4));
        assert_eq!(out[4].sigma, Some(0.4));
        let median = out[3].sigma.unwrap();
        assert!((0.1..=0.9).contains(&median));
        // No data anywhere stays missing.
        assert_eq!(out[3].kappa, None);
    }

    #[test]
    fn test_clamps_to_unit_interval() {
        let rows = vec![row("A", 2000, Some(1.4), Some(-0.2), Some(0.5), Some(0.5))];
        let out = impute_and_clamp(&rows);
        assert_eq!(out[0].kappa, Some(1.0));
        assert_eq!(out[0].sigma, Some(0.0));
    }

    #[test]
    fn test_median_even_and_odd() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
