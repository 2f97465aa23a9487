//! Indicator Normalizer
//!
//! Min-max scales each indicator independently over every (region, year)
//! it was observed at.

use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use super::{NormalizedObservation, Observation};

/// Normalize observations per indicator id.
///
/// Incomplete rows are dropped first, then duplicate (region, year, id)
/// keys keep their first occurrence. A zero-range indicator normalizes to
/// all zeros. Output preserves input order.
pub fn normalize(observations: &[Observation]) -> Vec<NormalizedObservation> {
    let mut seen: HashSet<(&str, i32, &str)> = HashSet::with_capacity(observations.len());
    let mut kept: Vec<&Observation> = Vec::with_capacity(observations.len());
    let mut incomplete = 0usize;
    let mut duplicates = 0usize;

    for obs in observations {
        if !obs.is_complete() {
            incomplete += 1;
            continue;
        }
        if !seen.insert((obs.region.as_str(), obs.year, obs.id.as_str())) {
            duplicates += 1;
            continue;
        }
        kept.push(obs);
    }

    if incomplete > 0 {
        debug!("Dropped {} incomplete observations", incomplete);
    }
    if duplicates > 0 {
        warn!("Dropped {} duplicate (region, year, id) observations", duplicates);
    }

    let mut ranges: HashMap<&str, (f64, f64)> = HashMap::new();
    for &obs in &kept {
        ranges
            .entry(obs.id.as_str())
            .and_modify(|(lo, hi)| {
                *lo = lo.min(obs.value);
                *hi = hi.max(obs.value);
            })
            .or_insert((obs.value, obs.value));
    }

    for (id, (lo, hi)) in &ranges {
        if hi == lo {
            debug!("Indicator '{}' has zero range ({}); normalizing to 0", id, lo);
        }
    }

    let normalized: Vec<NormalizedObservation> = kept
        .into_iter()
        .map(|obs| {
            let (lo, hi) = ranges[obs.id.as_str()];
            // Halved so ranges wider than f64::MAX stay finite.
            let span = hi / 2.0 - lo / 2.0;
            let norm = if span == 0.0 {
                0.0
            } else {
                ((obs.value / 2.0 - lo / 2.0) / span).clamp(0.0, 1.0)
            };
            NormalizedObservation {
                region: obs.region.clone(),
                year: obs.year,
                value: obs.value,
                id: obs.id.clone(),
                norm,
            }
        })
        .collect();

    info!(
        "Normalized {} observations across {} indicators",
        normalized.len(),
        ranges.len()
    );
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Observation> {
        vec![
            Observation::new("USA", 2000, "GDP", 10.0),
            Observation::new("USA", 2001, "GDP", 20.0),
            Observation::new("FRA", 2000, "GDP", 30.0),
            Observation::new("USA", 2000, "FLAT", 5.0),
            Observation::new("FRA", 2000, "FLAT", 5.0),
            Observation::new("FRA", 2001, "NEG", -4.0),
            Observation::new("USA", 2001, "NEG", 4.0),
        ]
    }

    #[test]
    fn test_norms_in_unit_interval() {
        let out = normalize(&sample());
        assert_eq!(out.len(), 7);
        assert!(out.iter().all(|o| (0.0..=1.0).contains(&o.norm)));
        assert_eq!(out[0].norm, 0.0);
        assert_eq!(out[1].norm, 0.5);
        assert_eq!(out[2].norm, 1.0);
        assert_eq!(out[5].norm, 0.0);
        assert_eq!(out[6].norm, 1.0);
    }

    #[test]
    fn test_constant_group_is_zero() {
        let out = normalize(&sample());
        let flat: Vec<f64> = out.iter().filter(|o| o.id == "FLAT").map(|o| o.norm).collect();
        assert_eq!(flat, vec![0.0, 0.0]);
    }

    #[test]
    fn test_idempotent() {
        let once = normalize(&sample());
        let again_input: Vec<Observation> = once
            .iter()
            .map(|o| Observation::new(o.region.clone(), o.year, o.id.clone(), o.norm))
            .collect();
        let twice = normalize(&again_input);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert_eq!(a.norm, b.norm);
        }
    }

    #[test]
    fn test_incomplete_and_duplicate_rows_dropped() {
        let mut data = sample();
        data.push(Observation::new("", 2000, "GDP", 1.0));
        data.push(Observation::new("USA", 2002, "GDP", f64::NAN));
        data.push(Observation::new("USA", 2000, "GDP", 1000.0));
        let out = normalize(&data);
        assert_eq!(out.len(), 7);
        // The duplicate did not stretch the GDP range.
        assert_eq!(out[1].norm, 0.5);
    }

    #[test]
    fn test_extreme_range_stays_finite() {
        let data = vec![
            Observation::new("A", 2000, "HUGE", -1e308),
            Observation::new("A", 2001, "HUGE", 1e308),
            Observation::new("A", 2002, "HUGE", 0.0),
        ];
        let out = normalize(&data);
        let norms: Vec<f64> = out.iter().map(|o| o.norm).collect();
        assert_eq!(norms[0], 0.0);
        assert_eq!(norms[1], 1.0);
        assert!((norms[2] - 0.5).abs() < 1e-12);
    }
}
