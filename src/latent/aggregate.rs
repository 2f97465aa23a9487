//! Latent Aggregator
//!
//! Weighted means of normalized indicators per latent and (region, year),
//! outer-merged into one wide table.

use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info, warn};

use super::{Latent, LatentRow};
use crate::config::LatentSpec;
use crate::etl::NormalizedObservation;

/// Running `Σ w·v` and `Σ w` for one cell.
#[derive(Debug, Clone, Copy, Default)]
struct WeightedSum {
    weighted: f64,
    weight: f64,
}

impl WeightedSum {
    fn add(&mut self, value: f64, weight: f64) {
        self.weighted += weight * value;
        self.weight += weight;
    }

    /// `None` when every participating weight is zero.
    fn mean(self) -> Option<f64> {
        (self.weight > 0.0).then(|| self.weighted / self.weight)
    }
}

fn aggregate_latent<'a>(
    by_id: &HashMap<&str, Vec<&'a NormalizedObservation>>,
    latent: Latent,
    spec: &LatentSpec,
) -> BTreeMap<(&'a str, i32), WeightedSum> {
    let mut cells: BTreeMap<(&str, i32), WeightedSum> = BTreeMap::new();
    for entry in &spec.indicators {
        let Some(series) = by_id.get(entry.id.as_str()) else {
            warn!("Indicator '{}' of latent '{}' has no observations", entry.id, latent);
            continue;
        };
        for &obs in series {
            cells
                .entry((obs.region.as_str(), obs.year))
                .or_default()
                .add(obs.norm, entry.weight);
        }
    }
    cells
}

/// Build the wide latent table, sorted by (region, year).
///
/// A row exists for every cell any latent has data for; latents without a
/// contribution at that cell stay `None`.
pub fn build_latents(
    observations: &[NormalizedObservation],
    specs: &BTreeMap<Latent, LatentSpec>,
) -> Vec<LatentRow> {
    let mut by_id: HashMap<&str, Vec<&NormalizedObservation>> = HashMap::new();
    for obs in observations {
        by_id.entry(obs.id.as_str()).or_default().push(obs);
    }

    let mut table: BTreeMap<(&str, i32), LatentRow> = BTreeMap::new();
    for (&latent, spec) in specs {
        let cells = aggregate_latent(&by_id, latent, spec);
        debug!("Latent '{}': {} cells", latent, cells.len());
        for ((region, year), sum) in cells {
            table
                .entry((region, year))
                .or_insert_with(|| LatentRow::empty(region, year))
                .set(latent, sum.mean());
        }
    }

    info!("Built {} latent rows", table.len());
    table.into_values().collect()
}
