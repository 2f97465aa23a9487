//! Latent Module
//!
//! The four named latents, the wide latent table, and the stages that
//! build, impute and score it.

pub mod aggregate;
pub mod composite;
pub mod coverage;
pub mod impute;

pub use aggregate::build_latents;
pub use composite::{score, ScoreReport, ScoreRow};
pub use coverage::{coverage_by_region, CoverageRow};
pub use impute::impute_and_clamp;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// Derived indices aggregated from raw indicators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Latent {
    /// Governance coherence
    Kappa,
    /// Suffering load
    Sigma,
    /// Resilience
    Rho,
    /// Pluralism
    Phi,
}

impl Latent {
    pub const ALL: [Latent; 4] = [Latent::Kappa, Latent::Sigma, Latent::Rho, Latent::Phi];

    pub fn name(self) -> &'static str {
        match self {
            Self::Kappa => "kappa",
            Self::Sigma => "sigma",
            Self::Rho => "rho",
            Self::Phi => "phi",
        }
    }
}

impl FromStr for Latent {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Latent::ALL
            .into_iter()
            .find(|l| l.name() == s.trim().to_lowercase())
            .ok_or_else(|| PipelineError::InvalidConfig(format!("unknown latent '{}'", s)))
    }
}

impl fmt::Display for Latent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One (region, year) cell of the wide latent table. `None` means no
/// contributing indicator had data for the cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatentRow {
    pub region: String,
    pub year: i32,
    pub kappa: Option<f64>,
    pub sigma: Option<f64>,
    pub rho: Option<f64>,
    pub phi: Option<f64>,
}

impl LatentRow {
    pub fn empty(region: impl Into<String>, year: i32) -> Self {
        Self {
            region: region.into(),
            year,
            kappa: None,
            sigma: None,
            rho: None,
            phi: None,
        }
    }

    pub fn get(&self, latent: Latent) -> Option<f64> {
        match latent {
            Latent::Kappa => self.kappa,
            Latent::Sigma => self.sigma,
            Latent::Rho => self.rho,
            Latent::Phi => self.phi,
        }
    }

    pub fn set(&mut self, latent: Latent, value: Option<f64>) {
        let slot = match latent {
            Latent::Kappa => &mut self.kappa,
            Latent::Sigma => &mut self.sigma,
            Latent::Rho => &mut self.rho,
            Latent::Phi => &mut self.phi,
        };
        *slot = value;
    }

    /// Number of latents carrying a value.
    pub fn signal_count(&self) -> usize {
        Latent::ALL.iter().filter(|&&l| self.get(l).is_some()).count()
    }
}
