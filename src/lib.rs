//! OSIU Moral-Informational Gradient
//!
//! Batch pipeline from heterogeneous socio-economic indicators to a composite
//! per-region, per-year score:
//! - Per-indicator min-max normalization
//! - Weighted aggregation into four latents (κ, σ, ρ, φ)
//! - Simplex-constrained KL fit of the σ indicator weights, with bootstrap CIs
//! - Imputation, coverage diagnostics and the gated composite score

pub mod config;
pub mod error;
pub mod etl;
pub mod latent;
pub mod model;
pub mod pipeline;
pub mod tables;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use latent::{Latent, LatentRow};
pub use model::FitResult;
pub use pipeline::{Pipeline, RunOptions, RunSummary};
