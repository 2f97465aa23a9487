//! ETL Module
//!
//! Raw indicator records, their normalized form, and the schema check run
//! against raw files before ingestion.

pub mod normalize;
pub mod schema;

pub use normalize::normalize;
pub use schema::{missing_columns, validate_dir, SchemaReport, REQUIRED_COLUMNS};

use serde::{Deserialize, Serialize};

/// One raw measurement of one indicator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub region: String,
    pub year: i32,
    pub value: f64,
    pub id: String,
}

impl Observation {
    pub fn new(region: impl Into<String>, year: i32, id: impl Into<String>, value: f64) -> Self {
        Self {
            region: region.into(),
            year,
            value,
            id: id.into(),
        }
    }

    /// Rows missing any field never flow downstream.
    pub fn is_complete(&self) -> bool {
        !self.region.trim().is_empty() && !self.id.trim().is_empty() && self.value.is_finite()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedObservation {
    pub region: String,
    pub year: i32,
    pub value: f64,
    pub id: String,
    /// Min-max scaled value in [0, 1]
    pub norm: f64,
}
