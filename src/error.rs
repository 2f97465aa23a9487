//! Pipeline Error Taxonomy
//!
//! Structurally fatal conditions abort the run. Recoverable conditions
//! (zero-range indicators, gated rows) never surface here; the stages
//! that meet them fall back to safe defaults and log.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required file, column or latent is absent.
    #[error("missing input: {0}")]
    MissingInput(String),

    /// No rows survived filtering for a stage that needs data.
    #[error("no data for {stage}: {detail}")]
    EmptyData { stage: &'static str, detail: String },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A numeric routine was called outside its domain.
    #[error("precondition violated: {0}")]
    Precondition(String),

    #[error("background task failed: {0}")]
    Task(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    pub fn io(path: impl AsRef<std::path::Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().display().to_string(),
            source,
        }
    }

    pub fn empty(stage: &'static str, detail: impl Into<String>) -> Self {
        Self::EmptyData { stage, detail: detail.into() }
    }

    /// Optional diagnostics log and skip on `EmptyData`.
    pub fn is_empty_data(&self) -> bool {
        matches!(self, Self::EmptyData { .. })
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
