use std::path::PathBuf;

use thiserror::Error;

use crate::catalog::CatalogError;
use crate::config::ConfigError;
use crate::estimator::{ArtifactError, PredictError};
use crate::ingest::source::SourceError;
use crate::service::ServiceError;

/// Failures a pipeline component can end with.
///
/// Row-level problems (dropped rows, failed batches, failed row updates) are
/// counted in the component reports instead; they only surface here when
/// they leave nothing to work with.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("Source file not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Could not read source: {0}")]
    SourceRead(#[from] SourceError),
    #[error("Source has no data rows")]
    EmptySource,
    #[error("Missing required column(s) in source: {}", .missing.join(", "))]
    SchemaMismatch { missing: Vec<&'static str> },
    #[error("No valid rows to import after cleaning ({dropped} dropped)")]
    Validation { dropped: usize },
    #[error(
        "Not enough training data: {usable} usable row(s) with real_weight, need at least {required}"
    )]
    InsufficientData { usable: usize, required: usize },
    #[error("Model not found at {0}; run heft-train first")]
    ArtifactMissing(PathBuf),
    #[error(transparent)]
    Artifact(ArtifactError),
    #[error("Model training failed: {0}")]
    Training(String),
    #[error("Product with id {0} not found")]
    NotFound(i64),
    #[error("Model prediction error: {0}")]
    Prediction(#[from] PredictError),
    #[error("Catalog update failed: {0}")]
    Persistence(CatalogError),
    #[error("Catalog read failed: {0}")]
    CatalogRead(CatalogError),
    #[error(transparent)]
    Service(#[from] ServiceError),
}

impl PipelineError {
    /// Stable tag used in machine-readable failure output.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration_error",
            Self::SourceNotFound(_) => "source_not_found",
            Self::SourceRead(_) => "source_read_error",
            Self::EmptySource => "empty_source",
            Self::SchemaMismatch { .. } => "schema_mismatch",
            Self::Validation { .. } => "validation_error",
            Self::InsufficientData { .. } => "insufficient_data",
            Self::ArtifactMissing(_) => "artifact_missing",
            Self::Artifact(_) => "artifact_error",
            Self::Training(_) => "training_error",
            Self::NotFound(_) => "not_found",
            Self::Prediction(_) => "prediction_error",
            Self::Persistence(_) => "persistence_error",
            Self::CatalogRead(_) => "catalog_read_error",
            Self::Service(_) => "service_error",
        }
    }
}

impl From<ArtifactError> for PipelineError {
    fn from(err: ArtifactError) -> Self {
        match err {
            ArtifactError::NotFound(path) => Self::ArtifactMissing(path),
            other => Self::Artifact(other),
        }
    }
}
