//! The trained estimator artifact: categorical encoder plus boosted regressor.
//!
//! An artifact is immutable once written. Training writes a new file next to
//! the old one and renames it into place, so readers only ever see a complete
//! artifact.

use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use thiserror::Error;

use crate::catalog::normalize_label;
use crate::ml::encoder::OneHotEncoder;
use crate::ml::gbdt::GbdtRegressor;

/// Artifact layout version checked on load.
pub const ARTIFACT_FORMAT_VERSION: i64 = 1;
/// Model input columns, in encoding order.
pub const FEATURE_COLUMNS: [&str; 2] = ["sub_category", "category"];

/// Errors raised while reading or writing an artifact.
#[derive(Debug, Error)]
pub enum ArtifactError {
    /// No artifact exists at the path.
    #[error("Model artifact not found: {0}")]
    NotFound(PathBuf),
    #[error("Failed to read model artifact {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Model artifact {path} is not valid JSON: {source}")]
    Decode {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// The artifact decoded but violates a structural invariant.
    #[error("Model artifact is invalid: {0}")]
    Invalid(String),
    #[error("Failed to write model artifact {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to encode model artifact: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Errors raised while predicting a single row.
#[derive(Debug, Error, PartialEq)]
pub enum PredictError {
    /// A feature was blank after normalization.
    #[error("feature `{0}` is empty")]
    EmptyFeature(&'static str),
    #[error("model produced a non-finite prediction")]
    NonFinite,
}

/// Normalized model input for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Features {
    pub category: String,
    pub sub_category: String,
}

impl Features {
    /// Build features, trimming and lower-casing both labels.
    pub fn new(category: &str, sub_category: &str) -> Self {
        Self {
            category: normalize_label(category),
            sub_category: normalize_label(sub_category),
        }
    }

    fn check(&self) -> Result<[&str; 2], PredictError> {
        if self.sub_category.is_empty() {
            return Err(PredictError::EmptyFeature("sub_category"));
        }
        if self.category.is_empty() {
            return Err(PredictError::EmptyFeature("category"));
        }
        Ok([self.sub_category.as_str(), self.category.as_str()])
    }
}

/// Persisted encoder + regressor pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estimator {
    pub format_version: i64,
    /// Unix seconds at which training finished.
    pub trained_at: i64,
    /// Rows the regressor was fit on.
    pub training_rows: usize,
    pub encoder: OneHotEncoder,
    pub regressor: GbdtRegressor,
}

impl Estimator {
    pub fn new(encoder: OneHotEncoder, regressor: GbdtRegressor, training_rows: usize) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            trained_at: time::OffsetDateTime::now_utc().unix_timestamp(),
            training_rows,
            encoder,
            regressor,
        }
    }

    /// Validate structural invariants of the artifact.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::Invalid(format!(
                "unsupported format_version {} (expected {ARTIFACT_FORMAT_VERSION})",
                self.format_version
            )));
        }
        let names: Vec<&str> = self.encoder.columns.iter().map(|c| c.name.as_str()).collect();
        if names != FEATURE_COLUMNS {
            return Err(ArtifactError::Invalid(format!(
                "encoder columns {names:?} do not match {FEATURE_COLUMNS:?}"
            )));
        }
        self.encoder.validate().map_err(ArtifactError::Invalid)?;
        if self.encoder.width() != self.regressor.feature_len {
            return Err(ArtifactError::Invalid(format!(
                "encoder width {} does not match regressor feature_len {}",
                self.encoder.width(),
                self.regressor.feature_len
            )));
        }
        self.regressor.validate().map_err(ArtifactError::Invalid)
    }

    /// Load and validate an artifact from a JSON file.
    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        if !path.is_file() {
            return Err(ArtifactError::NotFound(path.to_path_buf()));
        }
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let estimator: Self =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
                path: path.to_path_buf(),
                source,
            })?;
        estimator.validate()?;
        Ok(estimator)
    }

    /// Write the artifact, atomically replacing any file already at `path`.
    pub fn save(&self, path: &Path) -> Result<(), ArtifactError> {
        let write_err = |source| ArtifactError::Write {
            path: path.to_path_buf(),
            source,
        };
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(parent).map_err(write_err)?;
        let bytes = serde_json::to_vec_pretty(self)?;
        let mut staged = NamedTempFile::new_in(parent).map_err(write_err)?;
        staged.write_all(&bytes).map_err(write_err)?;
        staged.as_file().sync_all().map_err(write_err)?;
        staged.persist(path).map_err(|err| write_err(err.error))?;
        Ok(())
    }

    /// Predict the weight for one product.
    pub fn predict(&self, features: &Features) -> Result<f64, PredictError> {
        let values = features.check()?;
        let encoded = self.encoder.transform(&values);
        let prediction = self.regressor.predict(&encoded);
        if !prediction.is_finite() {
            return Err(PredictError::NonFinite);
        }
        Ok(prediction)
    }

    /// Predict a batch, keeping one result per input row.
    pub fn predict_many(&self, rows: &[Features]) -> Vec<Result<f64, PredictError>> {
        rows.iter().map(|features| self.predict(features)).collect()
    }
}
