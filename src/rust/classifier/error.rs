use std::path::PathBuf;

use thiserror::Error;

/// Represents the different types of errors that can occur while validating data,
/// training, persisting or querying the classifier.
///
/// Dataset and training errors abort a training run. Load errors
/// (`ModelNotFoundError`) are distinct from per-call prediction errors
/// (`ValidationError`) so callers can tell "retrain" apart from "retry".
#[derive(Debug, Error)]
pub enum ClassifierError {
    /// The dataset file is missing or cannot be opened
    #[error("Dataset unreadable at {path}: {reason}")]
    DatasetUnreadable { path: PathBuf, reason: String },

    /// The dataset does not have the required columns
    #[error("Schema error: missing required column(s) {missing:?}, found {found:?}")]
    SchemaError {
        missing: Vec<String>,
        found: Vec<String>,
    },

    /// A row has an empty or unparsable field
    #[error("Data quality error: row {row}, field '{field}': {detail}")]
    DataQualityError {
        row: usize,
        field: String,
        detail: String,
    },

    /// A row carries a label outside the fixed vocabulary
    #[error("Invalid label error: row {row}, got '{value}', expected one of {expected:?}")]
    InvalidLabelError {
        row: usize,
        value: String,
        expected: Vec<String>,
    },

    /// Not enough examples overall or per class for the requested strategy
    #[error("Insufficient data: {0}")]
    InsufficientDataError(String),

    /// Fitting failed
    #[error("Training error: {0}")]
    TrainingError(String),

    /// The model artifact is missing, corrupt or of an unsupported version
    #[error("Model not found or unreadable at {path}: {reason}")]
    ModelNotFoundError { path: PathBuf, reason: String },

    /// Input rejected before reaching the model
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// The model artifact could not be written
    #[error("Persistence error: could not write {path}: {reason}")]
    PersistenceError { path: PathBuf, reason: String },

    /// Invalid settings or decision table
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl ClassifierError {
    /// True for errors raised while loading an artifact.
    pub fn is_load_error(&self) -> bool {
        matches!(self, Self::ModelNotFoundError { .. })
    }

    /// True for errors that abort a training run.
    pub fn is_training_error(&self) -> bool {
        matches!(
            self,
            Self::DatasetUnreadable { .. }
                | Self::SchemaError { .. }
                | Self::DataQualityError { .. }
                | Self::InvalidLabelError { .. }
                | Self::InsufficientDataError(_)
                | Self::TrainingError(_)
                | Self::PersistenceError { .. }
        )
    }

    pub(crate) fn model_not_found(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ModelNotFoundError {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn persistence(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::PersistenceError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
