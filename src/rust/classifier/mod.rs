use chrono::{DateTime, Utc};
use serde::Serialize;

mod error;
mod utils;
pub mod vectorizer;
pub mod model;
pub mod split;
pub mod metrics;
pub mod builder;
#[allow(clippy::module_inception)]
mod classifier;

pub use error::ClassifierError;
pub use utils::SparseVector;
pub use classifier::{Classifier, ModelMetadata, PredictionResult, FORMAT_VERSION, MAX_TEXT_CHARS};
pub use builder::{train, ClassifierBuilder};
pub use metrics::{ClassMetrics, ClassificationMetrics, CrossValidation, EvaluationReport};
pub use vectorizer::TfidfVectorizer;
pub use model::{FitOptions, SoftmaxRegression};

/// Information about the current state and configuration of a classifier
#[derive(Debug, Clone, Serialize)]
pub struct ClassifierInfo {
    /// Short identifier derived from the fitted stages
    pub model_id: String,
    /// Number of classes the classifier predicts
    pub num_classes: usize,
    /// Labels of the classes, in probability order
    pub class_labels: Vec<String>,
    /// Number of TF-IDF features
    pub vocabulary_size: usize,
    /// Number of examples the model was fitted on
    pub train_size: usize,
    pub trained_at: Option<DateTime<Utc>>,
    /// Whether gradient descent reached its tolerance
    pub converged: bool,
}
