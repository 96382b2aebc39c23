use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::classifier::ClassifierError;
use crate::model_manager::ModelManager;

/// Hyperparameters for one training run.
///
/// Stored inside the model artifact so a loaded model can report how it was built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Share of the dataset held out for evaluation
    pub test_size: f64,
    /// Seed for the split and cross-validation shuffles
    pub random_state: u64,
    /// Upper bound on vocabulary size (most frequent terms kept)
    pub max_features: usize,
    pub ngram_min: usize,
    pub ngram_max: usize,
    /// Inverse regularisation strength
    pub c: f64,
    pub max_iter: usize,
    /// Gradient descent step, as a multiple of the largest stable step
    pub learning_rate: f64,
    /// Convergence tolerance on the largest gradient component
    pub tol: f64,
    /// Number of cross-validation folds
    pub cv_folds: usize,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_size: 0.2,
            random_state: 42,
            max_features: 5000,
            ngram_min: 1,
            ngram_max: 2,
            c: 1.0,
            max_iter: 1000,
            learning_rate: 1.0,
            tol: 1e-4,
            cv_folds: 5,
        }
    }
}

impl TrainingConfig {
    /// Checks the same bounds the settings layer enforces.
    pub fn validate(&self) -> Result<(), ClassifierError> {
        if !(0.1..=0.5).contains(&self.test_size) {
            return Err(ClassifierError::ConfigError(format!(
                "test_size must be within [0.1, 0.5], got {}",
                self.test_size
            )));
        }
        if self.c <= 0.0 || !self.c.is_finite() {
            return Err(ClassifierError::ConfigError(format!(
                "C must be a positive number, got {}",
                self.c
            )));
        }
        if self.ngram_min == 0 || self.ngram_min > self.ngram_max {
            return Err(ClassifierError::ConfigError(format!(
                "invalid n-gram range ({}, {})",
                self.ngram_min, self.ngram_max
            )));
        }
        if self.max_features == 0 {
            return Err(ClassifierError::ConfigError("max_features must be at least 1".into()));
        }
        if self.max_iter == 0 {
            return Err(ClassifierError::ConfigError("max_iter must be at least 1".into()));
        }
        if self.learning_rate <= 0.0 || !self.learning_rate.is_finite() {
            return Err(ClassifierError::ConfigError(format!(
                "learning_rate must be a positive number, got {}",
                self.learning_rate
            )));
        }
        if self.cv_folds < 2 {
            return Err(ClassifierError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.cv_folds
            )));
        }
        Ok(())
    }
}

/// Process-wide settings: file locations, dataset schema and training hyperparameters.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dataset_path: PathBuf,
    pub model_path: PathBuf,
    pub text_column: String,
    pub label_column: String,
    /// Minimum number of rows a dataset must contain
    pub min_examples: usize,
    /// Optional JSON file replacing the built-in decision table
    pub decision_table: Option<PathBuf>,
    /// Confidence (percent) below which decisions recommend human review
    pub review_threshold: Option<f64>,
    pub training: TrainingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dataset_path: PathBuf::from("data/raw/dataset.csv"),
            model_path: ModelManager::get_default_models_dir().join(ModelManager::ARTIFACT_FILE),
            text_column: "texte".to_string(),
            label_column: "classe".to_string(),
            min_examples: 20,
            decision_table: None,
            review_threshold: None,
            training: TrainingConfig::default(),
        }
    }
}

impl Settings {
    /// Builds settings from defaults overridden by `PME_*` environment variables.
    pub fn from_env() -> Result<Self, ClassifierError> {
        let mut settings = Self::default();

        if let Some(path) = env_string("PME_DATASET_PATH") {
            settings.dataset_path = PathBuf::from(path);
        }
        if let Some(path) = env_string("PME_MODEL_PATH") {
            settings.model_path = PathBuf::from(path);
        }
        if let Some(column) = env_string("PME_TEXT_COLUMN") {
            settings.text_column = column;
        }
        if let Some(column) = env_string("PME_LABEL_COLUMN") {
            settings.label_column = column;
        }
        if let Some(min) = env_parse("PME_MIN_EXAMPLES")? {
            settings.min_examples = min;
        }
        if let Some(path) = env_string("PME_DECISION_TABLE") {
            settings.decision_table = Some(PathBuf::from(path));
        }
        if let Some(threshold) = env_parse("PME_REVIEW_THRESHOLD")? {
            settings.review_threshold = Some(threshold);
        }

        let training = &mut settings.training;
        if let Some(v) = env_parse("PME_TEST_SIZE")? {
            training.test_size = v;
        }
        if let Some(v) = env_parse("PME_RANDOM_STATE")? {
            training.random_state = v;
        }
        if let Some(v) = env_parse("PME_TFIDF_MAX_FEATURES")? {
            training.max_features = v;
        }
        if let Some(v) = env_parse("PME_TFIDF_NGRAM_MIN")? {
            training.ngram_min = v;
        }
        if let Some(v) = env_parse("PME_TFIDF_NGRAM_MAX")? {
            training.ngram_max = v;
        }
        if let Some(v) = env_parse("PME_LR_C")? {
            training.c = v;
        }
        if let Some(v) = env_parse("PME_LR_MAX_ITER")? {
            training.max_iter = v;
        }
        if let Some(v) = env_parse("PME_CV_FOLDS")? {
            training.cv_folds = v;
        }

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ClassifierError> {
        if self.text_column.trim().is_empty() || self.label_column.trim().is_empty() {
            return Err(ClassifierError::ConfigError("column names cannot be empty".into()));
        }
        if let Some(threshold) = self.review_threshold {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ClassifierError::ConfigError(format!(
                    "review threshold must be a percentage within [0, 100], got {}",
                    threshold
                )));
            }
        }
        self.training.validate()
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>, ClassifierError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(key) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            ClassifierError::ConfigError(format!("{}='{}' is invalid: {}", key, raw, e))
        }),
    }
}
