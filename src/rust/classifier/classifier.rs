use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::error::ClassifierError;
use super::model::SoftmaxRegression;
use super::utils::{argmax, to_percent};
use super::vectorizer::TfidfVectorizer;
use crate::category::Category;
use crate::config::TrainingConfig;

/// Leading bytes of every artifact file.
pub const ARTIFACT_MAGIC: &[u8; 8] = b"PMECLSF\0";
/// Bumped whenever the payload layout changes.
pub const FORMAT_VERSION: u32 = 1;
/// Longest message accepted by `predict`, in characters.
pub const MAX_TEXT_CHARS: usize = 2000;

const HEADER_LEN: usize = 8 + 4 + 32;

/// Provenance of a trained model, persisted alongside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub format_version: u32,
    pub crate_version: String,
    /// Milliseconds since the Unix epoch
    pub trained_at_ms: i64,
    pub train_size: usize,
    /// Class order of the probability vector
    pub classes: Vec<Category>,
    /// Hex prefix of the digest of the fitted stages
    pub model_id: String,
    pub config: TrainingConfig,
}

impl ModelMetadata {
    pub fn trained_at(&self) -> Option<DateTime<Utc>> {
        DateTime::<Utc>::from_timestamp_millis(self.trained_at_ms)
    }
}

#[derive(Serialize)]
struct ArtifactRef<'a> {
    metadata: &'a ModelMetadata,
    vectorizer: &'a TfidfVectorizer,
    model: &'a SoftmaxRegression,
}

#[derive(Deserialize)]
struct Artifact {
    metadata: ModelMetadata,
    vectorizer: TfidfVectorizer,
    model: SoftmaxRegression,
}

/// Outcome of classifying one message.
///
/// Probabilities and confidence are percentages rounded to one decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "message")]
    pub text: String,
    #[serde(rename = "classe")]
    pub predicted_class: Category,
    #[serde(rename = "confiance")]
    pub confidence: f64,
    #[serde(rename = "probabilites")]
    pub class_probabilities: BTreeMap<Category, f64>,
}

/// A trained message classifier: the fitted TF-IDF stage and the fitted
/// softmax regression, which always travel together.
///
/// The classifier is immutable once built or loaded, so it is `Send + Sync`
/// and can be shared across threads behind an `Arc`:
///
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use pme_classifier::Classifier;
/// use std::sync::Arc;
/// use std::thread;
///
/// let classifier = Arc::new(Classifier::load("models/classifier.bin")?);
///
/// let classifier_clone = Arc::clone(&classifier);
/// thread::spawn(move || {
///     classifier_clone.predict("Avez-vous du riz en stock ?").unwrap();
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Classifier {
    metadata: ModelMetadata,
    vectorizer: TfidfVectorizer,
    model: SoftmaxRegression,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<Classifier>();
    }
};

impl Classifier {
    /// Creates a new ClassifierBuilder for fluent construction
    pub fn builder() -> super::builder::ClassifierBuilder {
        super::builder::ClassifierBuilder::new()
    }

    /// Bundles freshly fitted stages into a classifier.
    pub(crate) fn from_parts(
        vectorizer: TfidfVectorizer,
        model: SoftmaxRegression,
        train_size: usize,
        config: TrainingConfig,
    ) -> Result<Self, ClassifierError> {
        if !vectorizer.is_fitted() {
            return Err(ClassifierError::TrainingError("vectorizer has not been fitted".into()));
        }
        if model.n_classes() != Category::COUNT {
            return Err(ClassifierError::TrainingError(format!(
                "model has {} classes, expected {}",
                model.n_classes(),
                Category::COUNT
            )));
        }
        if model.n_features() != vectorizer.vocabulary_size() {
            return Err(ClassifierError::TrainingError(format!(
                "model expects {} features but the vocabulary has {} terms",
                model.n_features(),
                vectorizer.vocabulary_size()
            )));
        }

        let stages = bincode::serialize(&(&vectorizer, &model))
            .map_err(|e| ClassifierError::TrainingError(format!("cannot encode fitted stages: {}", e)))?;
        let model_id = format!("{:x}", Sha256::digest(&stages))[..12].to_string();

        Ok(Self {
            metadata: ModelMetadata {
                format_version: FORMAT_VERSION,
                crate_version: env!("CARGO_PKG_VERSION").to_string(),
                trained_at_ms: Utc::now().timestamp_millis(),
                train_size,
                classes: Category::ALL.to_vec(),
                model_id,
                config,
            },
            vectorizer,
            model,
        })
    }

    /// Returns information about the classifier's current state
    pub fn info(&self) -> super::ClassifierInfo {
        super::ClassifierInfo {
            model_id: self.metadata.model_id.clone(),
            num_classes: self.metadata.classes.len(),
            class_labels: self.metadata.classes.iter().map(|c| c.label().to_string()).collect(),
            vocabulary_size: self.vectorizer.vocabulary_size(),
            train_size: self.metadata.train_size,
            trained_at: self.metadata.trained_at(),
            converged: self.model.converged(),
        }
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn classes(&self) -> &[Category] {
        &self.metadata.classes
    }

    /// Predicts the category of a message.
    ///
    /// # Example
    /// ```rust,no_run
    /// # use pme_classifier::Classifier;
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let classifier = Classifier::load("models/classifier.bin")?;
    /// let result = classifier.predict("URGENT ! Paiement bloqué")?;
    /// println!("{} ({:.1}%)", result.predicted_class, result.confidence);
    /// for (class, p) in &result.class_probabilities {
    ///     println!("{}: {:.1}", class, p);
    /// }
    /// # Ok(())
    /// # }
    /// ```
    pub fn predict(&self, text: &str) -> Result<PredictionResult, ClassifierError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(ClassifierError::ValidationError("Input text cannot be empty".into()));
        }
        let length = text.chars().count();
        if length > MAX_TEXT_CHARS {
            return Err(ClassifierError::ValidationError(format!(
                "Input text is {} characters long, the maximum is {}",
                length, MAX_TEXT_CHARS
            )));
        }

        let row = self.vectorizer.transform(trimmed);
        let probabilities = self.model.predict_proba(&row);
        let best = argmax(&probabilities);
        let predicted_class = self.metadata.classes[best];

        debug!(
            "Predicted '{}' with p={:.4} from {} active features",
            predicted_class,
            probabilities[best],
            row.len()
        );

        Ok(PredictionResult {
            text: text.to_string(),
            predicted_class,
            confidence: to_percent(probabilities[best]),
            class_probabilities: self
                .metadata
                .classes
                .iter()
                .zip(&probabilities)
                .map(|(class, p)| (*class, to_percent(*p)))
                .collect(),
        })
    }

    /// Serialises the classifier into the artifact format.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ClassifierError> {
        let payload = bincode::serialize(&ArtifactRef {
            metadata: &self.metadata,
            vectorizer: &self.vectorizer,
            model: &self.model,
        })
        .map_err(|e| ClassifierError::persistence("<memory>", e))?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + payload.len());
        bytes.extend_from_slice(ARTIFACT_MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&Sha256::digest(&payload));
        bytes.extend_from_slice(&payload);
        Ok(bytes)
    }

    /// Restores a classifier from artifact bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ClassifierError> {
        Self::decode(bytes, Path::new("<memory>"))
    }

    fn decode(bytes: &[u8], origin: &Path) -> Result<Self, ClassifierError> {
        if bytes.len() < HEADER_LEN || &bytes[..8] != ARTIFACT_MAGIC {
            return Err(ClassifierError::model_not_found(origin, "not a classifier artifact"));
        }

        let mut version = [0u8; 4];
        version.copy_from_slice(&bytes[8..12]);
        let version = u32::from_le_bytes(version);
        if version != FORMAT_VERSION {
            return Err(ClassifierError::model_not_found(
                origin,
                format!("unsupported artifact version {} (expected {})", version, FORMAT_VERSION),
            ));
        }

        let payload = &bytes[HEADER_LEN..];
        if Sha256::digest(payload).as_slice() != &bytes[12..HEADER_LEN] {
            return Err(ClassifierError::model_not_found(origin, "checksum mismatch, artifact is corrupt"));
        }

        let artifact: Artifact = bincode::deserialize(payload)
            .map_err(|e| ClassifierError::model_not_found(origin, format!("cannot decode artifact: {}", e)))?;

        if artifact.metadata.classes != Category::ALL
            || artifact.model.n_classes() != Category::COUNT
            || artifact.model.n_features() != artifact.vectorizer.vocabulary_size()
        {
            return Err(ClassifierError::model_not_found(
                origin,
                "artifact stages do not match the category set",
            ));
        }

        Ok(Self {
            metadata: artifact.metadata,
            vectorizer: artifact.vectorizer,
            model: artifact.model,
        })
    }

    /// Writes the artifact to `path`.
    ///
    /// The bytes go to a sibling temporary file first and are renamed into
    /// place, so a failed save never leaves a partial artifact at `path`.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ClassifierError> {
        let path = path.as_ref();
        let bytes = self.to_bytes().map_err(|e| match e {
            ClassifierError::PersistenceError { reason, .. } => ClassifierError::persistence(path, reason),
            other => other,
        })?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| ClassifierError::persistence(path, e))?;
        }

        let tmp = temp_sibling(path);
        let written = fs::File::create(&tmp).and_then(|mut file| {
            file.write_all(&bytes)?;
            file.sync_all()
        });
        if let Err(e) = written.and_then(|_| fs::rename(&tmp, path)) {
            let _ = fs::remove_file(&tmp);
            return Err(ClassifierError::persistence(path, e));
        }

        info!(
            "Saved model {} ({} bytes) to {:?}",
            self.metadata.model_id,
            bytes.len(),
            path
        );
        Ok(())
    }

    /// Loads an artifact written by [`Classifier::save`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|e| ClassifierError::model_not_found(path, e.to_string()))?;
        let classifier = Self::decode(&bytes, path)?;
        info!("Loaded model {} from {:?}", classifier.metadata.model_id, path);
        Ok(classifier)
    }
}

/// Unique per call so concurrent saves to one path never share a temp file.
fn temp_sibling(path: &Path) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "classifier".into());
    name.push(format!(
        ".tmp-{}-{}",
        std::process::id(),
        COUNTER.fetch_add(1, Ordering::Relaxed)
    ));
    path.with_file_name(name)
}
