use std::env;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::RwLock;
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::classifier::{Classifier, ClassifierError, PredictionResult};

/// Readiness of the shared model handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthStatus {
    /// `"ok"` when a model is loaded, `"degraded"` otherwise
    pub status: String,
    pub model_loaded: bool,
    pub classes: Vec<String>,
    /// Artifact the current model was loaded from
    pub model_path: Option<PathBuf>,
    pub version: String,
}

/// The current model together with the artifact it came from, swapped as one.
#[derive(Debug)]
struct Loaded {
    classifier: Arc<Classifier>,
    path: PathBuf,
}

/// Owns the models directory and the process-wide "current model" handle.
///
/// The handle is swapped wholesale: `load` builds a complete new
/// [`Classifier`] before taking the write lock, and readers clone the `Arc`
/// so an in-flight prediction keeps the version it started with.
#[derive(Debug)]
pub struct ModelManager {
    models_dir: PathBuf,
    current: RwLock<Option<Loaded>>,
}

impl ModelManager {
    /// File name of the artifact inside the models directory
    pub const ARTIFACT_FILE: &'static str = "classifier.bin";

    /// Creates a new ModelManager with the default models directory
    pub fn new_default() -> io::Result<Self> {
        Self::new(Self::get_default_models_dir())
    }

    /// Returns the default models directory path
    pub fn get_default_models_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var("PME_CLASSIFIER_HOME") {
            return PathBuf::from(path).join("models");
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_local_dir() {
            return data_dir.join("pme-classifier").join("models");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir.join(".local").join("share").join("pme-classifier").join("models");
        }

        // 4. If all else fails, use system temp directory
        env::temp_dir().join("pme-classifier").join("models")
    }

    pub fn new<P: AsRef<Path>>(models_dir: P) -> io::Result<Self> {
        let models_dir = models_dir.as_ref().to_path_buf();
        fs::create_dir_all(&models_dir)?;
        Ok(Self {
            models_dir,
            current: RwLock::new(None),
        })
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.models_dir.join(Self::ARTIFACT_FILE)
    }

    pub fn is_artifact_present(&self) -> bool {
        let path = self.artifact_path();
        log::debug!("Checking for artifact at {:?} (exists: {})", path, path.exists());
        path.exists()
    }

    /// SHA-256 of a file, hex encoded.
    pub fn file_digest(path: &Path) -> io::Result<String> {
        let bytes = fs::read(path)?;
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Checks that the artifact exists and decodes cleanly.
    ///
    /// Returns `Ok(false)` when there is nothing to verify; a present but
    /// corrupt artifact also yields `Ok(false)` and is logged.
    pub fn verify_model(&self) -> Result<bool, ClassifierError> {
        let path = self.artifact_path();
        if !path.exists() {
            log::info!("No artifact at {:?}", path);
            return Ok(false);
        }

        let digest = Self::file_digest(&path).map_err(|e| ClassifierError::model_not_found(&path, e.to_string()))?;
        log::info!("Artifact {:?} sha256 {}", path, digest);
        match Classifier::load(&path) {
            Ok(classifier) => {
                log::info!("Artifact verified: model {}", classifier.metadata().model_id);
                Ok(true)
            }
            Err(e) => {
                log::warn!("Artifact verification failed: {}", e);
                Ok(false)
            }
        }
    }

    /// Deletes the artifact in the models directory, if any.
    pub fn remove_model(&self) -> io::Result<()> {
        let path = self.artifact_path();
        if path.exists() {
            fs::remove_file(&path)?;
            log::info!("Removed artifact {:?}", path);
        }
        Ok(())
    }

    /// Saves `classifier` to the models directory and makes it current.
    pub fn install(&self, classifier: Classifier) -> Result<Arc<Classifier>, ClassifierError> {
        let path = self.artifact_path();
        classifier.save(&path)?;
        Ok(self.swap(classifier, path))
    }

    /// Loads the artifact at `path` and swaps it in as the current model.
    ///
    /// On failure the previously loaded model, if any, stays current.
    pub fn load(&self, path: impl AsRef<Path>) -> Result<Arc<Classifier>, ClassifierError> {
        let path = path.as_ref();
        let classifier = Classifier::load(path)?;
        Ok(self.swap(classifier, path.to_path_buf()))
    }

    /// Reloads from the path of the last successful load, or the default
    /// artifact path.
    pub fn reload(&self) -> Result<Arc<Classifier>, ClassifierError> {
        let path = self.loaded_from().unwrap_or_else(|| self.artifact_path());
        self.load(path)
    }

    fn swap(&self, classifier: Classifier, path: PathBuf) -> Arc<Classifier> {
        let handle = Arc::new(classifier);
        let previous = self.current.write().replace(Loaded {
            classifier: Arc::clone(&handle),
            path,
        });
        match previous {
            Some(old) => log::info!(
                "Swapped model {} for {}",
                old.classifier.metadata().model_id,
                handle.metadata().model_id
            ),
            None => log::info!("Model {} is now current", handle.metadata().model_id),
        }
        handle
    }

    /// The current model; callers keep it for as long as they need.
    pub fn current(&self) -> Option<Arc<Classifier>> {
        self.current.read().as_ref().map(|loaded| Arc::clone(&loaded.classifier))
    }

    /// Artifact path of the current model.
    pub fn loaded_from(&self) -> Option<PathBuf> {
        self.current.read().as_ref().map(|loaded| loaded.path.clone())
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    /// Predicts with the current model.
    pub fn predict(&self, text: &str) -> Result<PredictionResult, ClassifierError> {
        let classifier = self.current().ok_or_else(|| {
            ClassifierError::model_not_found(self.artifact_path(), "no model is currently loaded")
        })?;
        classifier.predict(text)
    }

    pub fn health(&self) -> HealthStatus {
        let (current, model_path) = match self.current.read().as_ref() {
            Some(loaded) => (Some(Arc::clone(&loaded.classifier)), Some(loaded.path.clone())),
            None => (None, None),
        };
        HealthStatus {
            status: if current.is_some() { "ok" } else { "degraded" }.to_string(),
            model_loaded: current.is_some(),
            classes: match &current {
                Some(classifier) => classifier.classes().iter().map(|c| c.label().to_string()).collect(),
                None => Vec::new(),
            },
            model_path,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "degraded".to_string(),
            model_loaded: false,
            classes: Vec::new(),
            model_path: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
