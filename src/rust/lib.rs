//! A thread-safe classifier for short French customer messages, routing each
//! message to Information, Commande, Réclamation or Urgence and mapping the
//! prediction to a business action and a canned client reply.
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pme_classifier::{load_and_validate, Classifier, DatasetSchema, DecisionTable, TrainingConfig};
//!
//! let dataset = load_and_validate("data/raw/dataset.csv", &DatasetSchema::default())?;
//! let (classifier, report) = Classifier::builder()
//!     .with_config(TrainingConfig::default())
//!     .with_dataset(dataset)
//!     .build()?;
//! println!("weighted F1 on held-out data: {:.3}", report.primary_score());
//!
//! let prediction = classifier.predict("Avez-vous du riz en stock ?")?;
//! let decision = DecisionTable::default().decide(prediction.predicted_class, prediction.confidence);
//! println!("{} ({}%): {}", prediction.predicted_class, prediction.confidence, decision.client_reply);
//! # Ok(())
//! # }
//! ```
//!
//! # Thread Safety
//!
//! A loaded model is immutable. [`ModelManager`] keeps the current one behind a
//! swappable `Arc`, so concurrent predictions never block each other and a
//! reload never tears a vectorizer away from its classifier:
//!
//! ```rust,no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use pme_classifier::ModelManager;
//! use std::sync::Arc;
//! use std::thread;
//!
//! let manager = Arc::new(ModelManager::new_default()?);
//! manager.load(manager.artifact_path())?;
//!
//! let mut handles = vec![];
//! for _ in 0..3 {
//!     let manager = Arc::clone(&manager);
//!     handles.push(thread::spawn(move || {
//!         manager.predict("URGENT ! Paiement bloqué").unwrap();
//!     }));
//! }
//!
//! for handle in handles {
//!     handle.join().unwrap();
//! }
//! # Ok(())
//! # }
//! ```

pub mod category;
pub mod classifier;
pub mod config;
pub mod dataset;
pub mod decision;
pub mod model_manager;

pub use category::{Category, UnknownCategory};
pub use classifier::{
    train, Classifier, ClassifierBuilder, ClassifierError, ClassifierInfo, EvaluationReport, ModelMetadata,
    PredictionResult,
};
pub use config::{Settings, TrainingConfig};
pub use dataset::{load_and_validate, load_and_validate_reader, Dataset, DatasetSchema, Example};
pub use decision::{ClassificationRecord, Decision, DecisionTable};
pub use model_manager::{HealthStatus, ModelManager};

/// Initialises `env_logger` at `info` unless `RUST_LOG` says otherwise.
pub fn init_logger() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
}
