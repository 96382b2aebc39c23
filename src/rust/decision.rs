//! Mapping from a predicted category to a business action and a client reply.
//!
//! The built-in table comes from an exhaustive `match` over [`Category`], so a
//! new category does not compile until it has an entry. Tables loaded from JSON
//! are checked for completeness when they are loaded.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::info;
use serde::{Deserialize, Serialize};

use crate::category::Category;
use crate::classifier::{ClassifierError, PredictionResult};
use crate::config::Settings;

/// Canned texts attached to one category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecisionEntry {
    pub action: String,
    pub reply: String,
}

impl DecisionEntry {
    fn new(action: &str, reply: &str) -> Self {
        Self {
            action: action.to_string(),
            reply: reply.to_string(),
        }
    }
}

fn builtin_entry(category: Category) -> DecisionEntry {
    match category {
        Category::Information => DecisionEntry::new(
            "Réponse automatique envoyée au client avec les informations générales.",
            "Bonjour ! Merci pour votre message. Notre équipe vous répondra avec les informations \
             demandées dans les plus brefs délais. Horaires : Lun–Sam 8h–20h.",
        ),
        Category::Order => DecisionEntry::new(
            "Commande enregistrée dans le système et notification envoyée à l'équipe stock.",
            "Bonjour ! Votre commande a bien été enregistrée. Vous recevrez une confirmation avec \
             les détails de livraison prochainement. Merci de votre confiance !",
        ),
        Category::Complaint => DecisionEntry::new(
            "Ticket de réclamation créé et transmis au responsable service client.",
            "Bonjour ! Nous sommes désolés pour cet inconvénient. Votre réclamation a été transmise \
             à notre responsable service client qui vous contactera dans les 24h.",
        ),
        Category::Urgency => DecisionEntry::new(
            "ALERTE PRIORITAIRE : Notification immédiate envoyée au responsable. Traitement urgent requis.",
            "Votre demande urgente a été transmise immédiatement au responsable. Vous serez contacté \
             dans les plus brefs délais. Merci de votre patience.",
        ),
    }
}

/// What to do with a classified message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Decision {
    pub action_description: String,
    pub client_reply: String,
    /// Confidence fell below the configured review threshold
    pub review_recommended: bool,
}

/// One action and reply per category, plus an optional review threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct DecisionTable {
    entries: [DecisionEntry; Category::COUNT],
    review_threshold: Option<f64>,
}

impl Default for DecisionTable {
    fn default() -> Self {
        Self {
            entries: Category::ALL.map(builtin_entry),
            review_threshold: None,
        }
    }
}

impl DecisionTable {
    /// Builds a table from per-category entries, failing unless every category
    /// has a non-empty action and reply.
    pub fn from_entries(mut entries: BTreeMap<Category, DecisionEntry>) -> Result<Self, ClassifierError> {
        let mut missing = Vec::new();
        for category in Category::ALL {
            match entries.get(&category) {
                Some(entry) if !entry.action.trim().is_empty() && !entry.reply.trim().is_empty() => {}
                _ => missing.push(category.label()),
            }
        }
        if !missing.is_empty() {
            return Err(ClassifierError::ConfigError(format!(
                "decision table must define a non-empty action and reply for every class, missing {:?}",
                missing
            )));
        }

        let mut table = Self::default();
        for category in Category::ALL {
            if let Some(entry) = entries.remove(&category) {
                table.entries[category.index()] = entry;
            }
        }
        Ok(table)
    }

    /// Parses a JSON object keyed by category label.
    ///
    /// ```json
    /// { "Information": { "action": "...", "reply": "..." }, "Commande": { ... }, ... }
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let entries: BTreeMap<Category, DecisionEntry> = serde_json::from_str(json)
            .map_err(|e| ClassifierError::ConfigError(format!("invalid decision table: {}", e)))?;
        Self::from_entries(entries)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            ClassifierError::ConfigError(format!("cannot read decision table {:?}: {}", path, e))
        })?;
        let table = Self::from_json(&json)?;
        info!("Loaded decision table from {:?}", path);
        Ok(table)
    }

    /// The built-in or file-provided table with the configured review threshold.
    pub fn from_settings(settings: &Settings) -> Result<Self, ClassifierError> {
        let table = match &settings.decision_table {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };
        Ok(table.with_review_threshold(settings.review_threshold))
    }

    /// Confidence (percent) under which decisions recommend human review.
    pub fn with_review_threshold(mut self, threshold: Option<f64>) -> Self {
        self.review_threshold = threshold;
        self
    }

    pub fn review_threshold(&self) -> Option<f64> {
        self.review_threshold
    }

    pub fn entry(&self, category: Category) -> &DecisionEntry {
        &self.entries[category.index()]
    }

    /// Total: every category and confidence yields a decision. Confidence only
    /// sets `review_recommended`, never the texts.
    pub fn decide(&self, category: Category, confidence: f64) -> Decision {
        let entry = self.entry(category);
        Decision {
            action_description: entry.action.clone(),
            client_reply: entry.reply.clone(),
            review_recommended: self.review_threshold.is_some_and(|t| confidence < t),
        }
    }

    /// Decides on a prediction and flattens both into one record.
    pub fn compose(&self, prediction: PredictionResult) -> ClassificationRecord {
        let decision = self.decide(prediction.predicted_class, prediction.confidence);
        ClassificationRecord::new(prediction, decision)
    }

    /// Every class with its action and reply.
    pub fn catalog(&self) -> Catalog {
        Catalog {
            classes: Category::ALL.to_vec(),
            actions: Category::ALL
                .iter()
                .map(|c| (*c, self.entry(*c).action.clone()))
                .collect(),
            replies: Category::ALL
                .iter()
                .map(|c| (*c, self.entry(*c).reply.clone()))
                .collect(),
        }
    }
}

/// Listing of the decision table.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    pub classes: Vec<Category>,
    pub actions: BTreeMap<Category, String>,
    #[serde(rename = "reponses_auto")]
    pub replies: BTreeMap<Category, String>,
}

/// Flat record handed to the automation workflow.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationRecord {
    pub message: String,
    pub classe: Category,
    pub confiance: f64,
    pub action_automatique: String,
    pub reponse_client: String,
    pub probabilites: BTreeMap<Category, f64>,
    pub revue_humaine: bool,
}

impl ClassificationRecord {
    pub fn new(prediction: PredictionResult, decision: Decision) -> Self {
        Self {
            message: prediction.text,
            classe: prediction.predicted_class,
            confiance: prediction.confidence,
            action_automatique: decision.action_description,
            reponse_client: decision.client_reply,
            probabilites: prediction.class_probabilities,
            revue_humaine: decision.review_recommended,
        }
    }
}
