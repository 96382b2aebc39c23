//! Loading and validation of labelled customer messages.
//!
//! A dataset is a CSV file with a header row and (at least) a text column and a
//! label column. Every row must have a non-empty text and a label from the fixed
//! [`Category`] vocabulary, and every category must be represented.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use log::{info, warn};

use crate::category::Category;
use crate::classifier::ClassifierError;

/// Texts shorter than this are suspicious but still accepted.
const SHORT_TEXT_CHARS: usize = 5;

/// One labelled customer message.
#[derive(Debug, Clone, PartialEq)]
pub struct Example {
    pub text: String,
    pub label: Category,
}

impl Example {
    pub fn new(text: impl Into<String>, label: Category) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Where to find the dataset columns and how much data is required.
#[derive(Debug, Clone)]
pub struct DatasetSchema {
    pub text_column: String,
    pub label_column: String,
    pub min_examples: usize,
}

impl Default for DatasetSchema {
    fn default() -> Self {
        Self {
            text_column: "texte".to_string(),
            label_column: "classe".to_string(),
            min_examples: 20,
        }
    }
}

impl From<&crate::config::Settings> for DatasetSchema {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            text_column: settings.text_column.clone(),
            label_column: settings.label_column.clone(),
            min_examples: settings.min_examples,
        }
    }
}

/// An ordered, validated sequence of examples.
///
/// Only constructible through validation, so holders can rely on every text
/// being non-empty and every category being present.
#[derive(Debug, Clone)]
pub struct Dataset {
    examples: Vec<Example>,
}

impl Dataset {
    /// Validates an in-memory list of examples.
    pub fn from_examples(examples: Vec<Example>, min_examples: usize) -> Result<Self, ClassifierError> {
        let examples: Vec<Example> = examples
            .into_iter()
            .map(|e| Example::new(e.text.trim(), e.label))
            .collect();

        if let Some(pos) = examples.iter().position(|e| e.text.is_empty()) {
            return Err(ClassifierError::DataQualityError {
                row: pos + 1,
                field: "text".into(),
                detail: "text is empty".into(),
            });
        }

        let dataset = Self { examples };
        dataset.check_coverage(min_examples)?;
        Ok(dataset)
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.text.as_str()).collect()
    }

    pub fn labels(&self) -> Vec<Category> {
        self.examples.iter().map(|e| e.label).collect()
    }

    /// Number of examples per category, in [`Category::ALL`] order.
    pub fn class_counts(&self) -> [usize; Category::COUNT] {
        let mut counts = [0usize; Category::COUNT];
        for example in &self.examples {
            counts[example.label.index()] += 1;
        }
        counts
    }

    fn check_coverage(&self, min_examples: usize) -> Result<(), ClassifierError> {
        if self.examples.len() < min_examples {
            return Err(ClassifierError::InsufficientDataError(format!(
                "expected at least {} examples, got {}",
                min_examples,
                self.examples.len()
            )));
        }

        let counts = self.class_counts();
        let missing: Vec<&str> = Category::ALL
            .iter()
            .filter(|c| counts[c.index()] == 0)
            .map(|c| c.label())
            .collect();
        if !missing.is_empty() {
            return Err(ClassifierError::InsufficientDataError(format!(
                "every class needs at least one example, none found for {:?}",
                missing
            )));
        }
        Ok(())
    }

    /// Logs the class distribution; diagnostic only.
    pub fn log_summary(&self) {
        let counts = self.class_counts();
        let total = self.examples.len().max(1);
        info!("── Class distribution ─────────────────────────");
        for category in Category::ALL {
            let count = counts[category.index()];
            info!(
                "   {:<15} : {:>4} examples ({:.1}%)",
                category.label(),
                count,
                count as f64 / total as f64 * 100.0
            );
        }
        info!("   {:<15} : {:>4} examples", "TOTAL", self.examples.len());
    }
}

/// Loads a CSV dataset from disk and validates it.
pub fn load_and_validate(path: impl AsRef<Path>, schema: &DatasetSchema) -> Result<Dataset, ClassifierError> {
    let path = path.as_ref();
    info!("Loading dataset: {}", path.display());

    let file = File::open(path).map_err(|e| ClassifierError::DatasetUnreadable {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let dataset = load_and_validate_reader(file, schema).map_err(|e| match e {
        ClassifierError::DatasetUnreadable { reason, .. } => ClassifierError::DatasetUnreadable {
            path: path.to_path_buf(),
            reason,
        },
        other => other,
    })?;

    info!("{} examples loaded", dataset.len());
    Ok(dataset)
}

/// Validates CSV data from any reader.
pub fn load_and_validate_reader<R: Read>(reader: R, schema: &DatasetSchema) -> Result<Dataset, ClassifierError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = csv_reader
        .headers()
        .map_err(|e| ClassifierError::DatasetUnreadable {
            path: Default::default(),
            reason: e.to_string(),
        })?
        .clone();

    let found: Vec<String> = headers.iter().map(|h| h.trim_start_matches('\u{feff}').to_string()).collect();
    let position = |name: &str| found.iter().position(|h| h == name);

    let (text_idx, label_idx) = match (position(&schema.text_column), position(&schema.label_column)) {
        (Some(t), Some(l)) => (t, l),
        (t, l) => {
            let mut missing = Vec::new();
            if t.is_none() {
                missing.push(schema.text_column.clone());
            }
            if l.is_none() {
                missing.push(schema.label_column.clone());
            }
            return Err(ClassifierError::SchemaError { missing, found });
        }
    };

    let mut examples = Vec::new();
    let mut short_texts = 0usize;

    for (i, record) in csv_reader.records().enumerate() {
        // Row numbers are 1-based and exclude the header
        let row = i + 1;
        let record = record.map_err(|e| ClassifierError::DataQualityError {
            row,
            field: "record".into(),
            detail: e.to_string(),
        })?;

        let text = record.get(text_idx).unwrap_or("").trim();
        let label = record.get(label_idx).unwrap_or("").trim();

        if text.is_empty() {
            return Err(ClassifierError::DataQualityError {
                row,
                field: schema.text_column.clone(),
                detail: "value is null or empty".into(),
            });
        }
        if label.is_empty() {
            return Err(ClassifierError::DataQualityError {
                row,
                field: schema.label_column.clone(),
                detail: "value is null or empty".into(),
            });
        }

        let label = label.parse::<Category>().map_err(|_| ClassifierError::InvalidLabelError {
            row,
            value: label.to_string(),
            expected: Category::labels(),
        })?;

        if text.chars().count() < SHORT_TEXT_CHARS {
            short_texts += 1;
        }
        examples.push(Example::new(text, label));
    }

    if short_texts > 0 {
        warn!(
            "{} very short text(s) detected (< {} characters), check their relevance",
            short_texts, SHORT_TEXT_CHARS
        );
    }

    let dataset = Dataset::from_examples(examples, schema.min_examples)?;
    info!("Dataset validation: OK");
    dataset.log_summary();
    Ok(dataset)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(min_examples: usize) -> DatasetSchema {
        DatasetSchema {
            min_examples,
            ..DatasetSchema::default()
        }
    }

    const VALID: &str = "texte,classe\n\
        Avez-vous du lait ?,Information\n\
        Je veux commander du riz,Commande\n\
        Produit périmé reçu,Réclamation\n\
        URGENT paiement bloqué,Urgence\n";

    #[test]
    fn test_loads_valid_csv() {
        let dataset = load_and_validate_reader(VALID.as_bytes(), &schema(4)).unwrap();
        assert_eq!(dataset.len(), 4);
        assert_eq!(dataset.class_counts(), [1, 1, 1, 1]);
        assert_eq!(dataset.examples()[2].text, "Produit périmé reçu");
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let csv = "message,classe\nBonjour,Information\n";
        match load_and_validate_reader(csv.as_bytes(), &schema(1)) {
            Err(ClassifierError::SchemaError { missing, found }) => {
                assert_eq!(missing, vec!["texte".to_string()]);
                assert_eq!(found, vec!["message".to_string(), "classe".to_string()]);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_text_is_data_quality_error() {
        let csv = "texte,classe\nBonjour,Information\n   ,Commande\n";
        match load_and_validate_reader(csv.as_bytes(), &schema(1)) {
            Err(ClassifierError::DataQualityError { row, field, .. }) => {
                assert_eq!(row, 2);
                assert_eq!(field, "texte");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_empty_label_is_data_quality_error() {
        let csv = "texte,classe\nBonjour,\n";
        assert!(matches!(
            load_and_validate_reader(csv.as_bytes(), &schema(1)),
            Err(ClassifierError::DataQualityError { row: 1, .. })
        ));
    }

    #[test]
    fn test_unknown_label_is_invalid_label_error() {
        let csv = "texte,classe\nBonjour,Spam\n";
        match load_and_validate_reader(csv.as_bytes(), &schema(1)) {
            Err(ClassifierError::InvalidLabelError { row, value, expected }) => {
                assert_eq!(row, 1);
                assert_eq!(value, "Spam");
                assert_eq!(expected.len(), Category::COUNT);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_too_few_examples_is_insufficient_data() {
        assert!(matches!(
            load_and_validate_reader(VALID.as_bytes(), &schema(10)),
            Err(ClassifierError::InsufficientDataError(_))
        ));
    }

    #[test]
    fn test_missing_class_is_insufficient_data() {
        let csv = "texte,classe\nBonjour,Information\nJe commande,Commande\n";
        let err = load_and_validate_reader(csv.as_bytes(), &schema(1)).unwrap_err();
        assert!(matches!(err, ClassifierError::InsufficientDataError(_)));
        assert!(err.to_string().contains("Urgence"));
    }

    #[test]
    fn test_missing_file_is_unreadable() {
        let err = load_and_validate("/nonexistent/dataset.csv", &schema(1)).unwrap_err();
        assert!(matches!(err, ClassifierError::DatasetUnreadable { .. }));
    }
}
