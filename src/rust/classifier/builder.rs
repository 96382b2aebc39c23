use std::time::Instant;

use log::{debug, info};

use super::classifier::Classifier;
use super::error::ClassifierError;
use super::metrics::{ClassificationMetrics, CrossValidation, EvaluationReport, PRIMARY_METRIC};
use super::model::{FitOptions, SoftmaxRegression};
use super::split::{stratified_kfold, stratified_split};
use super::vectorizer::TfidfVectorizer;
use crate::category::Category;
use crate::config::TrainingConfig;
use crate::dataset::{Dataset, Example};

/// A builder for training a Classifier with a fluent interface.
///
/// # Example
/// ```rust,no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use pme_classifier::{load_and_validate, Classifier, DatasetSchema, TrainingConfig};
///
/// let dataset = load_and_validate("data/raw/dataset.csv", &DatasetSchema::default())?;
/// let (classifier, report) = Classifier::builder()
///     .with_config(TrainingConfig::default())
///     .with_dataset(dataset)
///     .build()?;
/// println!("weighted F1: {:.3}", report.primary_score());
/// classifier.save("models/classifier.bin")?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct ClassifierBuilder {
    config: TrainingConfig,
    dataset: Option<Dataset>,
    examples: Vec<Example>,
}

impl ClassifierBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the hyperparameters used for the split, the vectorizer and the model
    pub fn with_config(mut self, config: TrainingConfig) -> Self {
        self.config = config;
        self
    }

    /// Trains on an already validated dataset
    pub fn with_dataset(mut self, dataset: Dataset) -> Self {
        self.dataset = Some(dataset);
        self
    }

    /// Adds examples of one category on top of any dataset.
    ///
    /// # Example
    /// ```
    /// use pme_classifier::{Category, ClassifierBuilder};
    ///
    /// let builder = ClassifierBuilder::new()
    ///     .add_examples(Category::Information, vec!["Êtes-vous ouverts dimanche ?"]);
    /// ```
    pub fn add_examples(mut self, label: Category, texts: Vec<impl Into<String>>) -> Self {
        self.examples
            .extend(texts.into_iter().map(|text| Example::new(text, label)));
        self
    }

    /// Validates the data, trains, evaluates and returns the fitted classifier
    /// with its evaluation report.
    pub fn build(self) -> Result<(Classifier, EvaluationReport), ClassifierError> {
        let dataset = match (self.dataset, self.examples.is_empty()) {
            (Some(dataset), true) => dataset,
            (Some(dataset), false) => {
                let mut examples = dataset.examples().to_vec();
                examples.extend(self.examples);
                Dataset::from_examples(examples, 0)?
            }
            (None, _) => Dataset::from_examples(self.examples, 0)?,
        };
        train(&dataset, &self.config)
    }
}

/// Trains a classifier on `dataset` and evaluates it.
///
/// The final model is fitted on the stratified training partition only; the
/// held-out partition is used for the reported metrics and cross-validation
/// runs over the whole dataset without influencing the returned model.
pub fn train(dataset: &Dataset, config: &TrainingConfig) -> Result<(Classifier, EvaluationReport), ClassifierError> {
    config.validate()?;
    if dataset.is_empty() {
        return Err(ClassifierError::InsufficientDataError("the dataset is empty".into()));
    }

    let start = Instant::now();
    let texts = dataset.texts();
    let labels = dataset.labels();

    // Resolve both partitioning schemes up front so an undersized class fails
    // before any fitting
    let split = stratified_split(&labels, config.test_size, config.random_state)?;
    let folds = stratified_kfold(&labels, config.cv_folds, config.random_state)?;

    info!(
        "Split: {} train / {} test (test_size={}, random_state={})",
        split.train.len(),
        split.test.len(),
        config.test_size,
        config.random_state
    );

    let (vectorizer, model) = fit_stages(&texts, &labels, &split.train, config)?;
    info!(
        "Fitted TF-IDF vocabulary of {} terms and softmax regression ({} iterations, converged: {})",
        vectorizer.vocabulary_size(),
        model.n_iter(),
        model.converged()
    );

    let test_metrics = evaluate(&vectorizer, &model, &texts, &labels, &split.test);

    let mut scores = Vec::with_capacity(folds.len());
    for (i, fold) in folds.iter().enumerate() {
        let (fold_vectorizer, fold_model) = fit_stages(&texts, &labels, &fold.train, config)?;
        let score = evaluate(&fold_vectorizer, &fold_model, &texts, &labels, &fold.test).weighted_f1;
        debug!("Fold {}/{}: {} = {:.4}", i + 1, folds.len(), PRIMARY_METRIC, score);
        scores.push(score);
    }

    let report = EvaluationReport {
        primary_metric: PRIMARY_METRIC.to_string(),
        train_size: split.train.len(),
        test_size: split.test.len(),
        test: test_metrics,
        cross_validation: CrossValidation::from_scores(scores),
    };
    report.log();

    let classifier = Classifier::from_parts(vectorizer, model, split.train.len(), config.clone())?;
    info!("Training finished in {:.2?}", start.elapsed());
    Ok((classifier, report))
}

/// Fits a fresh vectorizer and model on the rows at `indices`.
fn fit_stages(
    texts: &[&str],
    labels: &[Category],
    indices: &[usize],
    config: &TrainingConfig,
) -> Result<(TfidfVectorizer, SoftmaxRegression), ClassifierError> {
    let docs: Vec<&str> = indices.iter().map(|&i| texts[i]).collect();
    let y: Vec<usize> = indices.iter().map(|&i| labels[i].index()).collect();

    let mut vectorizer = TfidfVectorizer::new(config.ngram_min, config.ngram_max, config.max_features);
    vectorizer.fit(&docs)?;
    let x = vectorizer.transform_all(&docs);
    let model = SoftmaxRegression::fit(
        &x,
        &y,
        Category::COUNT,
        vectorizer.vocabulary_size(),
        FitOptions::from(config),
    )?;
    Ok((vectorizer, model))
}

fn evaluate(
    vectorizer: &TfidfVectorizer,
    model: &SoftmaxRegression,
    texts: &[&str],
    labels: &[Category],
    indices: &[usize],
) -> ClassificationMetrics {
    let y_true: Vec<Category> = indices.iter().map(|&i| labels[i]).collect();
    let y_pred: Vec<Category> = indices
        .iter()
        .map(|&i| Category::ALL[model.predict(&vectorizer.transform(texts[i]))])
        .collect();
    ClassificationMetrics::compute(&y_true, &y_pred)
}
