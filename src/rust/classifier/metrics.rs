use std::collections::BTreeMap;
use std::fmt;

use log::info;
use serde::{Deserialize, Serialize};

use crate::category::Category;

/// Name of the score the cross-validation folds report.
pub const PRIMARY_METRIC: &str = "weighted_f1";

/// Precision, recall and F1 for one class.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

/// Scores of a set of predictions against the true labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationMetrics {
    pub accuracy: f64,
    pub macro_f1: f64,
    pub weighted_f1: f64,
    pub per_class: BTreeMap<Category, ClassMetrics>,
    /// Rows are true classes, columns predicted classes, in `Category` order
    pub confusion_matrix: [[usize; Category::COUNT]; Category::COUNT],
}

impl ClassificationMetrics {
    /// Computes every metric from paired true and predicted labels.
    ///
    /// Precision or recall with a zero denominator counts as 0.
    pub fn compute(y_true: &[Category], y_pred: &[Category]) -> Self {
        let mut confusion = [[0usize; Category::COUNT]; Category::COUNT];
        for (t, p) in y_true.iter().zip(y_pred) {
            confusion[t.index()][p.index()] += 1;
        }

        let total = y_true.len().min(y_pred.len());
        let correct: usize = (0..Category::COUNT).map(|c| confusion[c][c]).sum();
        let accuracy = ratio(correct, total);

        let mut per_class = BTreeMap::new();
        let mut macro_sum = 0.0;
        let mut weighted_sum = 0.0;
        for category in Category::ALL {
            let c = category.index();
            let tp = confusion[c][c];
            let support: usize = confusion[c].iter().sum();
            let predicted: usize = confusion.iter().map(|row| row[c]).sum();

            let precision = ratio(tp, predicted);
            let recall = ratio(tp, support);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };

            macro_sum += f1;
            weighted_sum += f1 * support as f64;
            per_class.insert(
                category,
                ClassMetrics {
                    precision,
                    recall,
                    f1,
                    support,
                },
            );
        }

        Self {
            accuracy,
            macro_f1: macro_sum / Category::COUNT as f64,
            weighted_f1: if total > 0 { weighted_sum / total as f64 } else { 0.0 },
            per_class,
            confusion_matrix: confusion,
        }
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Per-fold scores of a cross-validation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossValidation {
    pub folds: usize,
    pub metric: String,
    pub scores: Vec<f64>,
    pub mean: f64,
    pub std: f64,
}

impl CrossValidation {
    pub fn from_scores(scores: Vec<f64>) -> Self {
        let n = scores.len().max(1) as f64;
        let mean = scores.iter().sum::<f64>() / n;
        let variance = scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            folds: scores.len(),
            metric: PRIMARY_METRIC.to_string(),
            scores,
            mean,
            std: variance.sqrt(),
        }
    }
}

/// Everything a training run measured about its model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Which F1 aggregate is the headline score
    pub primary_metric: String,
    pub train_size: usize,
    pub test_size: usize,
    /// Held-out test partition scores
    pub test: ClassificationMetrics,
    /// k-fold scores over the whole dataset
    pub cross_validation: CrossValidation,
}

impl EvaluationReport {
    pub fn primary_score(&self) -> f64 {
        self.test.weighted_f1
    }

    pub fn log(&self) {
        for line in self.to_string().lines() {
            info!("{}", line);
        }
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation on {} held-out examples (trained on {})", self.test_size, self.train_size)?;
        writeln!(f, "{:>14} {:>9} {:>9} {:>9} {:>9}", "", "precision", "recall", "f1-score", "support")?;
        for (category, m) in &self.test.per_class {
            writeln!(
                f,
                "{:>14} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                category.label(),
                m.precision,
                m.recall,
                m.f1,
                m.support
            )?;
        }
        writeln!(f, "{:>14} {:>29.2} {:>9}", "accuracy", self.test.accuracy, self.test_size)?;
        writeln!(f, "{:>14} {:>29.2} {:>9}", "macro avg f1", self.test.macro_f1, self.test_size)?;
        writeln!(f, "{:>14} {:>29.2} {:>9}", "weighted f1", self.test.weighted_f1, self.test_size)?;

        writeln!(f, "Confusion matrix (rows = true, columns = predicted):")?;
        write!(f, "{:>14}", "")?;
        for category in Category::ALL {
            write!(f, " {:>12}", category.label())?;
        }
        writeln!(f)?;
        for category in Category::ALL {
            write!(f, "{:>14}", category.label())?;
            for count in self.test.confusion_matrix[category.index()] {
                write!(f, " {:>12}", count)?;
            }
            writeln!(f)?;
        }

        let cv = &self.cross_validation;
        let scores: Vec<String> = cv.scores.iter().map(|s| format!("{:.3}", s)).collect();
        write!(
            f,
            "{}-fold cross-validation {}: [{}] mean {:.3} (+/- {:.3})",
            cv.folds,
            cv.metric,
            scores.join(", "),
            cv.mean,
            cv.std * 2.0
        )
    }
}
