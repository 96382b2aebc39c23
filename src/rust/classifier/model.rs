use log::debug;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use super::error::ClassifierError;
use super::utils::{argmax, softmax, sparse_dot, SparseVector};

/// Optimisation settings for [`SoftmaxRegression::fit`].
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Inverse L2 regularisation strength
    pub c: f64,
    pub max_iter: usize,
    /// Step size as a multiple of `1/L`, `L` being the smoothness bound of the loss
    pub learning_rate: f64,
    pub tol: f64,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            c: 1.0,
            max_iter: 1000,
            learning_rate: 1.0,
            tol: 1e-4,
        }
    }
}

impl From<&crate::config::TrainingConfig> for FitOptions {
    fn from(config: &crate::config::TrainingConfig) -> Self {
        Self {
            c: config.c,
            max_iter: config.max_iter,
            learning_rate: config.learning_rate,
            tol: config.tol,
        }
    }
}

/// Multinomial logistic regression over sparse features.
///
/// Minimises the class-balanced mean cross-entropy plus `||W||² / (2·C·n)`
/// with full-batch gradient descent. The intercept is not penalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SoftmaxRegression {
    /// One row of coefficients per class
    weights: Array2<f64>,
    intercept: Array1<f64>,
    n_iter: usize,
    converged: bool,
}

impl SoftmaxRegression {
    /// Fits the model on rows `x` with class indices `y` in `0..n_classes`.
    pub fn fit(
        x: &[SparseVector],
        y: &[usize],
        n_classes: usize,
        n_features: usize,
        options: FitOptions,
    ) -> Result<Self, ClassifierError> {
        if x.is_empty() || x.len() != y.len() {
            return Err(ClassifierError::TrainingError(format!(
                "expected as many labels as rows, got {} rows and {} labels",
                x.len(),
                y.len()
            )));
        }
        if n_classes < 2 {
            return Err(ClassifierError::TrainingError(format!(
                "at least 2 classes are required, got {}",
                n_classes
            )));
        }

        let n = x.len() as f64;
        let mut class_counts = vec![0usize; n_classes];
        for &label in y {
            if label >= n_classes {
                return Err(ClassifierError::TrainingError(format!(
                    "label index {} out of range for {} classes",
                    label, n_classes
                )));
            }
            class_counts[label] += 1;
        }
        if let Some(missing) = class_counts.iter().position(|&c| c == 0) {
            return Err(ClassifierError::TrainingError(format!(
                "class index {} has no training examples",
                missing
            )));
        }

        // Balanced weights: n / (k * n_c)
        let class_weight: Vec<f64> = class_counts
            .iter()
            .map(|&c| n / (n_classes as f64 * c as f64))
            .collect();

        let mut weights = Array2::<f64>::zeros((n_classes, n_features));
        let mut intercept = Array1::<f64>::zeros(n_classes);
        let penalty = 1.0 / (options.c * n);
        let max_sq_norm = x
            .iter()
            .map(|row| row.iter().map(|(_, v)| v * v).sum::<f64>())
            .fold(0.0f64, f64::max);
        let smoothness = 0.5 * (max_sq_norm + 1.0) + penalty;
        let step = options.learning_rate / smoothness;
        let mut probs = vec![0.0; n_classes];
        let mut n_iter = 0;
        let mut converged = false;

        while n_iter < options.max_iter {
            let mut grad_w = &weights * penalty;
            let mut grad_b = Array1::<f64>::zeros(n_classes);

            for (row, &label) in x.iter().zip(y) {
                for (k, p) in probs.iter_mut().enumerate() {
                    *p = sparse_dot(row, weights.row(k)) + intercept[k];
                }
                softmax(&mut probs);

                let sample_weight = class_weight[label] / n;
                for k in 0..n_classes {
                    let target = if k == label { 1.0 } else { 0.0 };
                    let g = sample_weight * (probs[k] - target);
                    grad_b[k] += g;
                    for &(j, v) in row {
                        grad_w[[k, j]] += g * v;
                    }
                }
            }

            n_iter += 1;
            let max_grad = grad_w
                .iter()
                .chain(grad_b.iter())
                .fold(0.0f64, |acc, g| acc.max(g.abs()));
            if !max_grad.is_finite() {
                return Err(ClassifierError::TrainingError(
                    "gradient diverged, lower the learning rate".into(),
                ));
            }
            if max_grad < options.tol {
                converged = true;
                break;
            }

            weights.scaled_add(-step, &grad_w);
            intercept.scaled_add(-step, &grad_b);
        }

        debug!(
            "Softmax regression fitted in {} iterations (converged: {})",
            n_iter, converged
        );

        Ok(Self {
            weights,
            intercept,
            n_iter,
            converged,
        })
    }

    /// Probability of each class for one row; sums to 1.
    pub fn predict_proba(&self, row: &[(usize, f64)]) -> Vec<f64> {
        let mut scores: Vec<f64> = (0..self.n_classes())
            .map(|k| sparse_dot(row, self.weights.row(k)) + self.intercept[k])
            .collect();
        softmax(&mut scores);
        scores
    }

    /// Most probable class index; the lowest index wins ties.
    pub fn predict(&self, row: &[(usize, f64)]) -> usize {
        argmax(&self.predict_proba(row))
    }

    pub fn n_classes(&self) -> usize {
        self.weights.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.weights.ncols()
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }
}
