use ndarray::ArrayView1;

/// Sparse row as `(column, value)` pairs sorted by column.
pub type SparseVector = Vec<(usize, f64)>;

pub(crate) fn l2_normalize(vec: &mut SparseVector) {
    let norm: f64 = vec.iter().map(|(_, x)| x * x).sum::<f64>().sqrt();
    if norm > 1e-12 {
        for (_, x) in vec.iter_mut() {
            *x /= norm;
        }
    }
}

pub(crate) fn sparse_dot(sparse: &[(usize, f64)], dense: ArrayView1<f64>) -> f64 {
    sparse.iter().map(|&(idx, x)| x * dense[idx]).sum()
}

/// Numerically stable softmax, in place.
pub(crate) fn softmax(logits: &mut [f64]) {
    let max = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for z in logits.iter_mut() {
        *z = (*z - max).exp();
        sum += *z;
    }
    for z in logits.iter_mut() {
        *z /= sum;
    }
}

/// Index of the largest value; the earliest index wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}

/// Probability in [0, 1] as a percentage with one decimal.
pub(crate) fn to_percent(probability: f64) -> f64 {
    (probability * 1000.0).round() / 10.0
}
