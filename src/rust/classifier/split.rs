//! Stratified partitioning of a labelled dataset.
//!
//! Both the hold-out split and the cross-validation folds keep each class's
//! share of the data, and both are reproducible for a given seed.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::error::ClassifierError;
use crate::category::Category;

/// Indices into the dataset for one partition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

fn group_by_class(labels: &[Category]) -> Vec<Vec<usize>> {
    let mut groups = vec![Vec::new(); Category::COUNT];
    for (i, label) in labels.iter().enumerate() {
        groups[label.index()].push(i);
    }
    groups
}

/// Splits `labels` into train and test partitions, class by class.
///
/// The test quota is distributed over classes by largest remainder, then every
/// class keeps at least one example on each side.
pub fn stratified_split(labels: &[Category], test_size: f64, seed: u64) -> Result<Split, ClassifierError> {
    let n = labels.len();
    if n == 0 {
        return Err(ClassifierError::InsufficientDataError("cannot split an empty dataset".into()));
    }

    let groups = group_by_class(labels);
    let present: Vec<usize> = (0..Category::COUNT).filter(|&c| !groups[c].is_empty()).collect();

    for &c in &present {
        if groups[c].len() < 2 {
            return Err(ClassifierError::InsufficientDataError(format!(
                "class '{}' has {} example(s), a stratified train/test split needs at least 2",
                Category::ALL[c],
                groups[c].len()
            )));
        }
    }

    let n_test = (test_size * n as f64).ceil() as usize;
    let n_train = n.saturating_sub(n_test);
    if n_test < present.len() || n_train < present.len() {
        return Err(ClassifierError::InsufficientDataError(format!(
            "{} examples cannot be split into train ({}) and test ({}) partitions covering {} classes",
            n,
            n_train,
            n_test,
            present.len()
        )));
    }

    // Largest remainder allocation of the test quota
    let mut allocation = vec![0usize; Category::COUNT];
    let mut remainders = Vec::with_capacity(present.len());
    for &c in &present {
        let quota = groups[c].len() as f64 * n_test as f64 / n as f64;
        allocation[c] = quota.floor() as usize;
        remainders.push((c, quota - quota.floor()));
    }
    let allocated: usize = allocation.iter().sum();
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    for &(c, _) in remainders.iter().take(n_test.saturating_sub(allocated)) {
        allocation[c] += 1;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);
    for &c in &present {
        let mut indices = groups[c].clone();
        indices.shuffle(&mut rng);
        let take = allocation[c].clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..take]);
        train.extend_from_slice(&indices[take..]);
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(Split { train, test })
}

/// Builds `k` stratified folds; each fold is the test side of one split.
pub fn stratified_kfold(labels: &[Category], k: usize, seed: u64) -> Result<Vec<Split>, ClassifierError> {
    if k < 2 {
        return Err(ClassifierError::ConfigError(format!("k-fold needs k >= 2, got {}", k)));
    }

    let groups = group_by_class(labels);
    for (c, group) in groups.iter().enumerate() {
        if !group.is_empty() && group.len() < k {
            return Err(ClassifierError::InsufficientDataError(format!(
                "class '{}' has {} example(s), {}-fold cross-validation needs at least {}",
                Category::ALL[c],
                group.len(),
                k,
                k
            )));
        }
    }
    if labels.len() < k {
        return Err(ClassifierError::InsufficientDataError(format!(
            "{} examples cannot fill {} folds",
            labels.len(),
            k
        )));
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; labels.len()];
    // Continue the round-robin across classes so fold sizes stay even
    let mut cursor = 0usize;
    for group in &groups {
        let mut indices = group.clone();
        indices.shuffle(&mut rng);
        for idx in indices {
            fold_of[idx] = cursor % k;
            cursor += 1;
        }
    }

    Ok((0..k)
        .map(|fold| {
            let (test, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&i| fold_of[i] == fold);
            Split { train, test }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(counts: [usize; Category::COUNT]) -> Vec<Category> {
        Category::ALL
            .iter()
            .zip(counts)
            .flat_map(|(c, n)| std::iter::repeat(*c).take(n))
            .collect()
    }

    fn share(indices: &[usize], labels: &[Category], category: Category) -> f64 {
        indices.iter().filter(|&&i| labels[i] == category).count() as f64 / indices.len() as f64
    }

    #[test]
    fn test_split_sizes_and_disjointness() {
        let labels = labels([25, 25, 25, 25]);
        let split = stratified_split(&labels, 0.2, 42).unwrap();
        assert_eq!(split.test.len(), 20);
        assert_eq!(split.train.len(), 80);
        let mut all: Vec<usize> = split.train.iter().chain(&split.test).copied().collect();
        all.sort_unstable();
        assert_eq!(all, (0..100).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_preserves_class_shares() {
        let labels = labels([30, 17, 11, 9]);
        let split = stratified_split(&labels, 0.2, 7).unwrap();
        for category in Category::ALL {
            let full = share(&(0..labels.len()).collect::<Vec<_>>(), &labels, category);
            assert!((share(&split.train, &labels, category) - full).abs() <= 1.0 / split.train.len() as f64);
            assert!((share(&split.test, &labels, category) - full).abs() <= 1.0 / split.test.len() as f64);
        }
    }

    #[test]
    fn test_split_is_reproducible() {
        let labels = labels([10, 10, 10, 10]);
        assert_eq!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 42).unwrap()
        );
        assert_ne!(
            stratified_split(&labels, 0.2, 42).unwrap(),
            stratified_split(&labels, 0.2, 43).unwrap()
        );
    }

    #[test]
    fn test_split_rejects_singleton_class() {
        let labels = labels([10, 10, 10, 1]);
        assert!(matches!(
            stratified_split(&labels, 0.2, 42),
            Err(ClassifierError::InsufficientDataError(_))
        ));
    }

    #[test]
    fn test_kfold_covers_every_example_once() {
        let labels = labels([12, 11, 10, 9]);
        let folds = stratified_kfold(&labels, 5, 42).unwrap();
        assert_eq!(folds.len(), 5);
        let mut seen = vec![0usize; labels.len()];
        for fold in &folds {
            assert_eq!(fold.train.len() + fold.test.len(), labels.len());
            for &i in &fold.test {
                seen[i] += 1;
            }
            // Every class is present in every test fold
            for category in Category::ALL {
                assert!(fold.test.iter().any(|&i| labels[i] == category));
            }
        }
        assert!(seen.iter().all(|&s| s == 1));
        let sizes: Vec<usize> = folds.iter().map(|f| f.test.len()).collect();
        assert!(sizes.iter().max().unwrap() - sizes.iter().min().unwrap() <= 1);
    }

    #[test]
    fn test_kfold_rejects_small_class() {
        let labels = labels([10, 10, 10, 4]);
        assert!(matches!(
            stratified_kfold(&labels, 5, 42),
            Err(ClassifierError::InsufficientDataError(_))
        ));
    }
}
