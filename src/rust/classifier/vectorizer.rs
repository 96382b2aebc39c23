use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use super::error::ClassifierError;
use super::utils::{l2_normalize, SparseVector};

/// Words of two or more word characters.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"))
}

/// Lowercases and strips accents (`é` -> `e`) so spelling variants share features.
pub(crate) fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .collect()
}

/// Splits normalised text into word tokens.
pub(crate) fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    token_pattern()
        .find_iter(&normalized)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Builds all word n-grams with `min <= n <= max`, n-grams joined by a single space.
pub(crate) fn ngrams(tokens: &[String], min: usize, max: usize) -> Vec<String> {
    let mut grams = Vec::new();
    for n in min..=max {
        if n == 0 || n > tokens.len() {
            continue;
        }
        for window in tokens.windows(n) {
            grams.push(window.join(" "));
        }
    }
    grams
}

/// TF-IDF text vectorizer over word n-grams.
///
/// Term frequencies are sublinear (`1 + ln(tf)`), IDF is smoothed
/// (`ln((1 + n) / (1 + df)) + 1`) and every output row is L2-normalised.
/// Once fitted the vectorizer is immutable: `transform` never changes the
/// vocabulary or the weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    ngram_min: usize,
    ngram_max: usize,
    max_features: usize,
    /// Term -> column index, indices assigned in sorted term order
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(ngram_min: usize, ngram_max: usize, max_features: usize) -> Self {
        Self {
            ngram_min,
            ngram_max,
            max_features,
            vocabulary: BTreeMap::new(),
            idf: Vec::new(),
        }
    }

    /// Learns the vocabulary and IDF weights from the given documents.
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<(), ClassifierError> {
        if documents.is_empty() {
            return Err(ClassifierError::TrainingError(
                "cannot fit a vectorizer on an empty corpus".into(),
            ));
        }

        let mut document_frequency: HashMap<String, usize> = HashMap::new();
        let mut corpus_frequency: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let grams = self.analyze(doc.as_ref());
            let unique: HashSet<&String> = grams.iter().collect();
            for gram in unique {
                *document_frequency.entry(gram.clone()).or_insert(0) += 1;
            }
            for gram in grams {
                *corpus_frequency.entry(gram).or_insert(0) += 1;
            }
        }

        if corpus_frequency.is_empty() {
            return Err(ClassifierError::TrainingError(
                "empty vocabulary: documents contain no tokens".into(),
            ));
        }

        // Keep the most frequent terms, ties broken alphabetically
        let mut ranked: Vec<(String, usize)> = corpus_frequency.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(self.max_features);

        let mut terms: Vec<String> = ranked.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut idf = Vec::with_capacity(terms.len());
        for (idx, term) in terms.into_iter().enumerate() {
            let df = document_frequency.get(&term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n) / (1.0 + df)).ln() + 1.0);
            vocabulary.insert(term, idx);
        }

        self.vocabulary = vocabulary;
        self.idf = idf;
        Ok(())
    }

    /// Maps a document to its TF-IDF row. Unknown terms are ignored.
    pub fn transform(&self, document: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for gram in self.analyze(document) {
            if let Some(&idx) = self.vocabulary.get(&gram) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVector = counts
            .into_iter()
            .map(|(idx, tf)| (idx, (1.0 + tf.ln()) * self.idf[idx]))
            .collect();
        l2_normalize(&mut row);
        row
    }

    pub fn transform_all<S: AsRef<str>>(&self, documents: &[S]) -> Vec<SparseVector> {
        documents.iter().map(|d| self.transform(d.as_ref())).collect()
    }

    fn analyze(&self, document: &str) -> Vec<String> {
        ngrams(&tokenize(document), self.ngram_min, self.ngram_max)
    }

    pub fn vocabulary_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn contains(&self, term: &str) -> bool {
        self.vocabulary.contains_key(term)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tokenize_strips_accents_and_case() {
        assert_eq!(
            tokenize("URGENT ! Paiement bloqué, j'ai reçu"),
            vec!["urgent", "paiement", "bloque", "ai", "recu"]
        );
    }

    #[test]
    fn test_unigrams_and_bigrams() {
        let tokens = tokenize("riz en stock");
        let grams = ngrams(&tokens, 1, 2);
        assert_eq!(grams, vec!["riz", "en", "stock", "riz en", "en stock"]);
    }

    #[test]
    fn test_fit_and_transform() {
        let docs = vec!["avez vous du riz", "je commande du riz", "paiement bloqué"];
        let mut vectorizer = TfidfVectorizer::new(1, 2, 5000);
        vectorizer.fit(&docs).unwrap();
        assert!(vectorizer.contains("riz"));
        assert!(vectorizer.contains("du riz"));
        assert!(vectorizer.contains("bloque"));

        let row = vectorizer.transform("riz riz paiement");
        let norm: f64 = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(row.windows(2).all(|w| w[0].0 < w[1].0));
    }

    #[test]
    fn test_rare_terms_weigh_more() {
        let docs = vec!["riz stock", "riz lait", "riz huile"];
        let mut vectorizer = TfidfVectorizer::new(1, 1, 5000);
        vectorizer.fit(&docs).unwrap();
        let row = vectorizer.transform("riz stock");
        let weight = |term: &str| {
            let idx = vectorizer.vocabulary[term];
            row.iter().find(|(i, _)| *i == idx).map(|(_, v)| *v).unwrap()
        };
        assert!(weight("stock") > weight("riz"));
    }

    #[test]
    fn test_max_features_keeps_frequent_terms() {
        let docs = vec!["riz riz riz lait", "riz huile"];
        let mut vectorizer = TfidfVectorizer::new(1, 1, 1);
        vectorizer.fit(&docs).unwrap();
        assert_eq!(vectorizer.vocabulary_size(), 1);
        assert!(vectorizer.contains("riz"));
    }

    #[test]
    fn test_unknown_text_gives_empty_row() {
        let mut vectorizer = TfidfVectorizer::new(1, 2, 10);
        vectorizer.fit(&["bonjour madame"]).unwrap();
        assert!(vectorizer.transform("xyz").is_empty());
    }

    #[test]
    fn test_empty_corpus_is_training_error() {
        let mut vectorizer = TfidfVectorizer::new(1, 2, 10);
        let empty: [&str; 0] = [];
        assert!(matches!(vectorizer.fit(&empty), Err(ClassifierError::TrainingError(_))));
    }
}
