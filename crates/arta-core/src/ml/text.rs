//! Text feature pipeline: normalization and TF-IDF vectorization
//!
//! The vectorizer is fitted once per training run and reused (never refit)
//! for single-item predictions until the next retrain. Fitting and inference
//! share the identical vocabulary.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Basic Indonesian stop words
const STOP_WORDS: &[&str] = &[
    "di", "ke", "dan", "atau", "yang", "untuk", "pada", "dengan", "ini", "itu",
];

/// Tokens shorter than this are dropped during normalization
const MIN_TOKEN_LENGTH: usize = 3;

/// Normalize a free-text description for vectorization.
///
/// Lowercase, strip everything outside the alphabetic range (replaced with a
/// space), drop stop words and short tokens, rejoin with single spaces.
pub fn normalize_description(text: &str) -> String {
    let lowered = text.to_lowercase();
    let cleaned: String = lowered
        .chars()
        .map(|c| if c.is_alphabetic() { c } else { ' ' })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|word| word.chars().count() >= MIN_TOKEN_LENGTH && !STOP_WORDS.contains(word))
        .collect::<Vec<_>>()
        .join(" ")
}

/// TF-IDF weighted unigram+bigram vectorizer with a capped vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    max_features: usize,
    /// term -> column index into the feature vector
    vocabulary: HashMap<String, usize>,
    /// Smoothed inverse document frequency per column
    idf: Vec<f64>,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        Self {
            max_features,
            vocabulary: HashMap::new(),
            idf: Vec::new(),
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    /// Number of columns in produced vectors
    pub fn dimension(&self) -> usize {
        self.idf.len()
    }

    /// Unigrams plus adjacent-pair bigrams of a normalized document
    fn ngrams(document: &str) -> Vec<String> {
        let tokens: Vec<&str> = document.split_whitespace().collect();
        let mut grams: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
        for pair in tokens.windows(2) {
            grams.push(format!("{} {}", pair[0], pair[1]));
        }
        grams
    }

    /// Fit the vocabulary and IDF weights on a corpus, then transform it.
    ///
    /// Vocabulary keeps the `max_features` most frequent terms across the
    /// corpus; ties break lexicographically so fitting is deterministic.
    pub fn fit_transform(&mut self, documents: &[String]) -> Vec<Vec<f64>> {
        let mut corpus_counts: HashMap<String, u64> = HashMap::new();
        let mut document_frequency: HashMap<String, u64> = HashMap::new();

        for doc in documents {
            let grams = Self::ngrams(doc);
            let mut seen: HashSet<&String> = HashSet::new();
            for gram in &grams {
                *corpus_counts.entry(gram.clone()).or_insert(0) += 1;
                seen.insert(gram);
            }
            for gram in seen {
                *document_frequency.entry(gram.clone()).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<(String, u64)> = corpus_counts.into_iter().collect();
        terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        terms.truncate(self.max_features);

        let n_docs = documents.len() as f64;
        self.vocabulary = HashMap::with_capacity(terms.len());
        self.idf = Vec::with_capacity(terms.len());
        for (index, (term, _)) in terms.into_iter().enumerate() {
            let df = *document_frequency.get(&term).unwrap_or(&0) as f64;
            // Smoothed IDF: never zero, never divides by zero
            self.idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            self.vocabulary.insert(term, index);
        }

        documents
            .iter()
            .map(|doc| self.vectorize(doc))
            .collect()
    }

    /// Transform one normalized document with the fitted vocabulary.
    ///
    /// Transforming with an unfitted vectorizer is an error.
    pub fn transform(&self, document: &str) -> Result<Vec<f64>> {
        if !self.is_fitted() {
            return Err(Error::NotTrained(
                "Vectorizer has not been fitted".to_string(),
            ));
        }
        Ok(self.vectorize(document))
    }

    fn vectorize(&self, document: &str) -> Vec<f64> {
        let mut vector = vec![0.0; self.idf.len()];
        for gram in Self::ngrams(document) {
            if let Some(&index) = self.vocabulary.get(&gram) {
                vector[index] += self.idf[index];
            }
        }

        // L2 normalize so document length does not dominate
        let norm: f64 = vector.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for v in &mut vector {
                *v /= norm;
            }
        }
        vector
    }
}
