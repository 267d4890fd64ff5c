use crate::config::FeatureConfig;
use crate::error::{AppError, Result};
use ndarray::Array2;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

static WORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w+\b").expect("WORD_REGEX: invalid pattern"));

/// TF-IDF feature extractor over word n-grams
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Configuration
    config: FeatureConfig,

    /// Vocabulary mapping (term -> column)
    vocabulary: HashMap<String, usize>,

    /// Inverse document frequency per column
    idf_values: Vec<f64>,

    /// Number of documents seen at fit time
    n_documents: usize,

    /// Is fitted (vocabulary built)
    is_fitted: bool,
}

impl TfidfVectorizer {
    /// Create a new vectorizer
    pub fn new(config: FeatureConfig) -> Self {
        Self {
            config,
            vocabulary: HashMap::new(),
            idf_values: Vec::new(),
            n_documents: 0,
            is_fitted: false,
        }
    }

    /// Build vocabulary and IDF weights from `documents`
    pub fn fit<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<()> {
        let n_docs = documents.len();
        if n_docs == 0 {
            return Err(AppError::InsufficientData(
                "cannot fit TF-IDF vocabulary on zero documents".to_string(),
            ));
        }

        let mut term_doc_freq: HashMap<String, usize> = HashMap::new();
        let mut term_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let terms = self.extract_terms(doc.as_ref());
            let unique_terms: HashSet<&String> = terms.iter().collect();

            for term in unique_terms {
                *term_doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *term_freq.entry(term).or_insert(0) += 1;
            }
        }

        let min_df = self.config.min_df;
        let max_df = (self.config.max_df * n_docs as f64).floor() as usize;
        if max_df < min_df {
            return Err(AppError::Configuration(format!(
                "max_df ({}) leaves fewer documents ({}) than min_df ({})",
                self.config.max_df, max_df, min_df
            )));
        }

        // Filter vocabulary by document frequency
        let mut vocab_list: Vec<(String, usize)> = term_doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= min_df && *df <= max_df)
            .map(|(term, _)| {
                let tf = term_freq.get(&term).copied().unwrap_or(0);
                (term, tf)
            })
            .collect();

        if vocab_list.is_empty() {
            return Err(AppError::InsufficientData(format!(
                "no terms remain after pruning with min_df = {} and max_df = {}",
                self.config.min_df, self.config.max_df
            )));
        }

        // Keep the most frequent terms, then order columns lexicographically
        vocab_list.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        vocab_list.truncate(self.config.max_features);
        let mut terms: Vec<String> = vocab_list.into_iter().map(|(term, _)| term).collect();
        terms.sort();

        self.vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(idx, term)| (term, idx))
            .collect();

        // Smoothed IDF: ln((1 + n) / (1 + df)) + 1
        let mut doc_freq = vec![0usize; self.vocabulary.len()];
        for doc in documents {
            let columns: HashSet<usize> = self
                .extract_terms(doc.as_ref())
                .iter()
                .filter_map(|t| self.vocabulary.get(t).copied())
                .collect();
            for col in columns {
                doc_freq[col] += 1;
            }
        }

        self.idf_values = doc_freq
            .into_iter()
            .map(|df| ((1.0 + n_docs as f64) / (1.0 + df as f64)).ln() + 1.0)
            .collect();
        self.n_documents = n_docs;
        self.is_fitted = true;

        Ok(())
    }

    /// Transform documents into an L2-normalized TF-IDF matrix
    pub fn transform<S: AsRef<str>>(&self, documents: &[S]) -> Result<Array2<f64>> {
        if !self.is_fitted {
            return Err(AppError::Model(
                "TfidfVectorizer must be fitted before transform".to_string(),
            ));
        }

        let mut features = Array2::zeros((documents.len(), self.vocabulary.len()));

        for (row, doc) in documents.iter().enumerate() {
            for term in self.extract_terms(doc.as_ref()) {
                if let Some(&col) = self.vocabulary.get(&term) {
                    features[[row, col]] += 1.0;
                }
            }

            let mut row_view = features.row_mut(row);
            for (col, value) in row_view.iter_mut().enumerate() {
                *value *= self.idf_values[col];
            }

            let norm = row_view.iter().map(|v| v * v).sum::<f64>().sqrt();
            if norm > 0.0 {
                row_view.mapv_inplace(|v| v / norm);
            }
        }

        Ok(features)
    }

    /// Fit and transform in one step
    pub fn fit_transform<S: AsRef<str>>(&mut self, documents: &[S]) -> Result<Array2<f64>> {
        self.fit(documents)?;
        self.transform(documents)
    }

    /// Word n-grams of a document
    fn extract_terms(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = WORD_REGEX.find_iter(text).map(|m| m.as_str()).collect();

        let (min_n, max_n) = self.config.ngram_range;
        let mut terms = Vec::new();

        for n in min_n.max(1)..=max_n.max(min_n.max(1)) {
            for window in words.windows(n) {
                terms.push(window.join(" "));
            }
        }

        terms
    }

    /// Get number of features
    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Check if fitted
    pub fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    /// Get vocabulary size
    pub fn vocab_size(&self) -> usize {
        self.vocabulary.len()
    }

    pub fn n_documents(&self) -> usize {
        self.n_documents
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_df: usize, max_df: f64) -> FeatureConfig {
        FeatureConfig {
            max_features: 100,
            ngram_range: (1, 2),
            min_df,
            max_df,
        }
    }

    fn corpus() -> Vec<&'static str> {
        vec![
            "upi fraud money debited",
            "upi fraud account debited",
            "email account hacked password",
            "email account hacked login",
        ]
    }

    #[test]
    fn test_vectorizer_creation() {
        let vectorizer = TfidfVectorizer::new(FeatureConfig::default());

        assert!(!vectorizer.is_fitted());
        assert_eq!(vectorizer.vocab_size(), 0);
    }

    #[test]
    fn test_min_df_prunes_rare_terms() {
        let mut vectorizer = TfidfVectorizer::new(config(2, 1.0));
        vectorizer.fit(&corpus()).unwrap();

        assert!(vectorizer.vocabulary.contains_key("upi fraud"));
        assert!(vectorizer.vocabulary.contains_key("hacked"));
        assert!(!vectorizer.vocabulary.contains_key("password"));
        assert!(!vectorizer.vocabulary.contains_key("money"));
    }

    #[test]
    fn test_max_df_prunes_common_terms() {
        let mut vectorizer = TfidfVectorizer::new(config(1, 0.5));
        vectorizer.fit(&corpus()).unwrap();

        // "account" appears in 3 of 4 documents
        assert!(!vectorizer.vocabulary.contains_key("account"));
        assert!(vectorizer.vocabulary.contains_key("upi"));
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let mut cfg = config(1, 1.0);
        cfg.max_features = 1;
        let mut vectorizer = TfidfVectorizer::new(cfg);
        vectorizer.fit(&corpus()).unwrap();

        assert_eq!(vectorizer.vocab_size(), 1);
        assert!(vectorizer.vocabulary.contains_key("account"));
    }

    #[test]
    fn test_rows_are_l2_normalized() {
        let mut vectorizer = TfidfVectorizer::new(config(2, 1.0));
        let matrix = vectorizer.fit_transform(&corpus()).unwrap();

        assert_eq!(matrix.nrows(), 4);
        assert_eq!(matrix.ncols(), vectorizer.n_features());
        for row in matrix.rows() {
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_terms_give_zero_row() {
        let mut vectorizer = TfidfVectorizer::new(config(2, 1.0));
        vectorizer.fit(&corpus()).unwrap();

        let matrix = vectorizer.transform(&["completely unrelated words"]).unwrap();
        assert!(matrix.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let vectorizer = TfidfVectorizer::new(FeatureConfig::default());
        assert!(vectorizer.transform(&["text"]).is_err());
    }

    #[test]
    fn test_no_terms_after_pruning() {
        // No term appears in all four documents
        let mut vectorizer = TfidfVectorizer::new(config(4, 1.0));
        let err = vectorizer.fit(&corpus()).unwrap_err();
        assert!(matches!(err, AppError::InsufficientData(_)));
        assert!(!vectorizer.is_fitted());
    }

    #[test]
    fn test_max_df_below_min_df_is_configuration_error() {
        let mut vectorizer = TfidfVectorizer::new(config(5, 1.0));
        let err = vectorizer.fit(&corpus()).unwrap_err();
        assert!(matches!(err, AppError::Configuration(_)));
    }
}
