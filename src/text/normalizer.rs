use std::fmt::{self, Write};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use crate::config::PreprocessingConfig;
use crate::error::{AppError, Result};
use crate::text::lemmatizer::Lemmatizer;
use crate::text::stopwords::StopwordSet;

static URL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"http\S+|www\S+").expect("URL_REGEX: invalid pattern"));

static EMAIL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\S+@\S+").expect("EMAIL_REGEX: invalid pattern"));

static PHONE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\+?\d{10,}|\+?\d{3}[-\s]?\d{3}[-\s]?\d{4}").expect("PHONE_REGEX: invalid pattern")
});

static WHITESPACE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("WHITESPACE_REGEX: invalid pattern"));

static DISALLOWED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z\s!?.]").expect("DISALLOWED_REGEX: invalid pattern"));

/// Deterministic text → token string transformation.
///
/// Holds its own stopword set and settings; construct once and share.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    stopwords: StopwordSet,
    lemmatizer: Lemmatizer,
    min_token_length: usize,
    min_tokens: usize,
    ngram_augmentation: bool,
}

impl TextNormalizer {
    pub fn new(config: &PreprocessingConfig) -> Self {
        Self {
            stopwords: StopwordSet::new(&config.extra_stopwords),
            lemmatizer: Lemmatizer::new(),
            min_token_length: config.min_token_length,
            min_tokens: config.min_tokens,
            ngram_augmentation: config.ngram_augmentation,
        }
    }

    /// Normalize `text` into a space-joined token string.
    ///
    /// Returns an empty string when fewer than `min_tokens` lemmas survive.
    pub fn normalize(&self, text: &str) -> String {
        let cleaned = self.clean(text);
        let tokens = tokenize(&cleaned);

        let lemmas: Vec<String> = tokens
            .into_iter()
            .filter(|t| t.chars().count() >= self.min_token_length && !self.stopwords.contains(t))
            .map(|t| self.lemmatizer.lemmatize(t))
            .collect();

        if lemmas.len() < self.min_tokens {
            return String::new();
        }

        let mut terms = lemmas.clone();
        if self.ngram_augmentation {
            for n in 2..=3 {
                terms.extend(lemmas.windows(n).map(|w| w.join("_")));
            }
        }

        terms.join(" ")
    }

    /// Normalize any displayable value, coercing it to text first
    pub fn try_normalize<T: fmt::Display + ?Sized>(&self, value: &T) -> Result<String> {
        let mut text = String::new();
        write!(text, "{}", value).map_err(|e| {
            AppError::Normalization(format!("value is not representable as text: {}", e))
        })?;
        Ok(self.normalize(&text))
    }

    /// Like [`try_normalize`](Self::try_normalize), but a failure degrades to empty output
    pub fn normalize_or_empty<T: fmt::Display + ?Sized>(&self, value: &T) -> String {
        self.try_normalize(value).unwrap_or_else(|e| {
            warn!(error = %e, "Text normalization failed, treating as empty");
            String::new()
        })
    }

    fn clean(&self, text: &str) -> String {
        let text = text.to_lowercase();
        let text = URL_REGEX.replace_all(&text, "");
        let text = EMAIL_REGEX.replace_all(&text, "");
        let text = PHONE_REGEX.replace_all(&text, "");
        let text = WHITESPACE_REGEX.replace_all(&text, " ");
        DISALLOWED_REGEX.replace_all(&text, "").into_owned()
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new(&PreprocessingConfig::default())
    }
}

/// Split into runs of letters and runs of sentence punctuation
fn tokenize(text: &str) -> Vec<&str> {
    let mut tokens = Vec::new();

    for chunk in text.split_whitespace() {
        let mut start = 0;
        let mut prev_alpha: Option<bool> = None;

        for (idx, c) in chunk.char_indices() {
            let is_alpha = c.is_alphabetic();
            if let Some(prev) = prev_alpha {
                if prev != is_alpha {
                    tokens.push(&chunk[start..idx]);
                    start = idx;
                }
            }
            prev_alpha = Some(is_alpha);
        }

        if start < chunk.len() {
            tokens.push(&chunk[start..]);
        }
    }

    tokens
}
