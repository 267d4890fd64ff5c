//! Rule-based English noun lemmatizer.
//!
//! Irregular plurals are looked up in a fixed table; regular plurals go
//! through suffix detachment rules, longest suffix first. Words that only
//! look plural (`business`, `status`, `analysis`, `series`, `always`) are
//! left alone.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;

static IRREGULAR_NOUNS: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    [
        ("men", "man"),
        ("women", "woman"),
        ("children", "child"),
        ("feet", "foot"),
        ("teeth", "tooth"),
        ("mice", "mouse"),
        ("geese", "goose"),
        ("wives", "wife"),
        ("knives", "knife"),
        ("lives", "life"),
        ("thieves", "thief"),
        ("halves", "half"),
        ("selves", "self"),
        ("shelves", "shelf"),
        ("leaves", "leaf"),
        ("wolves", "wolf"),
        ("data", "datum"),
        ("media", "medium"),
        ("criteria", "criterion"),
        ("phenomena", "phenomenon"),
        ("analyses", "analysis"),
        ("crises", "crisis"),
        ("diagnoses", "diagnosis"),
        ("indices", "index"),
        ("matrices", "matrix"),
        ("businesses", "business"),
        ("addresses", "address"),
        ("passes", "pass"),
        ("losses", "loss"),
        ("buses", "bus"),
        ("viruses", "virus"),
        ("statuses", "status"),
    ]
    .into_iter()
    .collect()
});

/// Words ending in `s` that are their own lemma
static INVARIANT_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "always", "perhaps", "sometimes", "afterwards", "towards", "besides", "whereas",
        "unless", "nowadays", "series", "species", "clothes", "news", "means", "goods",
        "savings", "earnings", "headquarters", "premises", "scissors", "trousers", "jeans",
        "thanks", "alias", "bias", "gas", "lens", "chaos", "canvas", "atlas", "yes", "this",
        "thus", "was", "does", "its", "his", "hers", "ours", "yours", "theirs",
    ]
    .into_iter()
    .collect()
});

/// Endings of singular words that must not lose a trailing `s`
const SINGULAR_S_ENDINGS: &[&str] = &["ss", "us", "is", "ous", "ics", "ws"];

/// Detachment rules `(suffix, replacement)`, tried in order
const SUFFIX_RULES: &[(&str, &str)] = &[
    ("sses", "ss"),
    ("ches", "ch"),
    ("shes", "sh"),
    ("xes", "x"),
    ("ies", "y"),
    ("s", ""),
];

/// Shortest lemma the rules are allowed to produce
const MIN_STEM_LEN: usize = 3;

#[derive(Debug, Clone, Copy, Default)]
pub struct Lemmatizer;

impl Lemmatizer {
    pub fn new() -> Self {
        Self
    }

    /// Reduce a lowercase token to its noun lemma
    pub fn lemmatize(&self, word: &str) -> String {
        if let Some(lemma) = IRREGULAR_NOUNS.get(word) {
            return (*lemma).to_string();
        }

        if !word.ends_with('s')
            || INVARIANT_WORDS.contains(word)
            || SINGULAR_S_ENDINGS.iter().any(|e| word.ends_with(e)) {
            return word.to_string();
        }

        for (suffix, replacement) in SUFFIX_RULES {
            if let Some(stem) = word.strip_suffix(suffix) {
                if stem.chars().count() + replacement.len() < MIN_STEM_LEN {
                    return word.to_string();
                }
                return format!("{}{}", stem, replacement);
            }
        }

        word.to_string()
    }
}
