use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Result of looking a class name up without failing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodedLabel {
    Known(usize),
    Unknown,
}

/// Bidirectional class name ↔ dense id mapping for one label column.
///
/// Ids follow lexicographic order of the class names, so refitting on the
/// same classes always reproduces the same ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct LabelEncoder {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl LabelEncoder {
    /// Fit on the distinct names in `names`
    pub fn fit<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let classes: Vec<String> = names
            .into_iter()
            .map(|n| n.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        Self::from_classes(classes)
    }

    fn from_classes(classes: Vec<String>) -> Self {
        let index = classes
            .iter()
            .enumerate()
            .map(|(id, name)| (name.clone(), id))
            .collect();
        Self { classes, index }
    }

    /// Name → id; unseen names are an error
    pub fn encode(&self, name: &str) -> Result<usize> {
        self.index.get(name).copied().ok_or_else(|| {
            AppError::Validation(format!("unseen class label '{}'", name))
        })
    }

    /// Encode every name, failing on the first unseen one
    pub fn encode_all<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>> {
        names.iter().map(|n| self.encode(n.as_ref())).collect()
    }

    /// Id → name; out-of-range ids are an error
    pub fn decode(&self, id: usize) -> Result<&str> {
        self.classes.get(id).map(String::as_str).ok_or_else(|| {
            AppError::Validation(format!(
                "class id {} out of range (0..{})",
                id,
                self.classes.len()
            ))
        })
    }

    /// Name → id, with classes never seen at fit time mapping to `Unknown`
    pub fn lookup(&self, name: &str) -> EncodedLabel {
        match self.index.get(name) {
            Some(&id) => EncodedLabel::Known(id),
            None => EncodedLabel::Unknown,
        }
    }

    /// Class names ordered by id
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn n_classes(&self) -> usize {
        self.classes.len()
    }
}

impl From<Vec<String>> for LabelEncoder {
    fn from(classes: Vec<String>) -> Self {
        Self::from_classes(classes)
    }
}

impl From<LabelEncoder> for Vec<String> {
    fn from(encoder: LabelEncoder) -> Self {
        encoder.classes
    }
}
