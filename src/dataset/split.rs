//! Stratified train/validation splitting and k-fold assignment

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

/// Row indices of one train/validation partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
}

fn indices_by_class(labels: &[usize]) -> BTreeMap<usize, Vec<usize>> {
    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (idx, &label) in labels.iter().enumerate() {
        groups.entry(label).or_default().push(idx);
    }
    groups
}

/// Split so each class keeps roughly `test_size` of its rows for validation.
///
/// Every class keeps at least one training row.
pub fn stratified_split(labels: &[usize], test_size: f64, seed: u64) -> SplitIndices {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(labels.len());
    let mut validation = Vec::new();

    for (_, mut indices) in indices_by_class(labels) {
        indices.shuffle(&mut rng);
        let n_validation = ((indices.len() as f64 * test_size).round() as usize)
            .min(indices.len().saturating_sub(1));

        validation.extend_from_slice(&indices[..n_validation]);
        train.extend_from_slice(&indices[n_validation..]);
    }

    train.shuffle(&mut rng);
    validation.shuffle(&mut rng);

    SplitIndices { train, validation }
}

/// Stratified k-fold partitions; folds with no validation rows are skipped
pub fn stratified_k_fold(labels: &[usize], k: usize, seed: u64) -> Vec<SplitIndices> {
    let k = k.max(2);
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fold_of = vec![0usize; labels.len()];

    let mut offset = 0;
    for (_, mut indices) in indices_by_class(labels) {
        indices.shuffle(&mut rng);
        for (position, idx) in indices.into_iter().enumerate() {
            fold_of[idx] = (offset + position) % k;
        }
        offset += 1;
    }

    (0..k)
        .map(|fold| {
            let (validation, train): (Vec<usize>, Vec<usize>) =
                (0..labels.len()).partition(|&idx| fold_of[idx] == fold);
            SplitIndices { train, validation }
        })
        .filter(|split| !split.validation.is_empty() && !split.train.is_empty())
        .collect()
}
