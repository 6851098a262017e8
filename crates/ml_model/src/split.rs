//! Seeded stratified train/test partitioning.

use std::collections::BTreeMap;

use ndarray::{Array1, Array2, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Error type for partitioning.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SplitError {
    #[error("Test fraction must be strictly between 0 and 1, got {0}")]
    InvalidFraction(f64),

    #[error("Class {label} has {count} sample(s); a stratified split needs at least 2 per class")]
    ClassTooSmall { label: usize, count: usize },

    #[error("A {partition} partition of {size} sample(s) cannot hold all {classes} classes")]
    PartitionTooSmall {
        partition: &'static str,
        size: usize,
        classes: usize,
    },

    #[error("Features have {rows} rows but there are {labels} labels")]
    LengthMismatch { rows: usize, labels: usize },
}

/// Disjoint train/test partitions of a feature matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainTestSplit {
    pub train_indices: Vec<usize>,
    pub test_indices: Vec<usize>,
    pub x_train: Array2<f64>,
    pub x_test: Array2<f64>,
    pub y_train: Array1<usize>,
    pub y_test: Array1<usize>,
}

/// Splits rows so each class keeps its share of the test partition.
///
/// The test partition holds `ceil(test_fraction * n)` rows. Per-class test
/// counts take the floor of their proportional share and the leftover rows go
/// to the largest fractional remainders, lower labels first on ties. Rows are
/// drawn within each class by a `ChaCha8Rng` seeded with `seed`, so a given
/// seed and label vector always yield the same indices.
///
/// # Errors
///
/// Returns an error for a fraction outside `(0, 1)`, a class with fewer than
/// two members, or a partition smaller than the number of classes.
pub fn stratified_indices(
    labels: &[usize],
    test_fraction: f64,
    seed: u64,
) -> Result<(Vec<usize>, Vec<usize>), SplitError> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(SplitError::InvalidFraction(test_fraction));
    }

    let mut by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (index, &label) in labels.iter().enumerate() {
        by_class.entry(label).or_default().push(index);
    }

    if let Some((&label, members)) = by_class.iter().find(|(_, members)| members.len() < 2) {
        return Err(SplitError::ClassTooSmall {
            label,
            count: members.len(),
        });
    }

    let n_samples = labels.len();
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
    let n_test = (test_fraction * n_samples as f64).ceil() as usize;
    let n_train = n_samples - n_test;
    let classes = by_class.len();

    if n_test < classes {
        return Err(SplitError::PartitionTooSmall {
            partition: "test",
            size: n_test,
            classes,
        });
    }
    if n_train < classes {
        return Err(SplitError::PartitionTooSmall {
            partition: "train",
            size: n_train,
            classes,
        });
    }

    let allocation = allocate_test_counts(&by_class, n_test, n_samples);

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut train = Vec::with_capacity(n_train);
    let mut test = Vec::with_capacity(n_test);

    for (label, mut members) in by_class {
        members.shuffle(&mut rng);
        let take = allocation.get(&label).copied().unwrap_or(0);
        let (class_test, class_train) = members.split_at(take);
        test.extend_from_slice(class_test);
        train.extend_from_slice(class_train);
    }

    train.shuffle(&mut rng);
    test.shuffle(&mut rng);

    Ok((train, test))
}

/// Stratified split of `features`/`targets` into train and test partitions.
///
/// # Errors
///
/// See [`stratified_indices`]; also fails if the row and label counts differ.
pub fn stratified_split(
    features: &Array2<f64>,
    targets: &Array1<usize>,
    test_fraction: f64,
    seed: u64,
) -> Result<TrainTestSplit, SplitError> {
    if features.nrows() != targets.len() {
        return Err(SplitError::LengthMismatch {
            rows: features.nrows(),
            labels: targets.len(),
        });
    }

    let labels = targets.to_vec();
    let (train_indices, test_indices) = stratified_indices(&labels, test_fraction, seed)?;

    Ok(TrainTestSplit {
        x_train: features.select(Axis(0), &train_indices),
        x_test: features.select(Axis(0), &test_indices),
        y_train: targets.select(Axis(0), &train_indices),
        y_test: targets.select(Axis(0), &test_indices),
        train_indices,
        test_indices,
    })
}

/// Largest-remainder allocation of `n_test` rows across classes.
///
/// Every class keeps at least one training row.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn allocate_test_counts(
    by_class: &BTreeMap<usize, Vec<usize>>,
    n_test: usize,
    n_samples: usize,
) -> BTreeMap<usize, usize> {
    let mut allocation = BTreeMap::new();
    let mut remainders = Vec::with_capacity(by_class.len());

    for (&label, members) in by_class {
        let share = n_test as f64 * members.len() as f64 / n_samples as f64;
        let floor = share.floor() as usize;
        allocation.insert(label, floor);
        remainders.push((label, share - share.floor(), members.len()));
    }

    let assigned: usize = allocation.values().sum();
    let mut leftover = n_test.saturating_sub(assigned);

    // Larger remainder first; BTreeMap order already puts lower labels first.
    remainders.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (label, _, size) in &remainders {
        if leftover == 0 {
            break;
        }
        if let Some(count) = allocation.get_mut(label) {
            if *count + 1 < *size {
                *count += 1;
                leftover -= 1;
            }
        }
    }

    for (label, count) in &mut allocation {
        let size = by_class.get(label).map_or(0, Vec::len);
        *count = (*count).min(size.saturating_sub(1));
    }

    allocation
}
