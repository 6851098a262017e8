//! k-nearest-neighbours vote over the stored training rows.

use std::collections::BTreeMap;

use anyhow::{anyhow, ensure};
use linfa_nn::distance::L2Dist;
use linfa_nn::{CommonNearestNeighbour, NearestNeighbour};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::metrics::POSITIVE_LABEL;
use crate::Classifier;

/// Neighbours consulted per prediction.
pub const DEFAULT_NEIGHBORS: usize = 5;

/// Lazy classifier: fitting stores the training rows, prediction runs a
/// kd-tree lookup and a majority vote.
///
/// Vote ties go to the lowest label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnnClassifier {
    n_neighbors: usize,
    records: Array2<f64>,
    labels: Array1<usize>,
}

impl KnnClassifier {
    /// Stores the training rows.
    ///
    /// # Errors
    ///
    /// Fails on an empty training set or mismatched row and label counts.
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, n_neighbors: usize) -> anyhow::Result<Self> {
        ensure!(x.nrows() > 0, "KNN needs at least one training row");
        ensure!(
            x.nrows() == y.len(),
            "KNN got {} rows but {} labels",
            x.nrows(),
            y.len()
        );
        ensure!(n_neighbors > 0, "KNN needs at least one neighbour");

        Ok(Self {
            n_neighbors,
            records: x.clone(),
            labels: y.clone(),
        })
    }

    #[must_use]
    pub const fn n_neighbors(&self) -> usize {
        self.n_neighbors
    }
}

impl KnnClassifier {
    /// Labels of the `k` nearest training rows for each row of `x`.
    fn neighbour_labels(&self, x: &Array2<f64>) -> anyhow::Result<Vec<Vec<usize>>> {
        ensure!(
            x.ncols() == self.records.ncols(),
            "KNN was fitted on {} features, got {}",
            self.records.ncols(),
            x.ncols()
        );

        let index = CommonNearestNeighbour::KdTree
            .from_batch(&self.records, L2Dist)
            .map_err(|e| anyhow!("failed to build kd-tree: {e}"))?;
        let k = self.n_neighbors.min(self.records.nrows());

        x.rows()
            .into_iter()
            .map(|row| -> anyhow::Result<Vec<usize>> {
                let neighbours = index
                    .k_nearest(row, k)
                    .map_err(|e| anyhow!("nearest-neighbour query failed: {e}"))?;
                Ok(neighbours
                    .into_iter()
                    .map(|(_, position)| self.labels[position])
                    .collect())
            })
            .collect()
    }
}

impl Classifier for KnnClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        let predictions = self
            .neighbour_labels(x)?
            .into_iter()
            .map(|labels| {
                let mut votes: BTreeMap<usize, usize> = BTreeMap::new();
                for label in labels {
                    *votes.entry(label).or_insert(0) += 1;
                }

                // Strictly greater keeps the lowest label on ties.
                let mut best = (0, 0);
                for (label, count) in votes {
                    if count > best.1 {
                        best = (label, count);
                    }
                }
                best.0
            })
            .collect();

        Ok(predictions)
    }

    #[allow(clippy::cast_precision_loss)]
    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        let shares = self
            .neighbour_labels(x)?
            .into_iter()
            .map(|labels| {
                let positive = labels.iter().filter(|&&l| l == POSITIVE_LABEL).count();
                positive as f64 / labels.len().max(1) as f64
            })
            .collect();

        Ok(shares)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_majority_vote() {
        let x = array![[0.0, 0.0], [0.1, 0.0], [0.0, 0.1], [5.0, 5.0], [5.1, 5.0], [5.0, 5.1]];
        let y = array![0, 0, 0, 1, 1, 1];
        let knn = KnnClassifier::fit(&x, &y, 3).expect("fit");

        let predictions = knn.predict(&array![[0.05, 0.05], [4.9, 5.2]]).expect("predict");
        assert_eq!(predictions, array![0, 1]);
    }

    #[test]
    fn test_tie_goes_to_lowest_label() {
        let x = array![[-1.0], [1.0]];
        let y = array![1, 0];
        let knn = KnnClassifier::fit(&x, &y, 2).expect("fit");

        assert_eq!(knn.predict(&array![[0.0]]).expect("predict"), array![0]);
    }

    #[test]
    fn test_k_larger_than_training_set() {
        let x = array![[0.0], [1.0], [2.0]];
        let y = array![1, 1, 0];
        let knn = KnnClassifier::fit(&x, &y, DEFAULT_NEIGHBORS).expect("fit");

        assert_eq!(knn.n_neighbors(), DEFAULT_NEIGHBORS);
        assert_eq!(knn.predict(&array![[2.0]]).expect("predict"), array![1]);
    }

    #[test]
    fn test_probability_is_positive_vote_share() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [10.0]];
        let y = array![1, 1, 0, 0, 1];
        let knn = KnnClassifier::fit(&x, &y, 4).expect("fit");

        let shares = knn.predict_proba(&array![[1.5], [20.0]]).expect("proba");
        assert!((shares[0] - 0.5).abs() < 1e-12);
        // Nearest four to 20.0: 10, 3, 2, 1.
        assert!((shares[1] - 0.5).abs() < 1e-12);

        let knn = KnnClassifier::fit(&x, &y, 1).expect("fit");
        assert_eq!(knn.predict_proba(&array![[9.0]]).expect("proba"), array![1.0]);
    }

    #[test]
    fn test_rejects_wrong_width() {
        let knn = KnnClassifier::fit(&array![[0.0, 1.0]], &array![0], 1).expect("fit");
        assert!(knn.predict(&array![[0.0]]).is_err());
    }
}
