//! CART decision tree with leaf class proportions as probabilities.

use std::collections::BTreeMap;

use anyhow::{anyhow, ensure};
use linfa::prelude::*;
use linfa_trees::{DecisionTree, TreeNode};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::metrics::POSITIVE_LABEL;
use crate::Classifier;

pub const MAX_DEPTH: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeClassifier {
    tree: DecisionTree<f64, usize>,
    /// Share of positive training rows per leaf, keyed by the left/right
    /// path from the root (`""` for a single-leaf tree).
    leaf_rates: BTreeMap<String, f64>,
}

impl TreeClassifier {
    /// Fits a Gini tree limited to [`MAX_DEPTH`] levels.
    ///
    /// # Errors
    ///
    /// Returns an error if the parameters are rejected or fitting fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>) -> anyhow::Result<Self> {
        ensure!(
            x.nrows() == y.len(),
            "Decision tree got {} rows but {} labels",
            x.nrows(),
            y.len()
        );
        let dataset = Dataset::new(x.clone(), y.clone());
        let tree = DecisionTree::params()
            .max_depth(Some(MAX_DEPTH))
            .fit(&dataset)?;

        let mut counts: BTreeMap<String, (usize, usize)> = BTreeMap::new();
        for (row, &label) in x.rows().into_iter().zip(y) {
            let (path, _) = leaf_of(&tree, row)?;
            let entry = counts.entry(path).or_insert((0, 0));
            entry.1 += 1;
            if label == POSITIVE_LABEL {
                entry.0 += 1;
            }
        }
        let leaf_rates = counts
            .into_iter()
            .map(|(path, (positive, total))| (path, positive as f64 / total as f64))
            .collect();

        Ok(Self { tree, leaf_rates })
    }

    #[must_use]
    pub fn depth(&self) -> usize {
        self.tree.max_depth()
    }
}

impl Classifier for TreeClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        Ok(self.tree.predict(x))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        x.rows()
            .into_iter()
            .map(|row| -> anyhow::Result<f64> {
                let (path, leaf) = leaf_of(&self.tree, row)?;
                let fallback = if leaf.prediction() == Some(POSITIVE_LABEL) { 1.0 } else { 0.0 };
                Ok(self.leaf_rates.get(&path).copied().unwrap_or(fallback))
            })
            .collect()
    }
}

/// Walks `row` down to its leaf, returning the path taken and the leaf.
fn leaf_of<'a>(
    tree: &'a DecisionTree<f64, usize>,
    row: ArrayView1<f64>,
) -> anyhow::Result<(String, &'a TreeNode<f64, usize>)> {
    let mut node = tree
        .iter_nodes()
        .next()
        .ok_or_else(|| anyhow!("Decision tree has no root"))?;
    let mut path = String::new();

    while !node.is_leaf() {
        let (feature, threshold, _) = node.split();
        let children = node.children();
        let (child, step) = if row[feature] < threshold {
            (children[0], 'L')
        } else {
            (children[1], 'R')
        };
        node = child
            .as_deref()
            .ok_or_else(|| anyhow!("Decision tree split without a child at {path:?}"))?;
        path.push(step);
    }

    Ok((path, node))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::{TreeClassifier, MAX_DEPTH};
    use crate::Classifier;

    #[test]
    fn test_separates_threshold() {
        let x = array![[1.0], [2.0], [3.0], [10.0], [11.0], [12.0]];
        let y = array![0, 0, 0, 1, 1, 1];
        let tree = TreeClassifier::fit(&x, &y).expect("fit");

        assert_eq!(tree.predict(&array![[0.0], [20.0]]).expect("predict"), array![0, 1]);
        assert!(tree.depth() <= MAX_DEPTH);
        assert_eq!(
            tree.predict_proba(&array![[0.0], [20.0]]).expect("proba"),
            array![0.0, 1.0]
        );
    }

    #[test]
    fn test_mixed_leaf_reports_its_class_share() {
        // Identical rows cannot be split apart, so the leaf stays mixed.
        let x = array![[1.0], [1.0], [1.0], [1.0], [5.0], [5.0]];
        let y = array![1, 0, 0, 0, 1, 1];
        let tree = TreeClassifier::fit(&x, &y).expect("fit");

        let probabilities = tree.predict_proba(&array![[1.0], [5.0]]).expect("proba");
        assert!((probabilities[0] - 0.25).abs() < 1e-12);
        assert!((probabilities[1] - 1.0).abs() < 1e-12);
        assert_eq!(tree.predict(&array![[1.0]]).expect("predict"), array![0]);
    }
}
