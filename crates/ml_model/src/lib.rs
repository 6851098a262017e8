//! Heart-disease classifier training.
//!
//! Loads the UCI heart dataset, makes a stratified holdout split, standardizes
//! features, fits six binary classifiers, scores them on the holdout and
//! writes every fitted artifact to a flat directory.

pub mod artifacts;
pub mod calibration;
pub mod classifiers;
pub mod dataset;
pub mod loader;
pub mod metrics;
pub mod mlp;
pub mod pipeline;
pub mod scaler;
pub mod split;
pub mod training;

use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, IntoEnumIterator};

pub use artifacts::{ArtifactSet, LoadedArtifacts, FEATURE_NAMES_FILE, SCALER_FILE};
pub use calibration::PlattScaling;
pub use classifiers::TrainedModel;
pub use dataset::HeartDataset;
pub use loader::{load_with_fallback, DataSource, LoadError};
pub use metrics::{ClassificationMetrics, ConfusionMatrix};
pub use pipeline::{run_training_pipeline, train_on_dataset, ModelResult, TrainingReport};
pub use scaler::StandardScaler;
pub use split::{stratified_split, SplitError, TrainTestSplit};

/// The six fitted classifiers, in training and reporting order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumIter, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[strum(to_string = "KNN")]
    Knn,
    #[strum(to_string = "Decision Tree")]
    DecisionTree,
    #[strum(to_string = "Naive Bayes")]
    NaiveBayes,
    #[strum(to_string = "SVM")]
    Svm,
    #[strum(to_string = "Logistic Regression")]
    LogisticRegression,
    #[strum(to_string = "MLP")]
    Mlp,
}

impl ModelKind {
    /// Every kind in iteration order.
    pub fn all() -> impl Iterator<Item = Self> {
        Self::iter()
    }

    /// Stable key used in artifact file names.
    #[must_use]
    pub const fn key(self) -> &'static str {
        match self {
            Self::Knn => "knn",
            Self::DecisionTree => "decision_tree",
            Self::NaiveBayes => "naive_bayes",
            Self::Svm => "svm",
            Self::LogisticRegression => "logistic_regression",
            Self::Mlp => "mlp",
        }
    }

    /// File extension of the persisted model.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Mlp => "mpk",
            _ => "json",
        }
    }

    /// Artifact file name, e.g. `decision_tree.json`.
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.{}", self.key(), self.extension())
    }
}

/// A fitted binary classifier.
pub trait Classifier {
    /// Predicts a label (0 or 1) for each row of `x`.
    ///
    /// # Errors
    ///
    /// Returns an error if `x` does not match the fitted feature count or the
    /// underlying model fails.
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>>;

    /// Estimates `P(y = 1)` for each row of `x`, every value in `[0, 1]`.
    ///
    /// # Errors
    ///
    /// Same conditions as [`Classifier::predict`].
    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_order_and_names() {
        let names: Vec<String> = ModelKind::all().map(|k| k.to_string()).collect();
        assert_eq!(
            names,
            [
                "KNN",
                "Decision Tree",
                "Naive Bayes",
                "SVM",
                "Logistic Regression",
                "MLP"
            ]
        );
    }

    #[test]
    fn test_file_names_are_distinct() {
        let files: Vec<String> = ModelKind::all().map(ModelKind::file_name).collect();
        assert_eq!(
            files,
            [
                "knn.json",
                "decision_tree.json",
                "naive_bayes.json",
                "svm.json",
                "logistic_regression.json",
                "mlp.mpk"
            ]
        );
    }
}
