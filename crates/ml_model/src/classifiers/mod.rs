//! The six fitted classifiers behind one enum.

pub mod knn;
pub mod logistic;
pub mod naive_bayes;
pub mod svm;
pub mod tree;

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::{Array1, Array2};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub use knn::KnnClassifier;
pub use logistic::LogisticClassifier;
pub use naive_bayes::NaiveBayesClassifier;
pub use svm::SvmClassifier;
pub use tree::TreeClassifier;

use crate::mlp::MlpClassifier;
use crate::{Classifier, ModelKind};

/// One fitted classifier of any kind.
#[derive(Debug, Clone)]
pub enum TrainedModel {
    Knn(KnnClassifier),
    DecisionTree(TreeClassifier),
    NaiveBayes(NaiveBayesClassifier),
    Svm(SvmClassifier),
    LogisticRegression(LogisticClassifier),
    Mlp(MlpClassifier),
}

impl TrainedModel {
    /// Fits a classifier of `kind` on `x`/`y`.
    ///
    /// `seed` drives the MLP weights and shuffles and the SVM calibration
    /// folds; the other learners are deterministic.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying learner fails to fit.
    pub fn fit(kind: ModelKind, x: &Array2<f64>, y: &Array1<usize>, seed: u64) -> anyhow::Result<Self> {
        let model = match kind {
            ModelKind::Knn => Self::Knn(KnnClassifier::fit(x, y, knn::DEFAULT_NEIGHBORS)?),
            ModelKind::DecisionTree => Self::DecisionTree(TreeClassifier::fit(x, y)?),
            ModelKind::NaiveBayes => Self::NaiveBayes(NaiveBayesClassifier::fit(x, y)?),
            ModelKind::Svm => Self::Svm(SvmClassifier::fit(x, y, seed)?),
            ModelKind::LogisticRegression => Self::LogisticRegression(LogisticClassifier::fit(x, y)?),
            ModelKind::Mlp => Self::Mlp(MlpClassifier::fit(x, y, seed)?),
        };
        Ok(model)
    }

    #[must_use]
    pub const fn kind(&self) -> ModelKind {
        match self {
            Self::Knn(_) => ModelKind::Knn,
            Self::DecisionTree(_) => ModelKind::DecisionTree,
            Self::NaiveBayes(_) => ModelKind::NaiveBayes,
            Self::Svm(_) => ModelKind::Svm,
            Self::LogisticRegression(_) => ModelKind::LogisticRegression,
            Self::Mlp(_) => ModelKind::Mlp,
        }
    }

    /// Writes the model to `dir/<key>.<ext>`, replacing any previous file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save(&self, dir: &Path) -> anyhow::Result<PathBuf> {
        let path = dir.join(self.kind().file_name());
        match self {
            Self::Knn(m) => write_json(&path, m)?,
            Self::DecisionTree(m) => write_json(&path, m)?,
            Self::NaiveBayes(m) => write_json(&path, m)?,
            Self::Svm(m) => write_json(&path, m)?,
            Self::LogisticRegression(m) => write_json(&path, m)?,
            Self::Mlp(m) => m.save(&path)?,
        }
        Ok(path)
    }

    /// Reads a model of `kind` from `dir`.
    ///
    /// `n_features` is only needed to rebuild the MLP.
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub fn load(kind: ModelKind, dir: &Path, n_features: usize) -> anyhow::Result<Self> {
        let path = dir.join(kind.file_name());
        let model = match kind {
            ModelKind::Knn => Self::Knn(read_json(&path)?),
            ModelKind::DecisionTree => Self::DecisionTree(read_json(&path)?),
            ModelKind::NaiveBayes => Self::NaiveBayes(read_json(&path)?),
            ModelKind::Svm => Self::Svm(read_json(&path)?),
            ModelKind::LogisticRegression => Self::LogisticRegression(read_json(&path)?),
            ModelKind::Mlp => Self::Mlp(MlpClassifier::load(&path, n_features)?),
        };
        Ok(model)
    }
}

impl Classifier for TrainedModel {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        match self {
            Self::Knn(m) => m.predict(x),
            Self::DecisionTree(m) => m.predict(x),
            Self::NaiveBayes(m) => m.predict(x),
            Self::Svm(m) => m.predict(x),
            Self::LogisticRegression(m) => m.predict(x),
            Self::Mlp(m) => m.predict(x),
        }
    }

    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        match self {
            Self::Knn(m) => m.predict_proba(x),
            Self::DecisionTree(m) => m.predict_proba(x),
            Self::NaiveBayes(m) => m.predict_proba(x),
            Self::Svm(m) => m.predict_proba(x),
            Self::LogisticRegression(m) => m.predict_proba(x),
            Self::Mlp(m) => m.predict_proba(x),
        }
    }
}

pub(crate) fn write_json<T: Serialize>(path: &Path, value: &T) -> anyhow::Result<()> {
    let file =
        File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub(crate) fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_support::synthetic_csv;
    use crate::dataset::HeartDataset;
    use crate::scaler::StandardScaler;

    fn scaled_synthetic() -> (Array2<f64>, Array1<usize>) {
        let dataset = HeartDataset::from_csv_reader(synthetic_csv(40).as_bytes()).expect("parse");
        let scaler = StandardScaler::fit(&dataset.features).expect("fit");
        (scaler.transform(&dataset.features).expect("scale"), dataset.targets)
    }

    #[test]
    fn test_every_kind_fits_and_predicts_binary_labels() {
        let (x, y) = scaled_synthetic();

        for kind in ModelKind::all() {
            let model = TrainedModel::fit(kind, &x, &y, 42).expect("fit");
            assert_eq!(model.kind(), kind);

            let predictions = model.predict(&x).expect("predict");
            assert_eq!(predictions.len(), x.nrows());
            assert!(predictions.iter().all(|&p| p <= 1), "{kind} predicted a non-binary label");

            let probabilities = model.predict_proba(&x).expect("proba");
            assert_eq!(probabilities.len(), x.nrows());
            assert!(
                probabilities.iter().all(|p| (0.0..=1.0).contains(p)),
                "{kind} gave a probability outside [0, 1]"
            );
        }
    }

    #[test]
    fn test_save_and_load_reproduce_predictions() {
        let (x, y) = scaled_synthetic();
        let dir = tempfile::tempdir().expect("tempdir");

        for kind in ModelKind::all() {
            let model = TrainedModel::fit(kind, &x, &y, 42).expect("fit");
            let path = model.save(dir.path()).expect("save");
            assert_eq!(path, dir.path().join(kind.file_name()));

            let restored = TrainedModel::load(kind, dir.path(), x.ncols()).expect("load");
            assert_eq!(
                restored.predict(&x).expect("predict"),
                model.predict(&x).expect("predict"),
                "{kind} changed after reload"
            );

            let before = model.predict_proba(&x).expect("proba");
            let after = restored.predict_proba(&x).expect("proba");
            let drift = before
                .iter()
                .zip(after.iter())
                .map(|(b, a)| (b - a).abs())
                .fold(0.0, f64::max);
            assert!(drift < 1e-9, "{kind} probabilities drifted by {drift} after reload");
        }
    }

    #[test]
    fn test_svm_json_carries_platt_parameters() {
        let (x, y) = scaled_synthetic();
        let dir = tempfile::tempdir().expect("tempdir");
        let model = TrainedModel::fit(ModelKind::Svm, &x, &y, 42).expect("fit");
        let path = model.save(dir.path()).expect("save");

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).expect("read")).expect("json");
        let platt = &json["platt"];
        assert!(platt["a"].is_f64(), "{json}");
        assert!(platt["b"].is_f64(), "{json}");

        let TrainedModel::Svm(svm) = model else {
            panic!("expected an SVM");
        };
        assert!((platt["a"].as_f64().expect("a") - svm.platt().a).abs() < f64::EPSILON);
    }

    #[test]
    fn test_load_missing_file_names_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = TrainedModel::load(ModelKind::Svm, dir.path(), 13).expect_err("missing");
        assert!(format!("{err:#}").contains("svm.json"));
    }
}
