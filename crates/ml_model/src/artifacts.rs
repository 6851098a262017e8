//! The flat directory of fitted artifacts.
//!
//! Layout: `feature_names.json`, `scaler.json` and one file per
//! [`ModelKind`]. Every run overwrites the previous files in place.

use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::{Array1, Array2};

use crate::classifiers::{read_json, write_json, TrainedModel};
use crate::scaler::StandardScaler;
use crate::{Classifier, ModelKind};

pub const FEATURE_NAMES_FILE: &str = "feature_names.json";
pub const SCALER_FILE: &str = "scaler.json";

/// Paths written by one training run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSet {
    pub dir: PathBuf,
    pub feature_names: PathBuf,
    pub scaler: PathBuf,
    pub models: Vec<(ModelKind, PathBuf)>,
}

impl ArtifactSet {
    /// Every written file, preprocessing artifacts first.
    #[must_use]
    pub fn files(&self) -> Vec<&Path> {
        let mut files = vec![self.feature_names.as_path(), self.scaler.as_path()];
        files.extend(self.models.iter().map(|(_, path)| path.as_path()));
        files
    }

    /// Reloads everything this set points at.
    ///
    /// # Errors
    ///
    /// See [`LoadedArtifacts::load`].
    pub fn load(&self) -> anyhow::Result<LoadedArtifacts> {
        LoadedArtifacts::load(&self.dir)
    }
}

/// Writes the feature order as a JSON array of strings.
///
/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_feature_names(dir: &Path, names: &[String]) -> anyhow::Result<PathBuf> {
    let path = dir.join(FEATURE_NAMES_FILE);
    write_json(&path, &names)?;
    Ok(path)
}

/// # Errors
///
/// Returns an error if the file cannot be written.
pub fn save_scaler(dir: &Path, scaler: &StandardScaler) -> anyhow::Result<PathBuf> {
    let path = dir.join(SCALER_FILE);
    write_json(&path, scaler)?;
    Ok(path)
}

/// Artifacts read back from disk, ready to score raw feature rows.
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub feature_names: Vec<String>,
    pub scaler: StandardScaler,
    pub models: Vec<TrainedModel>,
}

impl LoadedArtifacts {
    /// Reads the feature names, the scaler and all six models from `dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if any file is missing, malformed, or disagrees with
    /// the feature count.
    pub fn load(dir: &Path) -> anyhow::Result<Self> {
        let feature_names: Vec<String> = read_json(&dir.join(FEATURE_NAMES_FILE))?;
        let scaler: StandardScaler = read_json(&dir.join(SCALER_FILE))?;
        anyhow::ensure!(
            scaler.n_features() == feature_names.len(),
            "Scaler expects {} features but {} are named",
            scaler.n_features(),
            feature_names.len()
        );

        let models = ModelKind::all()
            .map(|kind| TrainedModel::load(kind, dir, feature_names.len()))
            .collect::<anyhow::Result<Vec<_>>>()?;

        Ok(Self {
            feature_names,
            scaler,
            models,
        })
    }

    #[must_use]
    pub fn model(&self, kind: ModelKind) -> Option<&TrainedModel> {
        self.models.iter().find(|m| m.kind() == kind)
    }

    /// Scales `raw` rows (columns in `feature_names` order) and predicts with
    /// the model of `kind`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have the wrong width or the model is
    /// missing.
    pub fn predict(&self, kind: ModelKind, raw: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        let (model, scaled) = self.prepare(kind, raw)?;
        model.predict(&scaled)
    }

    /// Like [`LoadedArtifacts::predict`] but returns `P(y = 1)` per row.
    ///
    /// # Errors
    ///
    /// Returns an error if the rows have the wrong width or the model is
    /// missing.
    pub fn predict_proba(&self, kind: ModelKind, raw: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        let (model, scaled) = self.prepare(kind, raw)?;
        model.predict_proba(&scaled)
    }

    fn prepare(&self, kind: ModelKind, raw: &Array2<f64>) -> anyhow::Result<(&TrainedModel, Array2<f64>)> {
        let model = self
            .model(kind)
            .with_context(|| format!("No {kind} model loaded"))?;
        Ok((model, self.scaler.transform(raw)?))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_feature_names_are_a_json_array() {
        let dir = tempfile::tempdir().expect("tempdir");
        let names = vec!["age".to_string(), "sex".to_string()];

        let path = save_feature_names(dir.path(), &names).expect("save");
        let text = std::fs::read_to_string(&path).expect("read");
        let parsed: serde_json::Value = serde_json::from_str(&text).expect("json");

        assert_eq!(parsed, serde_json::json!(["age", "sex"]));
    }

    #[test]
    fn test_scaler_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().expect("tempdir");
        let first = StandardScaler::fit(&array![[1.0], [3.0]]).expect("fit");
        let second = StandardScaler::fit(&array![[10.0], [30.0]]).expect("fit");

        save_scaler(dir.path(), &first).expect("save");
        let path = save_scaler(dir.path(), &second).expect("save");

        let restored: StandardScaler = read_json(&path).expect("read");
        assert_eq!(restored, second);
    }

    #[test]
    fn test_files_lists_preprocessing_first() {
        let dir = PathBuf::from("models");
        let set = ArtifactSet {
            feature_names: dir.join(FEATURE_NAMES_FILE),
            scaler: dir.join(SCALER_FILE),
            models: vec![(ModelKind::Knn, dir.join("knn.json"))],
            dir,
        };

        let files: Vec<String> = set
            .files()
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        assert_eq!(
            files,
            ["models/feature_names.json", "models/scaler.json", "models/knn.json"]
        );
    }

    #[test]
    fn test_load_from_empty_dir_fails() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = LoadedArtifacts::load(dir.path()).expect_err("empty");
        assert!(format!("{err:#}").contains(FEATURE_NAMES_FILE));
    }
}
