//! End-to-end training run: load, split, scale, fit, evaluate, persist.

use std::collections::BTreeMap;
use std::fmt;

use anyhow::Context;
use config::HeartConfig;
use tracing::{debug, info, warn};

use crate::artifacts::{save_feature_names, save_scaler, ArtifactSet};
use crate::classifiers::TrainedModel;
use crate::dataset::{class_counts, HeartDataset};
use crate::loader::{load_with_fallback, DataSource};
use crate::metrics::ClassificationMetrics;
use crate::scaler::StandardScaler;
use crate::split::stratified_split;
use crate::{Classifier, ModelKind};

/// Holdout scores of one classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelResult {
    pub kind: ModelKind,
    pub metrics: ClassificationMetrics,
}

/// Everything a training run learned and wrote.
#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub source: DataSource,
    pub n_samples: usize,
    pub feature_names: Vec<String>,
    pub class_counts: BTreeMap<usize, usize>,
    pub train_size: usize,
    pub test_size: usize,
    /// In [`ModelKind`] iteration order.
    pub results: Vec<ModelResult>,
    pub artifacts: ArtifactSet,
}

impl TrainingReport {
    /// Highest test accuracy; the earliest model wins a tie.
    #[must_use]
    pub fn best_model(&self) -> Option<&ModelResult> {
        self.results.iter().fold(None, |best, candidate| match best {
            Some(current) if candidate.metrics.accuracy <= current.metrics.accuracy => Some(current),
            _ => Some(candidate),
        })
    }

    #[must_use]
    pub fn result(&self, kind: ModelKind) -> Option<&ModelResult> {
        self.results.iter().find(|r| r.kind == kind)
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Data source: {}", self.source)?;
        writeln!(
            f,
            "Samples: {} ({} train / {} test)",
            self.n_samples, self.train_size, self.test_size
        )?;
        writeln!(f)?;

        writeln!(f, "Detailed metrics:")?;
        writeln!(
            f,
            "  {:<20} {:>9} {:>9} {:>9} {:>9} {:>9}",
            "Model", "Accuracy", "Precision", "Recall", "F1", "ROC-AUC"
        )?;
        for result in &self.results {
            let m = &result.metrics;
            let auc = m
                .roc_auc
                .map_or_else(|| "n/a".to_string(), |auc| format!("{auc:.4}"));
            writeln!(
                f,
                "  {:<20} {:>9.4} {:>9.4} {:>9.4} {:>9.4} {:>9}",
                result.kind.to_string(),
                m.accuracy,
                m.precision,
                m.recall,
                m.f1,
                auc
            )?;
        }
        writeln!(f)?;

        writeln!(f, "Model accuracy summary:")?;
        for result in &self.results {
            writeln!(
                f,
                "  {:<20} {:.4}",
                result.kind.to_string(),
                result.metrics.accuracy
            )?;
        }

        if let Some(best) = self.best_model() {
            writeln!(f)?;
            writeln!(
                f,
                "Best model: {} with {:.4} accuracy",
                best.kind, best.metrics.accuracy
            )?;
        }

        writeln!(f)?;
        writeln!(f, "Files saved in {}:", self.artifacts.dir.display())?;
        for path in self.artifacts.files() {
            let name = path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
            writeln!(f, "  - {name}")?;
        }
        Ok(())
    }
}

/// Loads the dataset (remote first, local fallback) and trains on it.
///
/// # Errors
///
/// Returns an error if no data source works or any step of
/// [`train_on_dataset`] fails.
pub async fn run_training_pipeline(config: &HeartConfig) -> anyhow::Result<TrainingReport> {
    info!("Loading dataset");
    let (dataset, source) = load_with_fallback(config).await?;
    train_on_dataset(&dataset, source, config)
}

/// Splits, scales, fits and evaluates every classifier, writing all
/// artifacts to `config.models_dir`.
///
/// Files are written as soon as they are ready, so a failing run can leave
/// a partial set behind.
///
/// # Errors
///
/// Returns an error if the split is impossible, a model fails to fit, or an
/// artifact cannot be written.
pub fn train_on_dataset(
    dataset: &HeartDataset,
    source: DataSource,
    config: &HeartConfig,
) -> anyhow::Result<TrainingReport> {
    let (rows, columns) = dataset.shape();
    let distribution = dataset.class_counts();
    info!(rows, columns, "Dataset loaded");
    debug!(columns = ?dataset.feature_names, "Feature columns");
    info!(distribution = ?distribution, "Target distribution");
    if !dataset.has_heart_layout() {
        warn!("Feature columns differ from the standard heart layout");
    }

    let models_dir = &config.models_dir;
    std::fs::create_dir_all(models_dir)
        .with_context(|| format!("Failed to create {}", models_dir.display()))?;

    let feature_names_path = save_feature_names(models_dir, &dataset.feature_names)?;
    info!(path = %feature_names_path.display(), "Feature names saved");

    let split = stratified_split(
        &dataset.features,
        &dataset.targets,
        config.test_fraction,
        config.seed,
    )?;
    info!(
        train = split.x_train.nrows(),
        test = split.x_test.nrows(),
        "Train/test split"
    );
    info!(
        train = ?class_counts(split.y_train.iter().copied()),
        test = ?class_counts(split.y_test.iter().copied()),
        "Class distribution per partition"
    );

    let scaler = StandardScaler::fit(&split.x_train)?;
    let x_train = scaler.transform(&split.x_train)?;
    let x_test = scaler.transform(&split.x_test)?;
    let scaler_path = save_scaler(models_dir, &scaler)?;
    info!(path = %scaler_path.display(), "Scaler saved");

    let mut fitted = Vec::with_capacity(6);
    let mut results = Vec::with_capacity(6);
    for kind in ModelKind::all() {
        info!(model = %kind, "Training");
        let model = TrainedModel::fit(kind, &x_train, &split.y_train, config.seed)
            .with_context(|| format!("Failed to train {kind}"))?;
        let predictions = model
            .predict(&x_test)
            .with_context(|| format!("Failed to score {kind}"))?;
        let metrics = ClassificationMetrics::evaluate(&split.y_test, &predictions)?;

        info!(model = %kind, accuracy = metrics.accuracy, "Model trained");
        println!("  {:<20} accuracy: {:.4}", kind.to_string(), metrics.accuracy);
        debug!(model = %kind, confusion = %metrics.confusion, "Confusion matrix");

        fitted.push(model);
        results.push(ModelResult { kind, metrics });
    }

    let mut model_paths = Vec::with_capacity(fitted.len());
    for model in &fitted {
        let path = model
            .save(models_dir)
            .with_context(|| format!("Failed to save {}", model.kind()))?;
        info!(path = %path.display(), "Model saved");
        model_paths.push((model.kind(), path));
    }

    Ok(TrainingReport {
        source,
        n_samples: dataset.n_samples(),
        feature_names: dataset.feature_names.clone(),
        class_counts: distribution,
        train_size: split.x_train.nrows(),
        test_size: split.x_test.nrows(),
        results,
        artifacts: ArtifactSet {
            dir: models_dir.clone(),
            feature_names: feature_names_path,
            scaler: scaler_path,
            models: model_paths,
        },
    })
}
