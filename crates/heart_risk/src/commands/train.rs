//! Train command - fits and evaluates the classifiers and saves the artifacts.

use anyhow::Result;
use config::HeartConfig;
use ml_model::{run_training_pipeline, TrainingReport};
use tracing::info;

use super::rule;

/// Runs the training pipeline and prints the summary report.
///
/// # Errors
///
/// Returns an error if the dataset cannot be loaded, a model fails to fit, or
/// an artifact cannot be written.
pub async fn run(config: &HeartConfig) -> Result<TrainingReport> {
    match config.dataset_url.as_deref() {
        Some(url) => info!(url, fallback = %config.data_file.display(), "Starting training"),
        None => info!(path = %config.data_file.display(), "Starting training (offline)"),
    }

    let report = run_training_pipeline(config).await?;

    println!("{}", rule());
    println!("[OK] Training complete");
    println!("{}", rule());
    print!("{report}");

    Ok(report)
}
