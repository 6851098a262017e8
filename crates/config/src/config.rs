use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;

/// Remote copy of the UCI heart dataset.
pub const DEFAULT_DATASET_URL: &str =
    "https://raw.githubusercontent.com/uciml/UCI-ML-Heart-Disease/master/heart.csv";

/// Seed shared by the split and every stochastic model.
pub const DEFAULT_SEED: u64 = 42;

/// Fraction of samples held out for evaluation.
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

const DATABASE_DIR: &str = "database";
const DATABASE_FILE: &str = "heart_disease.db";
const MODELS_DIR: &str = "models";
const DATA_DIR: &str = "data";
const DATA_FILE: &str = "heart.csv";

/// Returns the base directory every other path is resolved against.
///
/// Uses `HEART_BASE_DIR` (from the environment or a `.env` file) when set,
/// otherwise the current working directory.
#[must_use]
pub fn get_base_path() -> PathBuf {
    dotenvy::dotenv().ok();

    std::env::var("HEART_BASE_DIR").map_or_else(
        |_| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        PathBuf::from,
    )
}

/// Settings for the schema initializer and the training pipeline.
///
/// Both setup procedures receive this value explicitly instead of reading
/// module-level paths, so tests can point them at a temporary directory.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartConfig {
    /// Directory the relative layout below is rooted at.
    pub base_dir: PathBuf,
    /// Directory holding the SQLite file.
    pub database_dir: PathBuf,
    /// SQLite file for prediction records.
    pub database_path: PathBuf,
    /// Flat directory receiving the fitted artifacts.
    pub models_dir: PathBuf,
    /// Local fallback copy of the dataset.
    pub data_file: PathBuf,
    /// Remote dataset location; `None` skips the network stage.
    pub dataset_url: Option<String>,
    /// Seed for the split, shuffles and weight initialization.
    pub seed: u64,
    /// Held-out fraction for the stratified split.
    pub test_fraction: f64,
    /// Upper bound for the remote fetch.
    pub fetch_timeout: Duration,
}

impl HeartConfig {
    /// Builds the default layout (`database/`, `models/`, `data/heart.csv`)
    /// under `base_dir`.
    #[must_use]
    pub fn from_base_dir(base_dir: impl AsRef<Path>) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let database_dir = base_dir.join(DATABASE_DIR);

        Self {
            database_path: database_dir.join(DATABASE_FILE),
            database_dir,
            models_dir: base_dir.join(MODELS_DIR),
            data_file: base_dir.join(DATA_DIR).join(DATA_FILE),
            dataset_url: Some(DEFAULT_DATASET_URL.to_string()),
            seed: DEFAULT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            fetch_timeout: Duration::from_secs(30),
            base_dir,
        }
    }

    /// Loads configuration from environment variables.
    ///
    /// Optional environment variables:
    /// - `HEART_BASE_DIR`: base directory (default: current directory)
    /// - `HEART_DATASET_URL`: remote dataset URL; an empty value disables the fetch
    /// - `HEART_OFFLINE`: `1`/`true` disables the fetch
    /// - `HEART_SEED`: seed override
    ///
    /// # Errors
    ///
    /// Returns an error if `HEART_SEED` is set but is not an unsigned integer.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::from_base_dir(get_base_path());

        if let Ok(url) = std::env::var("HEART_DATASET_URL") {
            config.dataset_url = Some(url).filter(|u| !u.trim().is_empty());
        }

        if std::env::var("HEART_OFFLINE").is_ok_and(|v| is_truthy(&v)) {
            config.dataset_url = None;
        }

        if let Ok(seed) = std::env::var("HEART_SEED") {
            config.seed = seed
                .trim()
                .parse()
                .with_context(|| format!("HEART_SEED must be an unsigned integer, got {seed:?}"))?;
        }

        Ok(config)
    }

    /// Re-roots every path under `base_dir`, keeping the other settings.
    #[must_use]
    pub fn with_base_dir(self, base_dir: impl AsRef<Path>) -> Self {
        Self {
            dataset_url: self.dataset_url,
            seed: self.seed,
            test_fraction: self.test_fraction,
            fetch_timeout: self.fetch_timeout,
            ..Self::from_base_dir(base_dir)
        }
    }

    /// Replaces the local dataset path.
    #[must_use]
    pub fn with_data_file(mut self, data_file: impl Into<PathBuf>) -> Self {
        self.data_file = data_file.into();
        self
    }

    /// Disables the remote dataset stage.
    #[must_use]
    pub fn offline(mut self) -> Self {
        self.dataset_url = None;
        self
    }

    /// Overrides the remote dataset URL.
    #[must_use]
    pub fn with_dataset_url(mut self, url: impl Into<String>) -> Self {
        self.dataset_url = Some(url.into());
        self
    }
}

impl Default for HeartConfig {
    fn default() -> Self {
        Self::from_base_dir(get_base_path())
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_is_relative_to_base_dir() {
        let config = HeartConfig::from_base_dir("/srv/heart");

        assert_eq!(config.database_dir, PathBuf::from("/srv/heart/database"));
        assert_eq!(
            config.database_path,
            PathBuf::from("/srv/heart/database/heart_disease.db")
        );
        assert_eq!(config.models_dir, PathBuf::from("/srv/heart/models"));
        assert_eq!(config.data_file, PathBuf::from("/srv/heart/data/heart.csv"));
        assert_eq!(config.seed, 42);
        assert!((config.test_fraction - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.dataset_url.as_deref(), Some(DEFAULT_DATASET_URL));
    }

    #[test]
    fn test_with_base_dir_keeps_settings() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HeartConfig::from_base_dir("/elsewhere")
            .offline()
            .with_base_dir(dir.path());

        assert!(config.dataset_url.is_none());
        assert_eq!(config.models_dir, dir.path().join("models"));
    }

    #[test]
    fn test_truthy_values() {
        assert!(is_truthy("1"));
        assert!(is_truthy(" TRUE "));
        assert!(!is_truthy("0"));
        assert!(!is_truthy(""));
    }
}
