//! Dataset acquisition: remote fetch first, local file second.

use std::fmt;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

use config::HeartConfig;
use reqwest::Client;
use tracing::{info, warn};

use crate::dataset::HeartDataset;

/// Error type for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("Failed to fetch dataset from {url}: {reason}")]
    Remote { url: String, reason: String },

    #[error("Failed to read dataset file {}: {reason}", .path.display())]
    Local { path: PathBuf, reason: String },

    #[error("Failed to parse dataset: {0}")]
    Parse(String),

    #[error(
        "Data file not found or unreadable at {}: {local}{}",
        .path.display(),
        remote_note(.remote)
    )]
    Exhausted {
        path: PathBuf,
        remote: Option<String>,
        local: String,
    },
}

fn remote_note(remote: &Option<String>) -> String {
    remote
        .as_ref()
        .map(|r| format!(" (remote stage failed first: {r})"))
        .unwrap_or_default()
}

/// Where a dataset was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSource {
    Remote(String),
    Local(PathBuf),
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote(url) => write!(f, "{url}"),
            Self::Local(path) => write!(f, "{}", path.display()),
        }
    }
}

/// Downloads and parses the dataset at `url`.
///
/// # Errors
///
/// Returns [`LoadError::Remote`] on transport or HTTP status failures and
/// [`LoadError::Parse`] if the body is not a valid dataset.
pub async fn fetch_remote(url: &str, timeout: Duration) -> Result<HeartDataset, LoadError> {
    let remote_error = |reason: String| LoadError::Remote {
        url: url.to_string(),
        reason,
    };

    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| remote_error(e.to_string()))?;

    let body = client
        .get(url)
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| remote_error(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| remote_error(e.to_string()))?;

    HeartDataset::from_csv_reader(body.as_ref())
}

/// Reads and parses the dataset file at `path`.
///
/// # Errors
///
/// Returns [`LoadError::Local`] if the file cannot be opened and
/// [`LoadError::Parse`] if its contents are not a valid dataset.
pub fn load_local(path: &Path) -> Result<HeartDataset, LoadError> {
    let file = std::fs::File::open(path).map_err(|e| LoadError::Local {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    HeartDataset::from_csv_reader(BufReader::new(file))
}

/// Loads the dataset from the configured URL, falling back to the local
/// file on any remote failure.
///
/// The remote stage is skipped when `config.dataset_url` is `None`. Only when
/// the local stage also fails is the error fatal.
///
/// # Errors
///
/// Returns [`LoadError::Exhausted`] naming the local path when no stage
/// produced a dataset.
pub async fn load_with_fallback(
    config: &HeartConfig,
) -> Result<(HeartDataset, DataSource), LoadError> {
    let remote_failure = match config.dataset_url.as_deref() {
        Some(url) => match fetch_remote(url, config.fetch_timeout).await {
            Ok(dataset) => {
                info!(url, "Data loaded from URL");
                return Ok((dataset, DataSource::Remote(url.to_string())));
            }
            Err(err) => {
                warn!(error = %err, "Remote dataset unavailable, falling back to local file");
                Some(err.to_string())
            }
        },
        None => {
            info!("Remote dataset disabled");
            None
        }
    };

    match load_local(&config.data_file) {
        Ok(dataset) => {
            info!(path = %config.data_file.display(), "Data loaded from local file");
            Ok((dataset, DataSource::Local(config.data_file.clone())))
        }
        Err(local) => Err(LoadError::Exhausted {
            path: config.data_file.clone(),
            remote: remote_failure,
            local: local.to_string(),
        }),
    }
}
