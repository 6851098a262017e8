//! SQLite store for heart-risk prediction records.
//!
//! The store holds a single `predictions` table written by the serving
//! application. This crate owns its schema: [`initialize_schema`] drops and
//! recreates the table, and [`PredictionRepository`] is the read/write path
//! used against it.

use std::path::{Path, PathBuf};

use config::HeartConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{info, warn};

pub mod models;
pub mod repositories;
pub mod schema;

pub use models::{
    CreatePrediction, PredictionRecord, RiskLevel, HIGH_RISK_THRESHOLD, MODERATE_RISK_THRESHOLD,
};
pub use repositories::PredictionRepository;
pub use schema::{INDEX_NAME, PREDICTION_COLUMNS, TABLE_NAME};

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Failed to create database directory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// What [`initialize_schema`] left behind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSummary {
    /// SQLite file the schema was written to.
    pub database_path: PathBuf,
    /// Name of the (only) table.
    pub table: &'static str,
    /// Number of columns in the table.
    pub column_count: usize,
    /// Indices defined on the table.
    pub indices: Vec<String>,
}

/// Creates a connection pool to the SQLite file at `database_path`.
///
/// The file is created if it does not exist. The pool holds a single
/// connection; nothing in this workspace issues concurrent queries.
///
/// # Errors
///
/// Returns an error if the file cannot be opened.
pub async fn create_pool(database_path: &Path) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(database_path)
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
}

/// Ensures the store directory, file, `predictions` table and its
/// creation-time index exist.
///
/// This is destructive: any existing `predictions` table is dropped first, so
/// every stored record is lost. The result is idempotent in schema shape only.
/// The drop and the create are separate statements; a crash between them
/// leaves the store without the table until the next run.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or any statement fails.
pub async fn initialize_schema(config: &HeartConfig) -> Result<SchemaSummary, DatabaseError> {
    std::fs::create_dir_all(&config.database_dir).map_err(|source| DatabaseError::Io {
        path: config.database_dir.clone(),
        source,
    })?;

    info!(path = %config.database_path.display(), "Opening database");
    let pool = create_pool(&config.database_path).await?;

    let result = schema::recreate(&pool).await;
    let summary = match result {
        Ok(()) => summarize(&pool, &config.database_path).await,
        Err(err) => Err(err),
    };

    pool.close().await;

    match &summary {
        Ok(s) => info!(
            table = s.table,
            columns = s.column_count,
            indices = ?s.indices,
            "Schema initialized"
        ),
        Err(err) => warn!(error = %err, "Schema initialization failed"),
    }

    summary.map_err(DatabaseError::from)
}

async fn summarize(pool: &SqlitePool, database_path: &Path) -> Result<SchemaSummary, sqlx::Error> {
    let columns = schema::table_columns(pool).await?;
    let indices = schema::index_names(pool).await?;

    Ok(SchemaSummary {
        database_path: database_path.to_path_buf(),
        table: TABLE_NAME,
        column_count: columns.len(),
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> (tempfile::TempDir, HeartConfig) {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HeartConfig::from_base_dir(dir.path());
        (dir, config)
    }

    fn sample_prediction() -> CreatePrediction {
        CreatePrediction {
            age: 63,
            sex: 1,
            chest_pain_type: 3,
            resting_blood_pressure: 145,
            cholesterol: 233,
            fasting_blood_sugar: 1,
            resting_ecg: 0,
            max_heart_rate: 150,
            exercise_induced_angina: 0,
            st_depression: 2.3,
            st_slope: 0,
            major_vessels: 0,
            thalassemia: 1,
            risk_percentage: 72.5,
            risk_level: RiskLevel::High,
        }
    }

    #[tokio::test]
    async fn test_initialize_creates_directory_and_table() {
        let (_dir, config) = test_config();
        assert!(!config.database_dir.exists());

        let summary = initialize_schema(&config).await.expect("init");

        assert!(config.database_path.exists());
        assert_eq!(summary.table, "predictions");
        assert_eq!(summary.column_count, 17);
        assert_eq!(summary.indices, vec![INDEX_NAME.to_string()]);
    }

    #[tokio::test]
    async fn test_initialize_twice_leaves_one_empty_table() {
        let (_dir, config) = test_config();

        initialize_schema(&config).await.expect("first init");

        let pool = create_pool(&config.database_path).await.expect("pool");
        PredictionRepository::create(&pool, sample_prediction())
            .await
            .expect("insert");
        assert_eq!(PredictionRepository::count(&pool).await.expect("count"), 1);
        pool.close().await;

        initialize_schema(&config).await.expect("second init");

        let pool = create_pool(&config.database_path).await.expect("pool");
        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'predictions'",
        )
        .fetch_all(&pool)
        .await
        .expect("tables");
        assert_eq!(tables.len(), 1);

        let columns = schema::table_columns(&pool).await.expect("columns");
        assert_eq!(columns, PREDICTION_COLUMNS);
        assert_eq!(PredictionRepository::count(&pool).await.expect("count"), 0);
    }

    #[tokio::test]
    async fn test_initialize_fails_when_directory_is_a_file() {
        let (dir, config) = test_config();
        std::fs::write(dir.path().join("database"), b"not a directory").expect("write");

        let err = initialize_schema(&config).await.expect_err("should fail");
        assert!(matches!(err, DatabaseError::Io { .. }));
        assert!(err.to_string().contains("database"));
    }
}
