//! DDL for the `predictions` table and schema introspection helpers.

use sqlx::SqlitePool;
use tracing::debug;

/// The only table in the store.
pub const TABLE_NAME: &str = "predictions";

/// Secondary index ordering records by creation time, newest first.
pub const INDEX_NAME: &str = "idx_created_at";

/// Column layout of `predictions`, in declaration order.
pub const PREDICTION_COLUMNS: [&str; 17] = [
    "id",
    "age",
    "sex",
    "chest_pain_type",
    "resting_blood_pressure",
    "cholesterol",
    "fasting_blood_sugar",
    "resting_ecg",
    "max_heart_rate",
    "exercise_induced_angina",
    "st_depression",
    "st_slope",
    "major_vessels",
    "thalassemia",
    "risk_percentage",
    "risk_level",
    "created_at",
];

const DROP_TABLE: &str = "DROP TABLE IF EXISTS predictions";

const CREATE_TABLE: &str = r"
    CREATE TABLE IF NOT EXISTS predictions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        age INTEGER NOT NULL,
        sex INTEGER NOT NULL,
        chest_pain_type INTEGER NOT NULL,
        resting_blood_pressure INTEGER NOT NULL,
        cholesterol INTEGER NOT NULL,
        fasting_blood_sugar INTEGER NOT NULL,
        resting_ecg INTEGER NOT NULL,
        max_heart_rate INTEGER NOT NULL,
        exercise_induced_angina INTEGER NOT NULL,
        st_depression REAL NOT NULL,
        st_slope INTEGER NOT NULL,
        major_vessels INTEGER NOT NULL,
        thalassemia INTEGER NOT NULL,
        risk_percentage REAL NOT NULL,
        risk_level TEXT NOT NULL,
        created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    )
";

const CREATE_INDEX: &str = r"
    CREATE INDEX IF NOT EXISTS idx_created_at
    ON predictions(created_at DESC)
";

/// Drops and recreates the table, then the index.
///
/// The statements run one by one outside a transaction.
pub(crate) async fn recreate(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    for (step, statement) in [
        ("drop table", DROP_TABLE),
        ("create table", CREATE_TABLE),
        ("create index", CREATE_INDEX),
    ] {
        debug!(step, "Executing schema statement");
        sqlx::query(statement).execute(pool).await?;
    }

    Ok(())
}

/// Lists the column names of `predictions` in declaration order.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub async fn table_columns(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar("SELECT name FROM pragma_table_info('predictions') ORDER BY cid")
        .fetch_all(pool)
        .await
}

/// Lists the explicitly created indices on `predictions`.
///
/// # Errors
///
/// Returns an error if the database operation fails.
pub async fn index_names(pool: &SqlitePool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar(
        r"
        SELECT name FROM sqlite_master
        WHERE type = 'index' AND tbl_name = 'predictions' AND sql IS NOT NULL
        ORDER BY name
        ",
    )
    .fetch_all(pool)
    .await
}
