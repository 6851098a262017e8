//! Init-db command - drops and recreates the prediction store schema.

use anyhow::{Context, Result};
use config::HeartConfig;
use database::{initialize_schema, SchemaSummary};
use tracing::info;

use super::rule;

/// Runs the init-db command and prints the setup report.
///
/// # Errors
///
/// Returns an error if the store directory, file or schema cannot be created.
pub async fn run(config: &HeartConfig) -> Result<SchemaSummary> {
    info!(path = %config.database_path.display(), "Initializing database schema");

    let summary = initialize_schema(config).await.with_context(|| {
        format!(
            "Failed to initialize database at {}",
            config.database_path.display()
        )
    })?;

    println!("{}", report(&summary));
    Ok(summary)
}

fn report(summary: &SchemaSummary) -> String {
    let mut lines = vec![
        rule(),
        "[OK] Database initialized".to_string(),
        rule(),
        format!("  Location: {}", summary.database_path.display()),
        format!("  Table:    {} ({} columns)", summary.table, summary.column_count),
    ];
    for index in &summary.indices {
        lines.push(format!("  Index:    {index}"));
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_creates_store_under_base_dir() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = HeartConfig::from_base_dir(dir.path());

        let summary = run(&config).await.expect("init-db");

        assert!(dir.path().join("database/heart_disease.db").exists());
        assert_eq!(summary.column_count, 17);
    }

    #[test]
    fn test_report_lists_table_and_index() {
        let summary = SchemaSummary {
            database_path: "database/heart_disease.db".into(),
            table: "predictions",
            column_count: 17,
            indices: vec!["idx_created_at".to_string()],
        };

        let text = report(&summary);
        assert!(text.contains("predictions (17 columns)"));
        assert!(text.contains("idx_created_at"));
        assert!(text.contains("database/heart_disease.db"));
    }

    #[tokio::test]
    async fn test_run_fails_when_directory_is_blocked() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("database"), b"file").expect("write");
        let config = HeartConfig::from_base_dir(dir.path());

        let err = run(&config).await.expect_err("blocked");
        assert!(format!("{err:#}").contains("Failed to initialize database"));
    }
}
