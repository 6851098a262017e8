//! Repository functions for prediction records.

use sqlx::SqlitePool;

use crate::models::{CreatePrediction, PredictionRecord};

/// Repository for prediction operations.
///
/// Records are append-only: there is no update or delete.
pub struct PredictionRepository;

impl PredictionRepository {
    /// Inserts a prediction record and returns its assigned id.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn create(pool: &SqlitePool, input: CreatePrediction) -> Result<i64, sqlx::Error> {
        let result = sqlx::query(
            r"
            INSERT INTO predictions (
                age, sex, chest_pain_type, resting_blood_pressure, cholesterol,
                fasting_blood_sugar, resting_ecg, max_heart_rate, exercise_induced_angina,
                st_depression, st_slope, major_vessels, thalassemia,
                risk_percentage, risk_level
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(input.age)
        .bind(input.sex)
        .bind(input.chest_pain_type)
        .bind(input.resting_blood_pressure)
        .bind(input.cholesterol)
        .bind(input.fasting_blood_sugar)
        .bind(input.resting_ecg)
        .bind(input.max_heart_rate)
        .bind(input.exercise_induced_angina)
        .bind(input.st_depression)
        .bind(input.st_slope)
        .bind(input.major_vessels)
        .bind(input.thalassemia)
        .bind(input.risk_percentage)
        .bind(input.risk_level.as_ref())
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Lists up to `limit` records, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn list_recent(
        pool: &SqlitePool,
        limit: i64,
    ) -> Result<Vec<PredictionRecord>, sqlx::Error> {
        sqlx::query_as::<_, PredictionRecord>(
            r"
            SELECT id, age, sex, chest_pain_type, resting_blood_pressure, cholesterol,
                   fasting_blood_sugar, resting_ecg, max_heart_rate, exercise_induced_angina,
                   st_depression, st_slope, major_vessels, thalassemia,
                   risk_percentage, risk_level, created_at
            FROM predictions
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            ",
        )
        .bind(limit)
        .fetch_all(pool)
        .await
    }

    /// Counts stored records.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    pub async fn count(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
            .fetch_one(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use sqlx::sqlite::SqlitePoolOptions;

    use super::*;
    use crate::models::RiskLevel;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("pool");
        crate::schema::recreate(&pool).await.expect("schema");
        pool
    }

    fn prediction(age: i64, risk_percentage: f64) -> CreatePrediction {
        CreatePrediction {
            age,
            sex: 0,
            chest_pain_type: 1,
            resting_blood_pressure: 130,
            cholesterol: 204,
            fasting_blood_sugar: 0,
            resting_ecg: 1,
            max_heart_rate: 172,
            exercise_induced_angina: 0,
            st_depression: 1.4,
            st_slope: 2,
            major_vessels: 0,
            thalassemia: 2,
            risk_percentage,
            risk_level: RiskLevel::from_percentage(risk_percentage),
        }
    }

    #[tokio::test]
    async fn test_create_and_list_newest_first() {
        let pool = memory_pool().await;

        let first = PredictionRepository::create(&pool, prediction(41, 12.0))
            .await
            .expect("insert");
        let second = PredictionRepository::create(&pool, prediction(56, 55.0))
            .await
            .expect("insert");
        let third = PredictionRepository::create(&pool, prediction(67, 91.0))
            .await
            .expect("insert");
        assert!(first < second && second < third);

        let records = PredictionRepository::list_recent(&pool, 10)
            .await
            .expect("list");
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![third, second, first]);

        let newest = &records[0];
        assert_eq!(newest.age, 67);
        assert!((newest.st_depression - 1.4).abs() < f64::EPSILON);
        assert_eq!(newest.risk_level(), Some(RiskLevel::High));
    }

    #[tokio::test]
    async fn test_list_respects_limit_and_count() {
        let pool = memory_pool().await;
        for age in 40..45 {
            PredictionRepository::create(&pool, prediction(age, 20.0))
                .await
                .expect("insert");
        }

        assert_eq!(PredictionRepository::count(&pool).await.expect("count"), 5);
        let records = PredictionRepository::list_recent(&pool, 2)
            .await
            .expect("list");
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].age, 44);
    }
}
