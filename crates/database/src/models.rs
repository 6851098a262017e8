//! Database model types.

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::NaiveDateTime;

/// Lowest percentage bucketed as [`RiskLevel::Moderate`].
pub const MODERATE_RISK_THRESHOLD: f64 = 34.0;
/// Lowest percentage bucketed as [`RiskLevel::High`].
pub const HIGH_RISK_THRESHOLD: f64 = 67.0;

/// Risk bucket derived from a risk percentage.
///
/// Stored in the `risk_level` column by its variant name.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::AsRefStr,
)]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    /// Buckets a percentage in `[0, 100]`: 67 and above is high, 34 and above
    /// moderate.
    #[must_use]
    pub fn from_percentage(percentage: f64) -> Self {
        if percentage >= HIGH_RISK_THRESHOLD {
            Self::High
        } else if percentage >= MODERATE_RISK_THRESHOLD {
            Self::Moderate
        } else {
            Self::Low
        }
    }
}

/// A stored prediction request and its outcome.
#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct PredictionRecord {
    pub id: i64,
    pub age: i64,
    pub sex: i64,
    pub chest_pain_type: i64,
    pub resting_blood_pressure: i64,
    pub cholesterol: i64,
    pub fasting_blood_sugar: i64,
    pub resting_ecg: i64,
    pub max_heart_rate: i64,
    pub exercise_induced_angina: i64,
    pub st_depression: f64,
    pub st_slope: i64,
    pub major_vessels: i64,
    pub thalassemia: i64,
    pub risk_percentage: f64,
    pub risk_level: String,
    pub created_at: NaiveDateTime,
}

impl PredictionRecord {
    /// Parses the stored risk label.
    #[must_use]
    pub fn risk_level(&self) -> Option<RiskLevel> {
        self.risk_level.parse().ok()
    }
}

/// Input for inserting a prediction; `id` and `created_at` are assigned by
/// the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreatePrediction {
    pub age: i64,
    pub sex: i64,
    pub chest_pain_type: i64,
    pub resting_blood_pressure: i64,
    pub cholesterol: i64,
    pub fasting_blood_sugar: i64,
    pub resting_ecg: i64,
    pub max_heart_rate: i64,
    pub exercise_induced_angina: i64,
    pub st_depression: f64,
    pub st_slope: i64,
    pub major_vessels: i64,
    pub thalassemia: i64,
    pub risk_percentage: f64,
    pub risk_level: RiskLevel,
}
