//! Labeled heart-disease samples parsed from CSV.

use std::collections::BTreeMap;
use std::io::Read;

use ndarray::{Array1, Array2};

use crate::loader::LoadError;

/// Name of the binary outcome column.
pub const TARGET_COLUMN: &str = "target";

/// Column layout of the public UCI heart dataset, in file order.
pub const HEART_FEATURE_NAMES: [&str; 13] = [
    "age", "sex", "cp", "trestbps", "chol", "fbs", "restecg", "thalach", "exang", "oldpeak",
    "slope", "ca", "thal",
];

/// Feature matrix plus binary targets.
///
/// `feature_names` is the column order of `features`; consumers of the
/// fitted models must supply inputs in exactly this order.
#[derive(Debug, Clone, PartialEq)]
pub struct HeartDataset {
    pub feature_names: Vec<String>,
    pub features: Array2<f64>,
    pub targets: Array1<usize>,
}

impl HeartDataset {
    /// Parses a CSV with a header row.
    ///
    /// The `target` column is split off; every other column becomes a
    /// feature, in file order. Blank or non-numeric cells are rejected, as
    /// are targets other than 0 and 1.
    ///
    /// # Errors
    ///
    /// Returns [`LoadError::Parse`] on malformed input.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, LoadError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = csv_reader
            .headers()
            .map_err(|e| LoadError::Parse(format!("unreadable header: {e}")))?
            .clone();

        let target_index = headers
            .iter()
            .position(|h| h == TARGET_COLUMN)
            .ok_or_else(|| LoadError::Parse(format!("missing `{TARGET_COLUMN}` column")))?;

        let feature_names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != target_index)
            .map(|(_, h)| h.to_string())
            .collect();

        if feature_names.is_empty() {
            return Err(LoadError::Parse("no feature columns".to_string()));
        }

        let mut values = Vec::new();
        let mut targets = Vec::new();

        for record in csv_reader.records() {
            let record = record.map_err(|e| LoadError::Parse(e.to_string()))?;
            let line = record.position().map_or(0, csv::Position::line);

            for (i, cell) in record.iter().enumerate() {
                let column = headers.get(i).unwrap_or("?");
                if cell.is_empty() {
                    return Err(LoadError::Parse(format!(
                        "missing value in column `{column}` at line {line}"
                    )));
                }
                let value: f64 = cell.parse().map_err(|_| {
                    LoadError::Parse(format!(
                        "non-numeric value {cell:?} in column `{column}` at line {line}"
                    ))
                })?;

                if i == target_index {
                    targets.push(parse_label(value).ok_or_else(|| {
                        LoadError::Parse(format!(
                            "target must be 0 or 1, got {cell:?} at line {line}"
                        ))
                    })?);
                } else {
                    values.push(value);
                }
            }
        }

        if targets.is_empty() {
            return Err(LoadError::Parse("dataset has no rows".to_string()));
        }

        let features = Array2::from_shape_vec((targets.len(), feature_names.len()), values)
            .map_err(|e| LoadError::Parse(format!("ragged rows: {e}")))?;

        Ok(Self {
            feature_names,
            features,
            targets: Array1::from(targets),
        })
    }

    /// Number of samples.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    /// Number of feature columns (the target excluded).
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Rows and columns of the source table, the target column included.
    #[must_use]
    pub fn shape(&self) -> (usize, usize) {
        (self.n_samples(), self.n_features() + 1)
    }

    /// Sample count per class label.
    #[must_use]
    pub fn class_counts(&self) -> BTreeMap<usize, usize> {
        class_counts(self.targets.iter().copied())
    }

    /// True when the feature columns are the UCI heart layout.
    #[must_use]
    pub fn has_heart_layout(&self) -> bool {
        self.feature_names.iter().map(String::as_str).eq(HEART_FEATURE_NAMES)
    }
}

/// Counts occurrences of each label.
pub fn class_counts(labels: impl IntoIterator<Item = usize>) -> BTreeMap<usize, usize> {
    let mut counts = BTreeMap::new();
    for label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

#[allow(clippy::float_cmp)]
fn parse_label(value: f64) -> Option<usize> {
    if value == 0.0 {
        Some(0)
    } else if value == 1.0 {
        Some(1)
    } else {
        None
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::HEART_FEATURE_NAMES;

    /// Deterministic heart-shaped CSV with `rows` samples, alternating labels.
    ///
    /// Positive rows are shifted so the classes are learnable.
    pub(crate) fn synthetic_csv(rows: usize) -> String {
        let mut csv = HEART_FEATURE_NAMES.join(",");
        csv.push_str(",target\n");

        for i in 0..rows {
            let target = i % 2;
            let t = target as f64;
            let j = (i / 2) as f64;
            let row = [
                40.0 + j + 12.0 * t,
                (i % 3 == 0) as u8 as f64,
                (i % 4) as f64,
                120.0 + 2.0 * j + 15.0 * t,
                200.0 + 5.0 * j + 30.0 * t,
                (i % 5 == 0) as u8 as f64,
                ((i / 2) % 3) as f64,
                170.0 - 2.0 * j - 25.0 * t,
                t,
                0.2 * j + 1.5 * t,
                ((i + 1) % 3) as f64,
                ((i / 3) % 4) as f64,
                1.0 + t + ((i / 4) % 2) as f64,
            ];
            let cells: Vec<String> = row.iter().map(|v| format!("{v}")).collect();
            csv.push_str(&cells.join(","));
            csv.push_str(&format!(",{target}\n"));
        }

        csv
    }
}
