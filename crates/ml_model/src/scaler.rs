//! Per-feature standardization fitted on the training partition.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

/// Error type for scaler operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScalerError {
    #[error("Cannot fit a scaler on zero samples")]
    Empty,

    #[error("Scaler was fitted on {expected} features, got {found}")]
    FeatureMismatch { expected: usize, found: usize },
}

/// Removes the mean and divides by the population standard deviation.
///
/// Features with (near) zero deviation keep a scale of 1.0 so constant
/// columns map to zero instead of dividing by zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    var: Array1<f64>,
    n_samples_seen: usize,
}

impl StandardScaler {
    /// Fits the scaler to the rows of `x`.
    ///
    /// # Errors
    ///
    /// Returns [`ScalerError::Empty`] if `x` has no rows.
    pub fn fit(x: &Array2<f64>) -> Result<Self, ScalerError> {
        let mean = x.mean_axis(Axis(0)).ok_or(ScalerError::Empty)?;
        let var = x.var_axis(Axis(0), 0.0);
        let scale = var.mapv(|v| {
            let std = v.sqrt();
            if std < 10.0 * f64::EPSILON {
                1.0
            } else {
                std
            }
        });

        Ok(Self {
            mean,
            scale,
            var,
            n_samples_seen: x.nrows(),
        })
    }

    /// Standardizes `x` with the fitted parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ScalerError::FeatureMismatch`] if the column count differs.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ScalerError> {
        self.check_width(x)?;
        Ok((x - &self.mean) / &self.scale)
    }

    /// Maps standardized rows back to the original units.
    ///
    /// # Errors
    ///
    /// Returns [`ScalerError::FeatureMismatch`] if the column count differs.
    pub fn inverse_transform(&self, x: &Array2<f64>) -> Result<Array2<f64>, ScalerError> {
        self.check_width(x)?;
        Ok(x * &self.scale + &self.mean)
    }

    /// Per-feature means seen during fitting.
    #[must_use]
    pub const fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-feature divisors.
    #[must_use]
    pub const fn scale(&self) -> &Array1<f64> {
        &self.scale
    }

    /// Per-feature population variances.
    #[must_use]
    pub const fn var(&self) -> &Array1<f64> {
        &self.var
    }

    /// Number of rows the scaler was fitted on.
    #[must_use]
    pub const fn n_samples_seen(&self) -> usize {
        self.n_samples_seen
    }

    /// Number of features the scaler expects.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    fn check_width(&self, x: &Array2<f64>) -> Result<(), ScalerError> {
        if x.ncols() == self.n_features() {
            Ok(())
        } else {
            Err(ScalerError::FeatureMismatch {
                expected: self.n_features(),
                found: x.ncols(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn test_fit_computes_population_statistics() {
        let x = array![[1.0, 10.0], [3.0, 10.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&x).expect("fit");

        assert_eq!(scaler.mean(), &array![3.0, 10.0]);
        assert!((scaler.var()[0] - 8.0 / 3.0).abs() < 1e-12);
        // Constant column keeps unit scale.
        assert!((scaler.scale()[1] - 1.0).abs() < f64::EPSILON);
        assert_eq!(scaler.n_samples_seen(), 3);
    }

    #[test]
    fn test_transform_centers_and_scales() {
        let x = array![[1.0, 2.0], [3.0, 6.0], [5.0, 10.0]];
        let scaler = StandardScaler::fit(&x).expect("fit");
        let scaled = scaler.transform(&x).expect("transform");

        let means = scaled.mean_axis(Axis(0)).expect("mean");
        let stds = scaled.std_axis(Axis(0), 0.0);
        for j in 0..2 {
            assert!(means[j].abs() < 1e-12);
            assert!((stds[j] - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_inverse_round_trip() {
        let x = array![[63.0, 145.0, 2.3], [37.0, 130.0, 3.5], [41.0, 130.0, 1.4]];
        let scaler = StandardScaler::fit(&x).expect("fit");

        let restored = scaler
            .inverse_transform(&scaler.transform(&x).expect("transform"))
            .expect("inverse");
        for (a, b) in restored.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unseen_rows_use_training_parameters() {
        let train = array![[0.0], [2.0]];
        let scaler = StandardScaler::fit(&train).expect("fit");

        let scaled = scaler.transform(&array![[4.0]]).expect("transform");
        assert!((scaled[[0, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_errors() {
        let empty = Array2::<f64>::zeros((0, 3));
        assert_eq!(StandardScaler::fit(&empty), Err(ScalerError::Empty));

        let scaler = StandardScaler::fit(&array![[1.0, 2.0]]).expect("fit");
        assert_eq!(
            scaler.transform(&array![[1.0, 2.0, 3.0]]),
            Err(ScalerError::FeatureMismatch {
                expected: 2,
                found: 3
            })
        );
    }
}
