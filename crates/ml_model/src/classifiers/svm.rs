//! Support vector classifier with a Gaussian (RBF) kernel and Platt-scaled
//! probability estimates.

use anyhow::ensure;
use linfa::prelude::*;
use linfa_svm::Svm;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::calibration::PlattScaling;
use crate::metrics::POSITIVE_LABEL;
use crate::Classifier;

/// Soft-margin penalty for both classes.
pub const PENALTY: f64 = 1.0;

/// Folds used to collect held-out decision values for calibration.
pub const CALIBRATION_FOLDS: usize = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmClassifier {
    model: Svm<f64, bool>,
    kernel_width: f64,
    platt: PlattScaling,
}

impl SvmClassifier {
    /// Fits on `y == 1` as the positive class.
    ///
    /// The kernel is `exp(-|a - b|^2 / eps)` with `eps = n_features * var(x)`,
    /// the variance taken over every cell of `x`. The probability sigmoid is
    /// fitted on decision values from [`CALIBRATION_FOLDS`] held-out folds,
    /// shuffled with `seed`.
    ///
    /// # Errors
    ///
    /// Returns an error if the solver fails.
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>, seed: u64) -> anyhow::Result<Self> {
        ensure!(
            x.nrows() == y.len(),
            "SVM got {} rows but {} labels",
            x.nrows(),
            y.len()
        );
        let kernel_width = kernel_width(x);
        let positives = y.mapv(|label| label == POSITIVE_LABEL);
        let model = fit_svm(x, &positives, kernel_width)?;

        let decisions = held_out_decisions(x, &positives, kernel_width, seed)?;
        let platt = PlattScaling::fit(&decisions, &positives.to_vec());

        Ok(Self {
            model,
            kernel_width,
            platt,
        })
    }

    #[must_use]
    pub const fn kernel_width(&self) -> f64 {
        self.kernel_width
    }

    #[must_use]
    pub const fn platt(&self) -> PlattScaling {
        self.platt
    }

    /// Signed distance to the separating surface; positive means label 1.
    #[must_use]
    pub fn decision_function(&self, x: &Array2<f64>) -> Array1<f64> {
        x.rows().into_iter().map(|row| decision(&self.model, row)).collect()
    }
}

impl Classifier for SvmClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        let decisions: Array1<bool> = self.model.predict(x);
        Ok(decisions.mapv(usize::from))
    }

    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        Ok(self
            .decision_function(x)
            .mapv(|decision| self.platt.probability(decision)))
    }
}

fn fit_svm(x: &Array2<f64>, positives: &Array1<bool>, width: f64) -> anyhow::Result<Svm<f64, bool>> {
    let dataset = Dataset::new(x.clone(), positives.clone());
    let model = Svm::<f64, bool>::params()
        .pos_neg_weights(PENALTY, PENALTY)
        .gaussian_kernel(width)
        .fit(&dataset)?;
    Ok(model)
}

fn decision(model: &Svm<f64, bool>, row: ArrayView1<f64>) -> f64 {
    model.weighted_sum(&row) - model.rho
}

/// Decision value of every row from a model that did not see it.
///
/// A fold whose training part holds one class scores its rows `+1` or `-1`
/// for that class.
fn held_out_decisions(
    x: &Array2<f64>,
    positives: &Array1<bool>,
    width: f64,
    seed: u64,
) -> anyhow::Result<Vec<f64>> {
    let n = x.nrows();
    let mut order: Vec<usize> = (0..n).collect();
    order.shuffle(&mut ChaCha8Rng::seed_from_u64(seed));

    let folds = CALIBRATION_FOLDS.min(n);
    let mut decisions = vec![0.0; n];
    for fold in 0..folds {
        let start = fold * n / folds;
        let end = (fold + 1) * n / folds;
        let held_out = &order[start..end];
        let train: Vec<usize> = order[..start].iter().chain(&order[end..]).copied().collect();
        if train.is_empty() {
            continue;
        }

        let train_labels = positives.select(Axis(0), &train);
        let n_positive = train_labels.iter().filter(|&&p| p).count();
        if n_positive == 0 || n_positive == train_labels.len() {
            let constant = if n_positive == 0 { -1.0 } else { 1.0 };
            for &i in held_out {
                decisions[i] = constant;
            }
            continue;
        }

        let model = fit_svm(&x.select(Axis(0), &train), &train_labels, width)?;
        for &i in held_out {
            decisions[i] = decision(&model, x.row(i));
        }
    }
    Ok(decisions)
}

#[allow(clippy::cast_precision_loss)]
fn kernel_width(x: &Array2<f64>) -> f64 {
    let mean = x.mean().unwrap_or(0.0);
    let variance = x.mapv(|v| (v - mean).powi(2)).mean().unwrap_or(0.0);
    let width = x.ncols() as f64 * variance;
    if width.is_finite() && width > 0.0 {
        width
    } else {
        1.0
    }
}
