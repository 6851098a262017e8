//! Gaussian naive Bayes.

use std::collections::BTreeMap;
use std::f64::consts::PI;

use anyhow::ensure;
use linfa::prelude::*;
use linfa_bayes::GaussianNb;
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

use crate::metrics::POSITIVE_LABEL;
use crate::Classifier;

/// Share of the largest feature variance added to every class variance.
pub const VAR_SMOOTHING: f64 = 1e-9;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NaiveBayesClassifier {
    model: GaussianNb<f64, usize>,
    classes: BTreeMap<usize, ClassGaussian>,
}

/// Prior and per-feature normal parameters of one class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ClassGaussian {
    prior: f64,
    mean: Array1<f64>,
    var: Array1<f64>,
}

impl ClassGaussian {
    fn joint_log_likelihood(&self, row: ArrayView1<f64>) -> f64 {
        let log_density: f64 = row
            .iter()
            .zip(self.mean.iter().zip(self.var.iter()))
            .map(|(&v, (&mean, &var))| -0.5 * ((2.0 * PI * var).ln() + (v - mean).powi(2) / var))
            .sum();
        self.prior.ln() + log_density
    }
}

impl NaiveBayesClassifier {
    /// # Errors
    ///
    /// Returns an error if fitting fails.
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>) -> anyhow::Result<Self> {
        ensure!(
            x.nrows() > 0 && x.nrows() == y.len(),
            "Naive Bayes got {} rows and {} labels",
            x.nrows(),
            y.len()
        );
        let dataset = Dataset::new(x.clone(), y.clone());
        let model = GaussianNb::params().var_smoothing(VAR_SMOOTHING).fit(&dataset)?;

        let epsilon = VAR_SMOOTHING * x.var_axis(Axis(0), 0.0).fold(0.0, |m: f64, &v| m.max(v));
        let mut rows_by_class: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for (i, &label) in y.iter().enumerate() {
            rows_by_class.entry(label).or_default().push(i);
        }

        let mut classes = BTreeMap::new();
        for (label, rows) in rows_by_class {
            let subset = x.select(Axis(0), &rows);
            let mean = subset.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
            let var = subset.var_axis(Axis(0), 0.0) + epsilon;
            classes.insert(
                label,
                ClassGaussian {
                    prior: rows.len() as f64 / x.nrows() as f64,
                    mean,
                    var,
                },
            );
        }

        Ok(Self { model, classes })
    }
}

impl Classifier for NaiveBayesClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        Ok(self.model.predict(x))
    }

    /// Class posteriors normalized with log-sum-exp.
    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        let width = self.classes.values().next().map_or(0, |c| c.mean.len());
        ensure!(
            x.ncols() == width,
            "Naive Bayes was fitted on {width} features, got {}",
            x.ncols()
        );

        Ok(x.rows()
            .into_iter()
            .map(|row| {
                let scores: Vec<(usize, f64)> = self
                    .classes
                    .iter()
                    .map(|(&label, class)| (label, class.joint_log_likelihood(row)))
                    .collect();
                let max = scores.iter().map(|&(_, s)| s).fold(f64::NEG_INFINITY, f64::max);
                let total: f64 = scores.iter().map(|&(_, s)| (s - max).exp()).sum();
                scores
                    .iter()
                    .find(|&&(label, _)| label == POSITIVE_LABEL)
                    .map_or(0.0, |&(_, s)| (s - max).exp() / total)
            })
            .collect())
    }
}
