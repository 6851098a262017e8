//! L2-regularized logistic regression.

use anyhow::ensure;
use linfa::prelude::*;
use linfa_logistic::{FittedLogisticRegression, LogisticRegression};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

use crate::Classifier;

pub const MAX_ITERATIONS: u64 = 1000;
pub const L2_PENALTY: f64 = 1.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticClassifier {
    model: FittedLogisticRegression<f64, usize>,
}

impl LogisticClassifier {
    /// # Errors
    ///
    /// Returns an error if `y` does not hold exactly two classes or the
    /// optimizer fails.
    pub fn fit(x: &Array2<f64>, y: &Array1<usize>) -> anyhow::Result<Self> {
        let dataset = Dataset::new(x.clone(), y.clone());
        let model = LogisticRegression::<f64>::default()
            .alpha(L2_PENALTY)
            .max_iterations(MAX_ITERATIONS)
            .fit(&dataset)?;

        Ok(Self { model })
    }
}

impl Classifier for LogisticClassifier {
    fn predict(&self, x: &Array2<f64>) -> anyhow::Result<Array1<usize>> {
        Ok(self.model.predict(x))
    }

    /// Probability of the larger label, which is `1` for binary 0/1 targets.
    fn predict_proba(&self, x: &Array2<f64>) -> anyhow::Result<Array1<f64>> {
        ensure!(
            x.ncols() == self.model.params().len(),
            "Logistic regression was fitted on {} features, got {}",
            self.model.params().len(),
            x.ncols()
        );
        Ok(self.model.predict_probabilities(x))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::LogisticClassifier;
    use crate::Classifier;

    #[test]
    fn test_fits_linear_boundary() {
        let x = array![[-3.0], [-2.0], [-1.5], [-1.0], [1.0], [1.5], [2.0], [3.0]];
        let y = array![0, 0, 0, 0, 1, 1, 1, 1];
        let model = LogisticClassifier::fit(&x, &y).expect("fit");

        assert_eq!(
            model.predict(&array![[-2.5], [2.5]]).expect("predict"),
            array![0, 1]
        );

        let probabilities = model
            .predict_proba(&array![[-2.5], [0.0], [2.5]])
            .expect("proba");
        assert!(probabilities[0] < 0.5);
        assert!(probabilities[2] > 0.5);
        assert!(probabilities[0] < probabilities[1] && probabilities[1] < probabilities[2]);
        assert!(model.predict_proba(&array![[0.0, 1.0]]).is_err());
    }
}
