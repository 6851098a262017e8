//! Platt scaling: maps raw decision values to `P(y = 1)`.
//!
//! The sigmoid is `P(y = 1 | f) = 1 / (1 + exp(a * f + b))`. Fitting uses
//! Newton's method with a backtracking line search on smoothed targets.

use serde::{Deserialize, Serialize};

const MAX_ITERATIONS: usize = 100;
const MIN_STEP: f64 = 1e-10;
const HESSIAN_RIDGE: f64 = 1e-12;
const GRADIENT_TOLERANCE: f64 = 1e-5;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlattScaling {
    /// Slope; negative when larger decision values mean the positive class.
    pub a: f64,
    /// Intercept.
    pub b: f64,
}

impl Default for PlattScaling {
    fn default() -> Self {
        Self { a: -1.0, b: 0.0 }
    }
}

impl PlattScaling {
    /// Fits the sigmoid to `decisions` against binary `positives`.
    ///
    /// Empty or mismatched input yields the default `a = -1, b = 0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn fit(decisions: &[f64], positives: &[bool]) -> Self {
        if decisions.is_empty() || decisions.len() != positives.len() {
            return Self::default();
        }

        let n_pos = positives.iter().filter(|&&p| p).count() as f64;
        let n_neg = positives.len() as f64 - n_pos;
        let hi_target = (n_pos + 1.0) / (n_pos + 2.0);
        let lo_target = 1.0 / (n_neg + 2.0);
        let targets: Vec<f64> = positives
            .iter()
            .map(|&p| if p { hi_target } else { lo_target })
            .collect();

        let mut a = 0.0;
        let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
        let mut fval = objective(decisions, &targets, a, b);

        for _ in 0..MAX_ITERATIONS {
            let (mut h11, mut h22, mut h21) = (HESSIAN_RIDGE, HESSIAN_RIDGE, 0.0);
            let (mut g1, mut g2) = (0.0, 0.0);
            for (&f, &t) in decisions.iter().zip(&targets) {
                let p = sigmoid_complement(f * a + b);
                let q = 1.0 - p;
                let d2 = p * q;
                h11 += f * f * d2;
                h22 += d2;
                h21 += f * d2;
                let d1 = t - p;
                g1 += f * d1;
                g2 += d1;
            }

            if g1.abs() < GRADIENT_TOLERANCE && g2.abs() < GRADIENT_TOLERANCE {
                break;
            }

            let det = h11 * h22 - h21 * h21;
            let da = -(h22 * g1 - h21 * g2) / det;
            let db = -(-h21 * g1 + h11 * g2) / det;
            let gd = g1 * da + g2 * db;

            let mut step = 1.0;
            while step >= MIN_STEP {
                let new_a = a + step * da;
                let new_b = b + step * db;
                let new_f = objective(decisions, &targets, new_a, new_b);
                if new_f < fval + 1e-4 * step * gd {
                    a = new_a;
                    b = new_b;
                    fval = new_f;
                    break;
                }
                step /= 2.0;
            }

            if step < MIN_STEP {
                break;
            }
        }

        Self { a, b }
    }

    /// `P(y = 1)` for one decision value.
    #[must_use]
    pub fn probability(&self, decision: f64) -> f64 {
        sigmoid_complement(self.a * decision + self.b)
    }
}

/// `1 / (1 + exp(z))` without overflow.
fn sigmoid_complement(z: f64) -> f64 {
    if z >= 0.0 {
        let e = (-z).exp();
        e / (1.0 + e)
    } else {
        1.0 / (1.0 + z.exp())
    }
}

/// Cross-entropy of the sigmoid against the smoothed targets.
fn objective(decisions: &[f64], targets: &[f64], a: f64, b: f64) -> f64 {
    decisions
        .iter()
        .zip(targets)
        .map(|(&f, &t)| {
            let z = f * a + b;
            if z >= 0.0 {
                t * z + (-z).exp().ln_1p()
            } else {
                (t - 1.0) * z + z.exp().ln_1p()
            }
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_centered() {
        let platt = PlattScaling::default();
        assert!((platt.probability(0.0) - 0.5).abs() < 1e-12);
        assert!(platt.probability(2.0) > 0.5);
    }

    #[test]
    fn test_fit_orders_probabilities_by_decision() {
        let decisions = [-2.0, -1.5, -0.8, -0.2, 0.3, 0.9, 1.4, 2.1];
        let positives = [false, false, false, true, false, true, true, true];
        let platt = PlattScaling::fit(&decisions, &positives);

        assert!(platt.a < 0.0);
        assert!(platt.probability(-2.0) < 0.5);
        assert!(platt.probability(2.0) > 0.5);
        assert!(platt.probability(1.0) > platt.probability(-1.0));
    }

    #[test]
    fn test_extreme_decisions_stay_in_unit_interval() {
        let platt = PlattScaling::fit(&[-1.0, 1.0], &[false, true]);
        for decision in [-1e6, -50.0, 0.0, 50.0, 1e6] {
            let p = platt.probability(decision);
            assert!((0.0..=1.0).contains(&p), "{decision} -> {p}");
        }
    }

    #[test]
    fn test_empty_input_keeps_default() {
        assert_eq!(PlattScaling::fit(&[], &[]), PlattScaling::default());
        assert_eq!(PlattScaling::fit(&[1.0], &[]), PlattScaling::default());
    }
}
