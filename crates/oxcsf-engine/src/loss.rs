//! Loss functions for error estimates and scoring.

use serde::{Deserialize, Serialize};

const LOG_EPS: f64 = 1e-15;
const HUBER_DELTA: f64 = 1.0;

/// Selectable loss functions.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::FromStr, Serialize, Deserialize,
)]
#[from_str(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum LossKind {
    /// Mean absolute error.
    #[default]
    Mae,
    /// Mean squared error.
    Mse,
    /// Root mean squared error.
    Rmse,
    /// Log loss over a probability vector.
    Log,
    /// Binary log loss on a single output.
    BinaryLog,
    /// 0/1 error on the arg-max output.
    OneHot,
    /// Huber loss with unit delta.
    Huber,
}

impl LossKind {
    /// Loss between a prediction and the ground truth.
    ///
    /// Both slices have the same length (the output dimension); callers
    /// guarantee this via the engine's dimension checks.
    #[must_use]
    pub fn compute(self, pred: &[f64], y: &[f64]) -> f64 {
        debug_assert_eq!(pred.len(), y.len());
        let n = pred.len() as f64;
        match self {
            Self::Mae => {
                pred.iter()
                    .zip(y)
                    .map(|(p, t)| (p - t).abs())
                    .sum::<f64>()
                    / n
            }
            Self::Mse => {
                pred.iter()
                    .zip(y)
                    .map(|(p, t)| (p - t).powi(2))
                    .sum::<f64>()
                    / n
            }
            Self::Rmse => Self::Mse.compute(pred, y).sqrt(),
            Self::Log => {
                // cross entropy against the true class distribution
                -pred
                    .iter()
                    .zip(y)
                    .map(|(p, t)| t * p.max(LOG_EPS).ln())
                    .sum::<f64>()
                    / n
            }
            Self::BinaryLog => {
                let p = pred[0].clamp(LOG_EPS, 1.0 - LOG_EPS);
                let t = y[0];
                -(t * p.ln() + (1.0 - t) * (1.0 - p).ln())
            }
            Self::OneHot => {
                if arg_max(pred) == arg_max(y) {
                    0.0
                } else {
                    1.0
                }
            }
            Self::Huber => {
                pred.iter()
                    .zip(y)
                    .map(|(p, t)| {
                        let e = (p - t).abs();
                        if e <= HUBER_DELTA {
                            0.5 * e * e
                        } else {
                            HUBER_DELTA * (e - 0.5 * HUBER_DELTA)
                        }
                    })
                    .sum::<f64>()
                    / n
            }
        }
    }
}

fn arg_max(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pointwise_losses() {
        let pred = [0.5, 1.5];
        let y = [1.0, 1.0];
        assert!((LossKind::Mae.compute(&pred, &y) - 0.5).abs() < 1e-12);
        assert!((LossKind::Mse.compute(&pred, &y) - 0.25).abs() < 1e-12);
        assert!((LossKind::Rmse.compute(&pred, &y) - 0.5).abs() < 1e-12);
        // both residuals are below delta, so huber is half the mse
        assert!((LossKind::Huber.compute(&pred, &y) - 0.125).abs() < 1e-12);
    }

    #[test]
    fn onehot_checks_argmax_only() {
        let y = [0.0, 1.0, 0.0];
        assert_eq!(LossKind::OneHot.compute(&[0.1, 0.8, 0.1], &y), 0.0);
        assert_eq!(LossKind::OneHot.compute(&[0.9, 0.05, 0.05], &y), 1.0);
    }

    #[test]
    fn log_losses_are_finite_at_extremes() {
        assert!(LossKind::BinaryLog.compute(&[0.0], &[1.0]).is_finite());
        assert!(LossKind::Log.compute(&[0.0, 1.0], &[1.0, 0.0]).is_finite());
        // perfect confidence costs nothing
        assert!(LossKind::BinaryLog.compute(&[1.0], &[1.0]) < 1e-12);
    }
}
