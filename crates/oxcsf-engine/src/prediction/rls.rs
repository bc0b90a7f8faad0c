//! Recursive least squares linear prediction.

use std::io::{Read, Write};

use crate::codec;
use crate::error::{Error, Result};
use crate::params::Params;

/// Linear model on `(x0, x)` fitted by recursive least squares. One inverse
/// covariance matrix is shared across the output dimensions.
#[derive(Debug, Clone)]
pub struct RlsPrediction {
    /// Row-major `y_dim x n`, `n = x_dim + 1`.
    weights: Vec<f64>,
    /// Row-major `n x n` inverse covariance estimate.
    cov: Vec<f64>,
    lambda: f64,
    x0: f64,
    output: Vec<f64>,
    /// Scratch: the extended input `(x0, x)`.
    xe: Vec<f64>,
    /// Scratch: the gain vector.
    gain: Vec<f64>,
}

impl RlsPrediction {
    pub(super) fn new(params: &Params) -> Self {
        let n = params.x_dim + 1;
        let mut cov = vec![0.0; n * n];
        for i in 0..n {
            cov[i * n + i] = params.pred_rls_scale_factor;
        }
        Self {
            weights: vec![0.0; params.y_dim * n],
            cov,
            lambda: params.pred_rls_lambda,
            x0: params.pred_x0,
            output: vec![0.0; params.y_dim],
            xe: vec![0.0; n],
            gain: vec![0.0; n],
        }
    }

    fn n(&self) -> usize {
        self.xe.len()
    }

    fn extend_input(&mut self, x: &[f64]) {
        self.xe[0] = self.x0;
        self.xe[1..].copy_from_slice(x);
    }

    pub(super) fn compute(&mut self, x: &[f64]) -> &[f64] {
        self.extend_input(x);
        let n = self.n();
        for (d, out) in self.output.iter_mut().enumerate() {
            *out = self.weights[d * n..(d + 1) * n]
                .iter()
                .zip(&self.xe)
                .map(|(w, v)| w * v)
                .sum();
        }
        &self.output
    }

    pub(super) fn output(&self) -> &[f64] {
        &self.output
    }

    pub(super) fn update(&mut self, x: &[f64], y: &[f64]) {
        self.compute(x);
        let n = self.n();
        // gain = P xe / (lambda + xe' P xe)
        for i in 0..n {
            self.gain[i] = self.cov[i * n..(i + 1) * n]
                .iter()
                .zip(&self.xe)
                .map(|(p, v)| p * v)
                .sum();
        }
        let denom = self.lambda
            + self
                .xe
                .iter()
                .zip(&self.gain)
                .map(|(v, g)| v * g)
                .sum::<f64>();
        for g in &mut self.gain {
            *g /= denom;
        }
        // weights follow the per-output residual along the gain direction
        for d in 0..self.output.len() {
            let residual = y[d] - self.output[d];
            for (w, g) in self.weights[d * n..(d + 1) * n].iter_mut().zip(&self.gain) {
                *w += residual * g;
            }
        }
        // P <- (P - gain (xe' P)) / lambda
        let mut xtp = vec![0.0; n];
        for (j, out) in xtp.iter_mut().enumerate() {
            *out = self
                .xe
                .iter()
                .enumerate()
                .map(|(i, v)| v * self.cov[i * n + j])
                .sum();
        }
        for i in 0..n {
            for j in 0..n {
                self.cov[i * n + j] = (self.cov[i * n + j] - self.gain[i] * xtp[j]) / self.lambda;
            }
        }
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.output.len())?;
        codec::put_f64(w, self.lambda)?;
        codec::put_f64(w, self.x0)?;
        codec::put_f64_slice(w, &self.weights)?;
        codec::put_f64_slice(w, &self.cov)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let y_dim = codec::get_usize(r)?;
        let lambda = codec::get_f64(r)?;
        let x0 = codec::get_f64(r)?;
        let weights = codec::get_f64_vec(r)?;
        let cov = codec::get_f64_vec(r)?;
        if y_dim == 0 || weights.len() % y_dim != 0 {
            return Err(Error::snapshot("rls weight matrix shape mismatch"));
        }
        let n = weights.len() / y_dim;
        if cov.len() != n * n {
            return Err(Error::snapshot("rls covariance shape mismatch"));
        }
        Ok(Self {
            weights,
            cov,
            lambda,
            x0,
            output: vec![0.0; y_dim],
            xe: vec![0.0; n],
            gain: vec![0.0; n],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fits_a_line_in_few_samples() {
        let params = Params::new(1, 1, 1);
        let mut pred = RlsPrediction::new(&params);
        // y = 3x - 1; RLS should nail an exactly linear target quickly
        for i in 0..20 {
            let x = f64::from(i) / 20.0;
            pred.update(&[x], &[3.0 * x - 1.0]);
        }
        pred.compute(&[0.5]);
        assert!((pred.output[0] - 0.5).abs() < 1e-3);
    }

    #[test]
    fn handles_multiple_outputs() {
        let params = Params::new(1, 2, 1);
        let mut pred = RlsPrediction::new(&params);
        for i in 0..30 {
            let x = f64::from(i) / 30.0;
            pred.update(&[x], &[x, -2.0 * x]);
        }
        pred.compute(&[0.4]);
        assert!((pred.output[0] - 0.4).abs() < 1e-3);
        assert!((pred.output[1] + 0.8).abs() < 1e-3);
    }

    #[test]
    fn save_load_round_trips() {
        let params = Params::new(2, 1, 1);
        let mut pred = RlsPrediction::new(&params);
        pred.update(&[0.3, 0.6], &[1.5]);
        let mut buf = Vec::new();
        pred.save(&mut buf).unwrap();
        let mut restored = RlsPrediction::load(&mut buf.as_slice()).unwrap();
        let x = [0.9, 0.1];
        assert_eq!(pred.compute(&x), restored.compute(&x));
    }
}
