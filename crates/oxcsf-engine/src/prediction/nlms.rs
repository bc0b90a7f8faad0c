//! Normalised least mean squares linear prediction.

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::Params;

/// Smallest admissible learning rate under self-adaptation.
const ETA_MIN: f64 = 1e-4;

/// Linear model on `(x0, x)` updated by normalised gradient descent.
#[derive(Debug, Clone)]
pub struct NlmsPrediction {
    /// Row-major `y_dim x (x_dim + 1)`; column 0 weights the constant term.
    weights: Vec<f64>,
    eta: f64,
    x0: f64,
    output: Vec<f64>,
}

impl NlmsPrediction {
    pub(super) fn new(params: &Params) -> Self {
        Self {
            weights: vec![0.0; params.y_dim * (params.x_dim + 1)],
            eta: params.pred_eta,
            x0: params.pred_x0,
            output: vec![0.0; params.y_dim],
        }
    }

    fn n(&self) -> usize {
        self.weights.len() / self.output.len()
    }

    pub(super) fn compute(&mut self, x: &[f64]) -> &[f64] {
        let n = self.n();
        for (d, out) in self.output.iter_mut().enumerate() {
            let row = &self.weights[d * n..(d + 1) * n];
            *out = row[0] * self.x0
                + row[1..].iter().zip(x).map(|(w, v)| w * v).sum::<f64>();
        }
        &self.output
    }

    pub(super) fn output(&self) -> &[f64] {
        &self.output
    }

    pub(super) fn update(&mut self, x: &[f64], y: &[f64]) {
        let norm = self.x0 * self.x0 + x.iter().map(|v| v * v).sum::<f64>();
        let n = self.n();
        self.compute(x);
        for d in 0..self.output.len() {
            let gain = self.eta * (y[d] - self.output[d]) / norm;
            let row = &mut self.weights[d * n..(d + 1) * n];
            row[0] += gain * self.x0;
            for (w, v) in row[1..].iter_mut().zip(x) {
                *w += gain * v;
            }
        }
    }

    /// Log-normal self-adaptation of the learning rate.
    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        if rng.random_bool(params.p_mutation) {
            let floor = ETA_MIN.min(params.pred_eta);
            self.eta = (self.eta * crate::network::layer::gauss(rng, 1.0).exp())
                .clamp(floor, params.pred_eta);
            true
        } else {
            false
        }
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.output.len())?;
        codec::put_f64(w, self.eta)?;
        codec::put_f64(w, self.x0)?;
        codec::put_f64_slice(w, &self.weights)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let y_dim = codec::get_usize(r)?;
        let eta = codec::get_f64(r)?;
        let x0 = codec::get_f64(r)?;
        let weights = codec::get_f64_vec(r)?;
        if y_dim == 0 || weights.len() % y_dim != 0 {
            return Err(Error::snapshot("nlms weight matrix shape mismatch"));
        }
        Ok(Self {
            weights,
            eta,
            x0,
            output: vec![0.0; y_dim],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converges_to_a_linear_target() {
        let params = Params::new(1, 1, 1);
        let mut pred = NlmsPrediction::new(&params);
        // y = 2x + 0.5
        for i in 0..2000 {
            let x = f64::from(i % 100) / 100.0;
            pred.update(&[x], &[2.0 * x + 0.5]);
        }
        pred.compute(&[0.25]);
        assert!((pred.output[0] - 1.0).abs() < 0.01);
    }

    #[test]
    fn update_moves_toward_the_target() {
        let params = Params::new(2, 1, 1);
        let mut pred = NlmsPrediction::new(&params);
        let x = [0.5, 0.5];
        let before = (pred.compute(&x)[0] - 1.0).abs();
        pred.update(&x, &[1.0]);
        let after = (pred.compute(&x)[0] - 1.0).abs();
        assert!(after < before);
    }

    #[test]
    fn save_load_round_trips() {
        let params = Params::new(3, 2, 1);
        let mut pred = NlmsPrediction::new(&params);
        pred.update(&[0.1, 0.2, 0.3], &[1.0, -1.0]);
        let mut buf = Vec::new();
        pred.save(&mut buf).unwrap();
        let mut restored = NlmsPrediction::load(&mut buf.as_slice()).unwrap();
        let x = [0.4, 0.5, 0.6];
        assert_eq!(pred.compute(&x), restored.compute(&x));
    }
}
