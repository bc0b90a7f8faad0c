//! Piece-wise constant prediction: a running mean of the observed targets.

use std::io::{Read, Write};

use crate::codec;
use crate::error::Result;

#[derive(Debug, Clone, PartialEq)]
pub struct ConstantPrediction {
    mean: Vec<f64>,
}

impl ConstantPrediction {
    pub(super) fn new(y_dim: usize) -> Self {
        Self {
            mean: vec![0.0; y_dim],
        }
    }

    pub(super) fn compute(&self) -> &[f64] {
        &self.mean
    }

    /// Widrow-Hoff with warm-up: a true running mean while
    /// `exp * beta < 1`, then an exponential moving average.
    pub(super) fn update(&mut self, y: &[f64], exp: u32, beta: f64) {
        let exp = f64::from(exp);
        if exp * beta < 1.0 {
            for (m, t) in self.mean.iter_mut().zip(y) {
                *m = (*m * (exp - 1.0) + t) / exp;
            }
        } else {
            for (m, t) in self.mean.iter_mut().zip(y) {
                *m += beta * (t - *m);
            }
        }
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_f64_slice(w, &self.mean)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            mean: codec::get_f64_vec(r)?,
        })
    }
}
