//! Neural network prediction.

use std::io::{Read, Write};

use rand::Rng;

use crate::error::Result;
use crate::network::{Activation, Network};
use crate::params::Params;

/// A multi-layer perceptron with linear outputs; one backprop step per
/// update.
#[derive(Debug, Clone)]
pub struct NeuralPrediction {
    net: Network,
}

impl NeuralPrediction {
    pub(super) fn new<R: Rng + ?Sized>(params: &Params, rng: &mut R) -> Self {
        Self {
            net: Network::mlp(
                params.x_dim,
                params.hidden_neurons,
                params.y_dim,
                Activation::Linear,
                rng,
            ),
        }
    }

    pub(super) fn compute(&mut self, x: &[f64]) -> &[f64] {
        self.net.infer(x)
    }

    pub(super) fn output(&self) -> &[f64] {
        self.net.output()
    }

    pub(super) fn update<R: Rng>(
        &mut self,
        params: &Params,
        x: &[f64],
        y: &[f64],
        rng: &mut R,
    ) {
        self.net.forward(x, rng);
        self.net.learn(x, y, params.pred_eta);
    }

    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        self.net.mutate(params.p_mutation, params.s_mutation, rng)
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        self.net.save(w)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            net: Network::load(r)?,
        })
    }
}
