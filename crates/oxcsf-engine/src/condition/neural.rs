//! Neural network condition.

use std::io::{Read, Write};

use rand::Rng;

use crate::error::Result;
use crate::network::{Activation, Network};
use crate::params::Params;

/// How many re-randomisations covering attempts before accepting a
/// non-matching network. Keeps a pathological input from stalling a trial.
const MAX_COVER_ATTEMPTS: usize = 10_000;

/// A small feed-forward network producing one logistic output; the
/// condition matches when the output exceeds one half.
#[derive(Debug, Clone)]
pub struct NeuralCondition {
    net: Network,
}

impl NeuralCondition {
    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        let net = Network::mlp(
            params.x_dim,
            params.hidden_neurons,
            1,
            Activation::Logistic,
            rng,
        );
        let mut cond = Self { net };
        for _ in 0..MAX_COVER_ATTEMPTS {
            if cond.matches(x) {
                break;
            }
            cond.net.rand_init(rng);
        }
        cond
    }

    pub(super) fn matches(&mut self, x: &[f64]) -> bool {
        self.net.infer(x)[0] > 0.5
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
