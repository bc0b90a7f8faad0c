//! Action capability: the consequent half of a classifier.

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::network::{Activation, Network};
use crate::params::{ActionKind, Params};

const TAG_INTEGER: u8 = 0;
const TAG_NEURAL: u8 = 1;

/// How many re-randomisations covering attempts before accepting a network
/// whose arg-max differs from the requested action.
const MAX_COVER_ATTEMPTS: usize = 10_000;

/// A classifier action.
#[derive(Debug, Clone)]
pub enum Action {
    /// A fixed discrete action in `[0, n_actions)`.
    Integer(usize),
    /// A network with `n_actions` outputs; the advocated action is the
    /// arg-max over the outputs.
    Neural(NeuralAction),
}

#[derive(Debug, Clone)]
pub struct NeuralAction {
    net: Network,
}

impl Action {
    /// Creates an action advocating `action` for the input `x`.
    pub fn cover<R: Rng + ?Sized>(
        params: &Params,
        x: &[f64],
        action: usize,
        rng: &mut R,
    ) -> Self {
        match params.action {
            ActionKind::Integer => Self::Integer(action),
            ActionKind::Neural => {
                let mut neural = NeuralAction {
                    net: Network::mlp(
                        params.x_dim,
                        params.hidden_neurons,
                        params.n_actions,
                        Activation::Logistic,
                        rng,
                    ),
                };
                for _ in 0..MAX_COVER_ATTEMPTS {
                    if neural.compute(x) == action {
                        break;
                    }
                    neural.net.rand_init(rng);
                }
                Self::Neural(neural)
            }
        }
    }

    /// The action advocated for the input.
    pub fn compute(&mut self, x: &[f64]) -> usize {
        match self {
            Self::Integer(a) => *a,
            Self::Neural(n) => n.compute(x),
        }
    }

    /// Replaces an integer action with a random distinct value, or jitters
    /// the network weights.
    pub fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        match self {
            Self::Integer(a) => {
                if params.n_actions > 1 && rng.random_bool(params.p_mutation) {
                    let mut next = rng.random_range(0..params.n_actions - 1);
                    if next >= *a {
                        next += 1;
                    }
                    *a = next;
                    true
                } else {
                    false
                }
            }
            Self::Neural(n) => n.net.mutate(params.p_mutation, params.s_mutation, rng),
        }
    }

    /// Integer actions carry no crossover; network weights do not cross.
    pub fn crossover<R: Rng + ?Sized>(&mut self, _other: &mut Self, _rng: &mut R) -> bool {
        false
    }

    /// Whether two actions demonstrably advocate the same behaviour.
    /// Conservative for networks: they never report sameness.
    pub fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Integer(a), Self::Integer(b)) => a == b,
            _ => false,
        }
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Self::Integer(a) => {
                codec::put_u8(w, TAG_INTEGER)?;
                codec::put_usize(w, *a)
            }
            Self::Neural(n) => {
                codec::put_u8(w, TAG_NEURAL)?;
                n.net.save(w)
            }
        }
    }

    pub(crate) fn load<R: Read>(r: &mut R, params: &Params) -> Result<Self> {
        match codec::get_u8(r)? {
            TAG_INTEGER => {
                let a = codec::get_usize(r)?;
                if a >= params.n_actions {
                    return Err(Error::snapshot(format!("action out of range: {a}")));
                }
                Ok(Self::Integer(a))
            }
            TAG_NEURAL => Ok(Self::Neural(NeuralAction {
                net: Network::load(r)?,
            })),
            tag => Err(Error::snapshot(format!("unknown action tag: {tag}"))),
        }
    }
}

impl NeuralAction {
    fn compute(&mut self, x: &[f64]) -> usize {
        let out = self.net.infer(x);
        let mut best = 0;
        for (i, v) in out.iter().enumerate() {
            if *v > out[best] {
                best = i;
            }
        }
        best
    }
}
