//! Prediction capability: the local model attached to each classifier.

mod constant;
mod nlms;
mod neural;
mod rls;

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::{Params, PredictionKind};

pub use self::constant::ConstantPrediction;
pub use self::nlms::NlmsPrediction;
pub use self::neural::NeuralPrediction;
pub use self::rls::RlsPrediction;

const TAG_CONSTANT: u8 = 0;
const TAG_NLMS: u8 = 1;
const TAG_RLS: u8 = 2;
const TAG_NEURAL: u8 = 3;

/// A classifier's local prediction model.
#[derive(Debug, Clone)]
pub enum Prediction {
    Constant(ConstantPrediction),
    Nlms(NlmsPrediction),
    Rls(RlsPrediction),
    Neural(NeuralPrediction),
}

impl Prediction {
    /// A fresh model of the configured variant.
    pub fn new<R: Rng + ?Sized>(params: &Params, rng: &mut R) -> Self {
        match params.prediction {
            PredictionKind::Constant => Self::Constant(ConstantPrediction::new(params.y_dim)),
            PredictionKind::Nlms => Self::Nlms(NlmsPrediction::new(params)),
            PredictionKind::Rls => Self::Rls(RlsPrediction::new(params)),
            PredictionKind::Neural => Self::Neural(NeuralPrediction::new(params, rng)),
        }
    }

    /// The model's output for the input.
    pub fn compute(&mut self, x: &[f64]) -> &[f64] {
        match self {
            Self::Constant(p) => p.compute(),
            Self::Nlms(p) => p.compute(x),
            Self::Rls(p) => p.compute(x),
            Self::Neural(p) => p.compute(x),
        }
    }

    /// The output of the most recent `compute`.
    pub fn output(&self) -> &[f64] {
        match self {
            Self::Constant(p) => p.compute(),
            Self::Nlms(p) => p.output(),
            Self::Rls(p) => p.output(),
            Self::Neural(p) => p.output(),
        }
    }

    /// One online update toward the target. `exp` is the classifier's
    /// experience after the enclosing update's increment.
    pub fn update<R: Rng>(
        &mut self,
        params: &Params,
        x: &[f64],
        y: &[f64],
        exp: u32,
        rng: &mut R,
    ) {
        match self {
            Self::Constant(p) => p.update(y, exp, params.beta),
            Self::Nlms(p) => p.update(x, y),
            Self::Rls(p) => p.update(x, y),
            Self::Neural(p) => p.update(params, x, y, rng),
        }
    }

    /// Predictions do not recombine; the operator exists so the EA can
    /// attempt it uniformly across components.
    pub fn crossover<R: Rng + ?Sized>(&mut self, _other: &mut Self, _rng: &mut R) -> bool {
        false
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        match self {
            Self::Constant(_) | Self::Rls(_) => false,
            Self::Nlms(p) => p.mutate(params, rng),
            Self::Neural(p) => p.mutate(params, rng),
        }
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Self::Constant(p) => {
                codec::put_u8(w, TAG_CONSTANT)?;
                p.save(w)
            }
            Self::Nlms(p) => {
                codec::put_u8(w, TAG_NLMS)?;
                p.save(w)
            }
            Self::Rls(p) => {
                codec::put_u8(w, TAG_RLS)?;
                p.save(w)
            }
            Self::Neural(p) => {
                codec::put_u8(w, TAG_NEURAL)?;
                p.save(w)
            }
        }
    }

    pub(crate) fn load<R: Read>(r: &mut R) -> Result<Self> {
        match codec::get_u8(r)? {
            TAG_CONSTANT => Ok(Self::Constant(ConstantPrediction::load(r)?)),
            TAG_NLMS => Ok(Self::Nlms(NlmsPrediction::load(r)?)),
            TAG_RLS => Ok(Self::Rls(RlsPrediction::load(r)?)),
            TAG_NEURAL => Ok(Self::Neural(NeuralPrediction::load(r)?)),
            tag => Err(Error::snapshot(format!("unknown prediction tag: {tag}"))),
        }
    }
}
