//! Axis-aligned hyperrectangle condition.

use std::io::{Read, Write};

use rand::Rng;

use super::interval::Interval;
use crate::error::Result;
use crate::params::Params;

/// A box with a centre and spread per input dimension; matches inputs that
/// lie inside the box.
#[derive(Debug, Clone, PartialEq)]
pub struct Hyperrectangle {
    bounds: Interval,
}

impl Hyperrectangle {
    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        Self {
            bounds: Interval::cover(params, x, rng),
        }
    }

    pub(super) fn matches(&self, x: &[f64]) -> bool {
        self.bounds
            .center
            .iter()
            .zip(&self.bounds.spread)
            .zip(x)
            .all(|((c, s), v)| (v - c).abs() <= *s)
    }

    pub(super) fn crossover<R: Rng + ?Sized>(&mut self, other: &mut Self, rng: &mut R) -> bool {
        self.bounds.crossover(&mut other.bounds, rng)
    }

    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        self.bounds.mutate(params, rng)
    }

    pub(super) fn general(&self, other: &Self) -> bool {
        self.bounds.encloses(&other.bounds)
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        self.bounds.save(w)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        Ok(Self {
            bounds: Interval::load(r)?,
        })
    }
}
