//! Axis-aligned hyperellipsoid condition.

use std::io::{Read, Write};

use rand::Rng;

use super::interval::Interval;
use crate::error::Result;
use crate::params::Params;

/// Centre and spread per dimension; matches inputs whose spread-weighted
/// distance from the centre is at most one.
#[derive(Debug, Clone, PartialEq)]
pub struct Ellipsoid {
    bounds: Interval,
}

impl Ellipsoid {
    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        Self {
            bounds: Interval::cover(params, x, rng),
        }
    }

    pub(super) fn matches(&self, x: &[f64]) -> bool {
        let dist: f64 = self
            .bounds
            .center
            .iter()
            .zip(&self.bounds.spread)
            .zip(x)
            .map(|((c, s), v)| ((v - c) / s).powi(2))
            .sum();
        dist <= 1.0
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
