//! Centre/spread interval genetics shared by the hyperrectangle and
//! hyperellipsoid conditions.

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::network::layer::gauss;
use crate::params::Params;

#[derive(Debug, Clone, PartialEq)]
pub(super) struct Interval {
    pub(super) center: Vec<f64>,
    pub(super) spread: Vec<f64>,
}

impl Interval {
    /// Centres an interval on the input with a random spread per dimension.
    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        let spread = (0..x.len())
            .map(|_| params.cond_spread_min + rng.random::<f64>() * 0.5 * params.cond_range())
            .collect();
        Self {
            center: x.to_vec(),
            spread,
        }
    }

    /// Uniform per-dimension swap of (centre, spread) pairs.
    pub(super) fn crossover<R: Rng + ?Sized>(&mut self, other: &mut Self, rng: &mut R) -> bool {
        let mut changed = false;
        for i in 0..self.center.len() {
            if rng.random_bool(0.5) {
                std::mem::swap(&mut self.center[i], &mut other.center[i]);
                std::mem::swap(&mut self.spread[i], &mut other.spread[i]);
                changed = true;
            }
        }
        changed
    }

    /// Gaussian perturbation of centre and spread.
    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        let sigma = params.s_mutation * params.cond_range();
        let mut changed = false;
        for c in &mut self.center {
            if rng.random_bool(params.p_mutation) {
                *c = (*c + gauss(rng, sigma)).clamp(params.cond_min, params.cond_max);
                changed = true;
            }
        }
        for s in &mut self.spread {
            if rng.random_bool(params.p_mutation) {
                *s = (*s + gauss(rng, sigma)).clamp(params.cond_spread_min, params.cond_range());
                changed = true;
            }
        }
        changed
    }

    /// Whether self's bounds enclose the other's in every dimension.
    pub(super) fn encloses(&self, other: &Self) -> bool {
        self.center
            .iter()
            .zip(&self.spread)
            .zip(other.center.iter().zip(&other.spread))
            .all(|((c, s), (oc, os))| c - s <= oc - os && c + s >= oc + os)
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_f64_slice(w, &self.center)?;
        codec::put_f64_slice(w, &self.spread)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let center = codec::get_f64_vec(r)?;
        let spread = codec::get_f64_vec(r)?;
        if center.len() != spread.len() {
            return Err(Error::snapshot("interval centre/spread length mismatch"));
        }
        Ok(Self { center, spread })
    }
}
