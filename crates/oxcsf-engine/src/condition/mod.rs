//! Condition capability: the matching half of a classifier.
//!
//! Conditions are tagged variants; the tag byte doubles as the on-disk
//! identifier. Crossover is only defined between conditions of the same
//! variant and is otherwise declined.

mod dgp;
mod ellipsoid;
mod hyperrectangle;
mod interval;
mod neural;
mod ternary;
mod tree;

use std::io::{Read, Write};

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::{ConditionKind, Params};

pub use self::dgp::DgpGraph;
pub use self::ellipsoid::Ellipsoid;
pub use self::hyperrectangle::Hyperrectangle;
pub use self::neural::NeuralCondition;
pub use self::ternary::Ternary;
pub use self::tree::GpTree;

const TAG_HYPERRECTANGLE: u8 = 0;
const TAG_ELLIPSOID: u8 = 1;
const TAG_TERNARY: u8 = 2;
const TAG_NEURAL: u8 = 3;
const TAG_DGP: u8 = 4;
const TAG_TREE: u8 = 5;
const TAG_DUMMY: u8 = 6;

/// A classifier condition.
#[derive(Debug, Clone)]
pub enum Condition {
    Hyperrectangle(Hyperrectangle),
    Ellipsoid(Ellipsoid),
    Ternary(Ternary),
    Neural(NeuralCondition),
    Dgp(DgpGraph),
    Tree(GpTree),
    /// Matches every input and carries no genetic material.
    Dummy,
}

impl Condition {
    /// Creates a condition of the configured variant that matches `x`.
    pub fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        match params.condition {
            ConditionKind::Hyperrectangle => {
                Self::Hyperrectangle(Hyperrectangle::cover(params, x, rng))
            }
            ConditionKind::Ellipsoid => Self::Ellipsoid(Ellipsoid::cover(params, x, rng)),
            ConditionKind::Ternary => Self::Ternary(Ternary::cover(params, x, rng)),
            ConditionKind::Neural => Self::Neural(NeuralCondition::cover(params, x, rng)),
            ConditionKind::Dgp => Self::Dgp(DgpGraph::cover(params, x, rng)),
            ConditionKind::Tree => Self::Tree(GpTree::cover(params, x, rng)),
            ConditionKind::Dummy => Self::Dummy,
        }
    }

    /// Whether the condition matches the input.
    pub fn matches(&mut self, x: &[f64]) -> bool {
        match self {
            Self::Hyperrectangle(c) => c.matches(x),
            Self::Ellipsoid(c) => c.matches(x),
            Self::Ternary(c) => c.matches(x),
            Self::Neural(c) => c.matches(x),
            Self::Dgp(c) => c.matches(x),
            Self::Tree(c) => c.matches(x),
            Self::Dummy => true,
        }
    }

    /// In-place crossover between same-variant conditions.
    pub fn crossover<R: Rng + ?Sized>(&mut self, other: &mut Self, rng: &mut R) -> bool {
        match (self, other) {
            (Self::Hyperrectangle(a), Self::Hyperrectangle(b)) => a.crossover(b, rng),
            (Self::Ellipsoid(a), Self::Ellipsoid(b)) => a.crossover(b, rng),
            (Self::Ternary(a), Self::Ternary(b)) => a.crossover(b, rng),
            (Self::Tree(a), Self::Tree(b)) => a.crossover(b, rng),
            _ => false,
        }
    }

    pub fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        match self {
            Self::Hyperrectangle(c) => c.mutate(params, rng),
            Self::Ellipsoid(c) => c.mutate(params, rng),
            Self::Ternary(c) => c.mutate(params, rng),
            Self::Neural(c) => c.mutate(params, rng),
            Self::Dgp(c) => c.mutate(params, rng),
            Self::Tree(c) => c.mutate(params, rng),
            Self::Dummy => false,
        }
    }

    /// Whether self's match region contains the other's. Only the interval
    /// and ternary representations support this test.
    pub fn general(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Hyperrectangle(a), Self::Hyperrectangle(b)) => a.general(b),
            (Self::Ellipsoid(a), Self::Ellipsoid(b)) => a.general(b),
            (Self::Ternary(a), Self::Ternary(b)) => a.general(b),
            (Self::Dummy, Self::Dummy) => true,
            _ => false,
        }
    }

    /// Exact structural equality, used to merge duplicate classifiers.
    /// Network-backed conditions never report identity.
    pub fn identical(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Hyperrectangle(a), Self::Hyperrectangle(b)) => a == b,
            (Self::Ellipsoid(a), Self::Ellipsoid(b)) => a == b,
            (Self::Ternary(a), Self::Ternary(b)) => a == b,
            (Self::Dgp(a), Self::Dgp(b)) => a == b,
            (Self::Tree(a), Self::Tree(b)) => a == b,
            (Self::Dummy, Self::Dummy) => true,
            _ => false,
        }
    }

    pub(crate) fn tag(&self) -> u8 {
        match self {
            Self::Hyperrectangle(_) => TAG_HYPERRECTANGLE,
            Self::Ellipsoid(_) => TAG_ELLIPSOID,
            Self::Ternary(_) => TAG_TERNARY,
            Self::Neural(_) => TAG_NEURAL,
            Self::Dgp(_) => TAG_DGP,
            Self::Tree(_) => TAG_TREE,
            Self::Dummy => TAG_DUMMY,
        }
    }

    pub(crate) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_u8(w, self.tag())?;
        match self {
            Self::Hyperrectangle(c) => c.save(w),
            Self::Ellipsoid(c) => c.save(w),
            Self::Ternary(c) => c.save(w),
            Self::Neural(c) => c.save(w),
            Self::Dgp(c) => c.save(w),
            Self::Tree(c) => c.save(w),
            Self::Dummy => Ok(()),
        }
    }

    pub(crate) fn load<R: Read>(r: &mut R) -> Result<Self> {
        match codec::get_u8(r)? {
            TAG_HYPERRECTANGLE => Ok(Self::Hyperrectangle(Hyperrectangle::load(r)?)),
            TAG_ELLIPSOID => Ok(Self::Ellipsoid(Ellipsoid::load(r)?)),
            TAG_TERNARY => Ok(Self::Ternary(Ternary::load(r)?)),
            TAG_NEURAL => Ok(Self::Neural(NeuralCondition::load(r)?)),
            TAG_DGP => Ok(Self::Dgp(DgpGraph::load(r)?)),
            TAG_TREE => Ok(Self::Tree(GpTree::load(r)?)),
            TAG_DUMMY => Ok(Self::Dummy),
            tag => Err(Error::snapshot(format!("unknown condition tag: {tag}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    fn all_kinds() -> [ConditionKind; 7] {
        [
            ConditionKind::Hyperrectangle,
            ConditionKind::Ellipsoid,
            ConditionKind::Ternary,
            ConditionKind::Neural,
            ConditionKind::Dgp,
            ConditionKind::Tree,
            ConditionKind::Dummy,
        ]
    }

    #[test]
    fn every_variant_covers_and_matches() {
        let mut rng = Pcg64Mcg::seed_from_u64(70);
        for kind in all_kinds() {
            let mut params = Params::new(3, 1, 1);
            params.condition = kind;
            let x = [0.2, 0.6, 0.8];
            let mut cond = Condition::cover(&params, &x, &mut rng);
            assert!(cond.matches(&x), "{kind:?} does not match covered input");
        }
    }

    #[test]
    fn cross_variant_crossover_is_declined() {
        let mut rng = Pcg64Mcg::seed_from_u64(71);
        let params = Params::new(2, 1, 1);
        let x = [0.5, 0.5];
        let mut rect = Condition::cover(&params, &x, &mut rng);
        let mut params_e = params.clone();
        params_e.condition = ConditionKind::Ellipsoid;
        let mut ell = Condition::cover(&params_e, &x, &mut rng);
        assert!(!rect.crossover(&mut ell, &mut rng));
    }

    #[test]
    fn save_load_round_trips_every_variant() {
        let mut rng = Pcg64Mcg::seed_from_u64(72);
        for kind in all_kinds() {
            let mut params = Params::new(2, 1, 1);
            params.condition = kind;
            let x = [0.4, 0.9];
            let mut cond = Condition::cover(&params, &x, &mut rng);
            let mut buf = Vec::new();
            cond.save(&mut buf).unwrap();
            let mut restored = Condition::load(&mut buf.as_slice()).unwrap();
            assert_eq!(cond.tag(), restored.tag());
            // behaviour must survive the round trip
            for _ in 0..20 {
                let probe: Vec<f64> = (0..2).map(|_| rng.random_range(0.0..1.0)).collect();
                assert_eq!(cond.matches(&probe), restored.matches(&probe), "{kind:?}");
            }
        }
    }

    #[test]
    fn copies_are_independent_storage() {
        let mut rng = Pcg64Mcg::seed_from_u64(73);
        let mut params = Params::new(2, 1, 1);
        params.p_mutation = 1.0;
        let x = [0.5, 0.5];
        let original = Condition::cover(&params, &x, &mut rng);
        let mut copy = original.clone();
        copy.mutate(&params, &mut rng);
        assert!(original.identical(&original.clone()));
        assert!(!original.identical(&copy));
    }
}
