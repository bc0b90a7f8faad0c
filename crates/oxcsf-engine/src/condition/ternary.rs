//! Ternary bit-string condition over {0, 1, #}.

use std::io::{Read, Write};
use std::ops::RangeInclusive;

use rand::Rng;

use crate::codec;
use crate::error::{Error, Result};
use crate::params::Params;

const ZERO: u8 = b'0';
const ONE: u8 = b'1';
const DONT_CARE: u8 = b'#';

/// Fixed-length string over {0, 1, #}; each input variable is discretised
/// into `cond_bits` bits before comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Ternary {
    bits: Vec<u8>,
    bits_per_var: usize,
}

/// Discretises one input variable into its binary encoding, most
/// significant bit first. Inputs are interpreted on [0, 1].
fn encode(value: f64, bits_per_var: usize, out: &mut Vec<u8>) {
    let levels = 1_usize << bits_per_var;
    let level = ((value * levels as f64) as usize).min(levels - 1);
    for b in (0..bits_per_var).rev() {
        out.push(if level >> b & 1 == 1 { ONE } else { ZERO });
    }
}

fn encode_input(x: &[f64], bits_per_var: usize) -> Vec<u8> {
    let mut encoded = Vec::with_capacity(x.len() * bits_per_var);
    for v in x {
        encode(*v, bits_per_var, &mut encoded);
    }
    encoded
}

impl Ternary {
    pub(super) fn cover<R: Rng + ?Sized>(params: &Params, x: &[f64], rng: &mut R) -> Self {
        let mut bits = encode_input(x, params.cond_bits);
        for bit in &mut bits {
            if rng.random_bool(params.cond_p_dont_care) {
                *bit = DONT_CARE;
            }
        }
        Self {
            bits,
            bits_per_var: params.cond_bits,
        }
    }

    pub(super) fn matches(&self, x: &[f64]) -> bool {
        let encoded = encode_input(x, self.bits_per_var);
        self.bits
            .iter()
            .zip(&encoded)
            .all(|(b, e)| *b == DONT_CARE || b == e)
    }

    /// Two-point crossover: swaps one contiguous segment between parents.
    pub(super) fn crossover<R: Rng + ?Sized>(&mut self, other: &mut Self, rng: &mut R) -> bool {
        if self.bits.len() != other.bits.len() || self.bits.len() < 2 {
            return false;
        }
        let p1 = rng.random_range(0..self.bits.len() - 1);
        let p2 = rng.random_range(p1..self.bits.len());
        swap_range(&mut self.bits, &mut other.bits, p1..=p2);
        true
    }

    /// Per-position mutation toggling between a value and `#`.
    pub(super) fn mutate<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R) -> bool {
        let mut changed = false;
        for bit in &mut self.bits {
            if rng.random_bool(params.p_mutation) {
                *bit = match *bit {
                    DONT_CARE => {
                        if rng.random_bool(0.5) {
                            ONE
                        } else {
                            ZERO
                        }
                    }
                    _ => DONT_CARE,
                };
                changed = true;
            }
        }
        changed
    }

    pub(super) fn general(&self, other: &Self) -> bool {
        self.bits.len() == other.bits.len()
            && self
                .bits
                .iter()
                .zip(&other.bits)
                .all(|(s, o)| *s == DONT_CARE || s == o)
    }

    pub(super) fn save<W: Write>(&self, w: &mut W) -> Result<()> {
        codec::put_usize(w, self.bits_per_var)?;
        codec::put_bytes(w, &self.bits)
    }

    pub(super) fn load<R: Read>(r: &mut R) -> Result<Self> {
        let bits_per_var = codec::get_usize(r)?;
        let bits = codec::get_bytes(r)?;
        if bits.iter().any(|b| ![ZERO, ONE, DONT_CARE].contains(b)) {
            return Err(Error::snapshot("invalid ternary symbol"));
        }
        Ok(Self { bits, bits_per_var })
    }
}

fn swap_range<T>(x: &mut [T], y: &mut [T], range: RangeInclusive<usize>) {
    for i in range {
        std::mem::swap(&mut x[i], &mut y[i]);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    fn ternary(s: &str, bits_per_var: usize) -> Ternary {
        Ternary {
            bits: s.bytes().collect(),
            bits_per_var,
        }
    }

    #[test]
    fn single_bit_encoding_thresholds_at_half() {
        assert!(ternary("10", 1).matches(&[0.9, 0.1]));
        assert!(!ternary("10", 1).matches(&[0.1, 0.9]));
        assert!(ternary("##", 1).matches(&[0.3, 0.7]));
    }

    #[test]
    fn multi_bit_encoding() {
        // two bits per variable: 0.6 -> level 2 -> "10"
        assert!(ternary("10", 2).matches(&[0.6]));
        assert!(ternary("1#", 2).matches(&[0.8]));
        assert!(!ternary("01", 2).matches(&[0.6]));
    }

    #[test]
    fn covering_matches_and_respects_dont_care_rate() {
        let mut rng = Pcg64Mcg::seed_from_u64(30);
        let mut params = Params::new(6, 1, 2);
        params.cond_p_dont_care = 0.0;
        let x = [1.0, 0.0, 1.0, 1.0, 0.0, 0.0];
        let cond = Ternary::cover(&params, &x, &mut rng);
        assert_eq!(cond.bits, b"101100");
        assert!(cond.matches(&x));

        params.cond_p_dont_care = 1.0;
        let cond = Ternary::cover(&params, &x, &mut rng);
        assert_eq!(cond.bits, b"######");
    }

    #[test]
    fn generality_is_positionwise() {
        assert!(ternary("1#", 1).general(&ternary("10", 1)));
        assert!(ternary("##", 1).general(&ternary("1#", 1)));
        assert!(!ternary("10", 1).general(&ternary("1#", 1)));
        assert!(!ternary("0#", 1).general(&ternary("10", 1)));
    }

    #[test]
    fn crossover_preserves_multiset_of_symbols() {
        let mut rng = Pcg64Mcg::seed_from_u64(31);
        let mut a = ternary("000000", 1);
        let mut b = ternary("111111", 1);
        assert!(a.crossover(&mut b, &mut rng));
        let ones = a.bits.iter().filter(|c| **c == ONE).count()
            + b.bits.iter().filter(|c| **c == ONE).count();
        assert_eq!(ones, 6);
        // swapped segment is contiguous
        let boundary_changes = a
            .bits
            .windows(2)
            .filter(|w| w[0] != w[1])
            .count();
        assert!(boundary_changes <= 2);
    }

    #[test]
    fn mutation_toggles_specific_and_general() {
        let mut rng = Pcg64Mcg::seed_from_u64(32);
        let mut params = Params::new(4, 1, 2);
        params.p_mutation = 1.0;
        let mut cond = ternary("01#1", 1);
        assert!(cond.mutate(&params, &mut rng));
        assert_eq!(cond.bits[0], DONT_CARE);
        assert_eq!(cond.bits[1], DONT_CARE);
        assert_ne!(cond.bits[2], DONT_CARE);
        assert_eq!(cond.bits[3], DONT_CARE);
    }
}
