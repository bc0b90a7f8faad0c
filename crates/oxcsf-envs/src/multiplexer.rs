//! The Boolean multiplexer problem.
//!
//! A state of `k + 2^k` bits: the first `k` address bits select one of the
//! remaining data bits, and the rewarded action is that bit's value.

use anyhow::{Context as _, bail};
use rand::{Rng as _, RngCore};

use oxcsf_engine::Environment;

#[derive(Debug, Clone)]
pub struct Multiplexer {
    address_bits: usize,
    state: Vec<f64>,
    done: bool,
}

impl Multiplexer {
    /// Builds a multiplexer from the total bit count, which must be of the
    /// form `k + 2^k` (6, 11, 20, 37, ...).
    pub fn new(n_bits: usize) -> anyhow::Result<Self> {
        let address_bits = (1..)
            .find(|k| k + (1 << k) >= n_bits)
            .context("multiplexer size out of range")?;
        if address_bits + (1 << address_bits) != n_bits {
            bail!("{n_bits} is not a valid multiplexer size (need k + 2^k)");
        }
        Ok(Self {
            address_bits,
            state: vec![0.0; n_bits],
            done: false,
        })
    }

    fn addressed_bit(&self) -> usize {
        let mut address = 0;
        for bit in 0..self.address_bits {
            address = (address << 1) | usize::from(self.state[bit] > 0.5);
        }
        let value = self.state[self.address_bits + address];
        usize::from(value > 0.5)
    }
}

impl Environment for Multiplexer {
    fn x_dim(&self) -> usize {
        self.state.len()
    }

    fn n_actions(&self) -> usize {
        2
    }

    fn multistep(&self) -> bool {
        false
    }

    fn max_payoff(&self) -> f64 {
        1.0
    }

    fn reset(&mut self, rng: &mut dyn RngCore) {
        for bit in &mut self.state {
            *bit = if rng.random_bool(0.5) { 1.0 } else { 0.0 };
        }
        self.done = false;
    }

    fn state(&self) -> &[f64] {
        &self.state
    }

    fn execute(&mut self, action: usize, _rng: &mut dyn RngCore) -> f64 {
        self.done = true;
        if action == self.addressed_bit() { 1.0 } else { 0.0 }
    }

    fn is_done(&self) -> bool {
        self.done
    }
}
