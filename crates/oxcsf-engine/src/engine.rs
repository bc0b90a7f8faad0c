//! The engine handle: parameters, PRNG, population and the working sets.

use std::path::Path;

use rand::SeedableRng as _;
use rand_pcg::Pcg64Mcg;

use crate::data::Dataset;
use crate::error::Result;
use crate::pa::PredictionArray;
use crate::params::Params;
use crate::population::Population;
use crate::reinforcement::{self, Environment};
use crate::set::Set;
use crate::snapshot;
use crate::supervised;

/// Deferred reinforcement state between a `step` and its `update_reward`.
#[derive(Debug, Default)]
pub(crate) struct RlState {
    pub(crate) state: Vec<f64>,
    pub(crate) reward: f64,
    pub(crate) pending: bool,
    pub(crate) explore_step: bool,
}

/// An XCSF learning classifier system.
///
/// The handle owns every piece of mutable state: the population, the
/// working sets, the prediction array, the logical trial clock and the
/// seeded PRNG. Parameters are read-mostly; only the `explore` flag is
/// toggled between trials.
#[derive(Debug)]
pub struct Xcsf {
    pub(crate) params: Params,
    pub(crate) rng: Pcg64Mcg,
    pub(crate) pop: Population,
    pub(crate) mset: Set,
    pub(crate) aset: Set,
    pub(crate) kset: Set,
    pub(crate) pa: PredictionArray,
    pub(crate) time: u32,
    pub(crate) rl: RlState,
}

impl Xcsf {
    /// Builds an engine from validated parameters.
    pub fn new(params: Params) -> Result<Self> {
        params.validate()?;
        let pa = PredictionArray::new(&params);
        let rng = Pcg64Mcg::seed_from_u64(params.seed);
        Ok(Self {
            params,
            rng,
            pop: Population::new(),
            mset: Set::new(),
            aset: Set::new(),
            kset: Set::new(),
            pa,
            time: 0,
            rl: RlState::default(),
        })
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }

    #[must_use]
    pub fn population(&self) -> &Population {
        &self.pop
    }

    /// The logical trial clock.
    #[must_use]
    pub fn time(&self) -> u32 {
        self.time
    }

    /// Trains on the dataset for `max_trials` iterations; returns the mean
    /// training loss. Test data, when given, is scored alongside for the
    /// windowed performance report.
    pub fn fit(&mut self, train: &Dataset, test: Option<&Dataset>, shuffle: bool) -> Result<f64> {
        supervised::fit(self, train, test, shuffle)
    }

    /// Predictions for a row-major input matrix, one `y_dim` row per
    /// `x_dim` row of input.
    pub fn predict(&mut self, x: &[f64]) -> Result<Vec<f64>> {
        supervised::predict(self, x)
    }

    /// Mean loss over a labelled dataset, without learning.
    pub fn score(&mut self, test: &Dataset) -> Result<f64> {
        supervised::score(self, test)
    }

    /// Runs alternating explore/exploit reinforcement trials against the
    /// environment for `max_trials` iterations. Returns the mean exploit
    /// performance (steps to goal for multistep environments, payoff error
    /// otherwise).
    pub fn fit_env(&mut self, env: &mut dyn Environment, verbose: bool) -> Result<f64> {
        reinforcement::fit(self, env, verbose)
    }

    /// Selects an action for the state; learning completes on the matching
    /// [`Self::update_reward`] call.
    pub fn step(&mut self, state: &[f64]) -> Result<usize> {
        reinforcement::step(self, state)
    }

    /// Reports the payoff of the most recent `step`.
    pub fn update_reward(&mut self, reward: f64, done: bool) -> Result<()> {
        reinforcement::update_reward(self, reward, done)
    }

    /// Switches between learning (explore) and greedy (exploit) trials for
    /// the incremental interface.
    pub fn set_explore(&mut self, explore: bool) {
        self.params.explore = explore;
    }

    /// Writes a whole-population binary snapshot.
    pub fn save(&self, path: &Path) -> Result<()> {
        snapshot::save(self, path)
    }

    /// Restores an engine from a snapshot.
    pub fn load(path: &Path) -> Result<Self> {
        snapshot::load(path)
    }

    /// Human-readable population dump.
    pub fn print(&self, verbose: bool) {
        println!(
            "population: {} macro-classifiers, numerosity {}/{}, time {}",
            self.pop.num_macros(),
            self.pop.total_num(),
            self.params.pop_size,
            self.time,
        );
        if !verbose {
            return;
        }
        for c in self.pop.classifiers() {
            println!(
                "  err {:.5} fit {:.5} num {} exp {} size {:.1} time {} age {}",
                c.err, c.fit, c.num, c.exp, c.size, c.time, c.age,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn new_rejects_invalid_params() {
        let mut params = Params::default();
        params.beta = 0.0;
        assert!(matches!(Xcsf::new(params), Err(Error::Config(_))));
    }

    #[test]
    fn same_seed_same_behaviour() {
        let mut params = Params::new(1, 1, 1);
        params.max_trials = 200;
        params.pop_size = 50;
        params.perf_trials = 10_000;
        params.seed = 42;
        let data = Dataset::new(
            (0..50).map(|i| f64::from(i) / 50.0).collect(),
            (0..50).map(|i| f64::from(i) / 25.0).collect(),
            1,
            1,
        )
        .unwrap();
        let mut a = Xcsf::new(params.clone()).unwrap();
        let mut b = Xcsf::new(params).unwrap();
        let loss_a = a.fit(&data, None, true).unwrap();
        let loss_b = b.fit(&data, None, true).unwrap();
        assert_eq!(loss_a, loss_b);
        assert_eq!(a.predict(&[0.3]).unwrap(), b.predict(&[0.3]).unwrap());
    }
}
