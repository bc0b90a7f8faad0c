//! The prediction array: fitness-weighted aggregation of classifier
//! predictions, indexed by action and output dimension.

use std::thread;

use rand::Rng;

use crate::params::Params;
use crate::population::Population;
use crate::set::Set;

#[derive(Debug)]
pub struct PredictionArray {
    /// `n_actions x y_dim` weighted sums, normalised after the build.
    pa: Vec<f64>,
    /// Per-action fitness denominators; zero marks an absent action.
    nr: Vec<f64>,
    y_dim: usize,
    best_action: usize,
    best_payoff: f64,
}

impl PredictionArray {
    #[must_use]
    pub fn new(params: &Params) -> Self {
        Self {
            pa: vec![0.0; params.n_actions * params.y_dim],
            nr: vec![0.0; params.n_actions],
            y_dim: params.y_dim,
            best_action: 0,
            best_payoff: 0.0,
        }
    }

    /// Aggregates the match set's predictions for `x`.
    ///
    /// Each member contributes its prediction weighted by fitness to its
    /// advocated action's slot. The member's advocated action and prediction
    /// output are cached on the classifier for the rest of the trial.
    pub fn build(&mut self, pop: &mut Population, mset: &Set, params: &Params, x: &[f64]) {
        self.pa.fill(0.0);
        self.nr.fill(0.0);
        if params.n_threads > 1 && mset.len() >= params.n_threads {
            self.accumulate_parallel(pop, params, x);
        } else {
            for &i in mset.indices() {
                let c = &mut pop.members[i];
                let action = c.action.compute(x);
                c.current_action = action;
                let pred = c.prediction.compute(x);
                for (v, p) in pred.iter().enumerate() {
                    self.pa[action * self.y_dim + v] += p * c.fit;
                }
                self.nr[action] += c.fit;
            }
        }
        self.normalize();
    }

    /// Fan-out over population chunks with per-worker partial buffers,
    /// reduced in chunk order. Membership is taken from the match flags,
    /// which mirror the match set.
    fn accumulate_parallel(&mut self, pop: &mut Population, params: &Params, x: &[f64]) {
        let y_dim = self.y_dim;
        let n_actions = self.nr.len();
        let chunk = pop.members.len().div_ceil(params.n_threads);
        let partials: Vec<(Vec<f64>, Vec<f64>)> = thread::scope(|s| {
            let handles: Vec<_> = pop
                .members
                .chunks_mut(chunk)
                .map(|members| {
                    s.spawn(move || {
                        let mut pa = vec![0.0; n_actions * y_dim];
                        let mut nr = vec![0.0; n_actions];
                        for c in members.iter_mut().filter(|c| c.m && c.num > 0) {
                            let action = c.action.compute(x);
                            c.current_action = action;
                            let pred = c.prediction.compute(x);
                            for (v, p) in pred.iter().enumerate() {
                                pa[action * y_dim + v] += p * c.fit;
                            }
                            nr[action] += c.fit;
                        }
                        (pa, nr)
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        for (pa, nr) in partials {
            for (acc, v) in self.pa.iter_mut().zip(&pa) {
                *acc += v;
            }
            for (acc, v) in self.nr.iter_mut().zip(&nr) {
                *acc += v;
            }
        }
    }

    fn normalize(&mut self) {
        for a in 0..self.nr.len() {
            if self.nr[a] > 0.0 {
                for v in 0..self.y_dim {
                    self.pa[a * self.y_dim + v] /= self.nr[a];
                }
            }
        }
        self.best_action = 0;
        self.best_payoff = f64::NEG_INFINITY;
        for a in 0..self.nr.len() {
            if self.nr[a] <= 0.0 {
                continue;
            }
            let payoff = self.mean_payoff(a);
            if self.nr[self.best_action] <= 0.0 || payoff > self.best_payoff {
                self.best_action = a;
                self.best_payoff = payoff;
            }
        }
        if self.best_payoff == f64::NEG_INFINITY {
            self.best_payoff = 0.0;
        }
    }

    fn mean_payoff(&self, action: usize) -> f64 {
        self.pa[action * self.y_dim..(action + 1) * self.y_dim]
            .iter()
            .sum::<f64>()
            / self.y_dim as f64
    }

    /// The action with the highest mean payoff.
    #[must_use]
    pub fn best_action(&self) -> usize {
        self.best_action
    }

    /// Mean payoff of the best action.
    #[must_use]
    pub fn best_payoff(&self) -> f64 {
        self.best_payoff
    }

    /// Mean payoff advertised for an action, if any member advocates it.
    #[must_use]
    pub fn payoff(&self, action: usize) -> Option<f64> {
        (self.nr[action] > 0.0).then(|| self.mean_payoff(action))
    }

    /// A uniformly random action among those advocated in the array.
    pub fn random_action<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        let present: Vec<usize> = (0..self.nr.len()).filter(|&a| self.nr[a] > 0.0).collect();
        if present.is_empty() {
            return 0;
        }
        present[rng.random_range(0..present.len())]
    }

    /// The aggregated prediction vector in supervised mode, where the
    /// single action slot is simply the predicted output.
    #[must_use]
    pub fn vector(&self) -> &[f64] {
        &self.pa[..self.y_dim]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use crate::classifier::Classifier;
    use crate::condition::Condition;
    use crate::params::PredictionKind;

    /// A classifier advocating `action` with a fixed constant prediction.
    fn fixed(params: &Params, action: usize, value: f64, fit: f64, rng: &mut Pcg64Mcg) -> Classifier {
        let mut c = Classifier::cover(params, &[0.5], action, 0, rng);
        c.condition = Condition::Dummy;
        c.fit = fit;
        // drive the constant model to the target value
        for exp in 1..=2 {
            c.prediction
                .update(params, &[0.5], &[value], exp, rng);
        }
        c.m = true;
        c
    }

    fn match_all(pop: &Population) -> Set {
        let mut set = Set::new();
        for i in 0..pop.members.len() {
            set.add(i);
        }
        set
    }

    fn rl_params(n_actions: usize) -> Params {
        let mut params = Params::new(1, 1, n_actions);
        params.prediction = PredictionKind::Constant;
        params
    }

    #[test]
    fn aggregation_is_fitness_weighted() {
        let mut rng = Pcg64Mcg::seed_from_u64(130);
        let params = rl_params(1);
        let mut pop = Population::new();
        pop.insert(fixed(&params, 0, 1.0, 3.0, &mut rng));
        pop.insert(fixed(&params, 0, 0.0, 1.0, &mut rng));
        let mset = match_all(&pop);
        let mut pa = PredictionArray::new(&params);
        pa.build(&mut pop, &mset, &params, &[0.5]);
        // (1.0 * 3 + 0.0 * 1) / (3 + 1)
        assert!((pa.vector()[0] - 0.75).abs() < 1e-12);
    }

    #[test]
    fn best_action_is_argmax_of_mean_payoff() {
        let mut rng = Pcg64Mcg::seed_from_u64(131);
        let params = rl_params(3);
        let mut pop = Population::new();
        pop.insert(fixed(&params, 0, 0.2, 1.0, &mut rng));
        pop.insert(fixed(&params, 2, 0.9, 1.0, &mut rng));
        let mset = match_all(&pop);
        let mut pa = PredictionArray::new(&params);
        pa.build(&mut pop, &mset, &params, &[0.5]);
        assert_eq!(pa.best_action(), 2);
        assert!((pa.best_payoff() - 0.9).abs() < 1e-12);
        // action 1 has no advocates
        assert!(pa.payoff(1).is_none());
        assert!(pa.payoff(0).is_some());
    }

    #[test]
    fn random_action_only_picks_present_actions() {
        let mut rng = Pcg64Mcg::seed_from_u64(132);
        let params = rl_params(4);
        let mut pop = Population::new();
        pop.insert(fixed(&params, 1, 0.5, 1.0, &mut rng));
        pop.insert(fixed(&params, 3, 0.5, 1.0, &mut rng));
        let mset = match_all(&pop);
        let mut pa = PredictionArray::new(&params);
        pa.build(&mut pop, &mset, &params, &[0.5]);
        for _ in 0..50 {
            let a = pa.random_action(&mut rng);
            assert!(a == 1 || a == 3);
        }
    }

    #[test]
    fn parallel_build_matches_sequential() {
        let mut rng = Pcg64Mcg::seed_from_u64(133);
        let mut params = rl_params(2);
        let mut pop = Population::new();
        for i in 0..40 {
            let value = f64::from(i) / 40.0;
            pop.insert(fixed(&params, (i % 2) as usize, value, 1.0 + value, &mut rng));
        }
        let mset = match_all(&pop);
        let mut sequential = PredictionArray::new(&params);
        sequential.build(&mut pop, &mset, &params, &[0.5]);
        let expected: Vec<f64> = sequential.vector().to_vec();
        let expected_best = sequential.best_action();

        params.n_threads = 4;
        let mut parallel = PredictionArray::new(&params);
        parallel.build(&mut pop, &mset, &params, &[0.5]);
        for (a, b) in parallel.vector().iter().zip(&expected) {
            assert!((a - b).abs() < 1e-9);
        }
        assert_eq!(parallel.best_action(), expected_best);
    }
}
