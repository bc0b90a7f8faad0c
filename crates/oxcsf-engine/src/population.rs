//! The population: a capped multiset of macro-classifiers.
//!
//! Sets hold indices into `members`, so classifiers whose numerosity drops
//! to zero stay in place until the end-of-trial kill sweep; only the sweep
//! compacts the vector, after every set has been cleared.

use std::thread;

use rand::Rng;

use crate::classifier::Classifier;
use crate::params::Params;
use crate::set::Set;

#[derive(Debug, Default)]
pub struct Population {
    pub(crate) members: Vec<Classifier>,
}

impl Population {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total numerosity over all live macro-classifiers.
    #[must_use]
    pub fn total_num(&self) -> u32 {
        self.members.iter().map(|c| c.num).sum()
    }

    /// Number of live macro-classifiers.
    #[must_use]
    pub fn num_macros(&self) -> usize {
        self.members.iter().filter(|c| c.num > 0).count()
    }

    /// Mean fitness per micro-classifier.
    #[must_use]
    pub fn mean_fitness(&self) -> f64 {
        let num = self.total_num();
        if num == 0 {
            return 0.0;
        }
        self.members.iter().map(|c| c.fit).sum::<f64>() / f64::from(num)
    }

    /// Live classifiers, for inspection and printing.
    pub fn classifiers(&self) -> impl Iterator<Item = &Classifier> {
        self.members.iter().filter(|c| c.num > 0)
    }

    pub(crate) fn insert(&mut self, classifier: Classifier) -> usize {
        self.members.push(classifier);
        self.members.len() - 1
    }

    /// Index of a live classifier structurally identical to the candidate,
    /// if any. Used to merge duplicates by numerosity instead of inserting.
    pub(crate) fn find_identical(&self, candidate: &Classifier) -> Option<usize> {
        self.members.iter().position(|c| {
            c.num > 0
                && c.action.same(&candidate.action)
                && c.condition.identical(&candidate.condition)
        })
    }

    /// Sets the transient match flag on every member. With more than one
    /// worker configured the scan fans out over disjoint chunks; the flags
    /// are independent, so the result is identical to the sequential scan.
    pub(crate) fn scan_matches(&mut self, params: &Params, x: &[f64]) {
        if params.n_threads > 1 && self.members.len() >= params.n_threads {
            let chunk = self.members.len().div_ceil(params.n_threads);
            thread::scope(|s| {
                for members in self.members.chunks_mut(chunk) {
                    s.spawn(move || {
                        for c in members {
                            c.matches(x);
                        }
                    });
                }
            });
        } else {
            for c in &mut self.members {
                c.matches(x);
            }
        }
    }

    /// Deletes single numerosity units by roulette over the deletion vote
    /// until the population fits the cap again. Rules whose numerosity
    /// reaches zero are recorded in the kill set.
    pub(crate) fn enforce_cap<R: Rng + ?Sized>(
        &mut self,
        params: &Params,
        rng: &mut R,
        kset: &mut Set,
    ) {
        while self.total_num() > params.pop_size {
            self.delete_one(params, rng, kset);
        }
        debug_assert!(self.total_num() <= params.pop_size);
    }

    fn delete_one<R: Rng + ?Sized>(&mut self, params: &Params, rng: &mut R, kset: &mut Set) {
        let mean_fit = self.mean_fitness();
        let votes: Vec<f64> = self
            .members
            .iter()
            .map(|c| {
                if c.num == 0 {
                    return 0.0;
                }
                deletion_vote(c, params, mean_fit)
            })
            .collect();
        let total: f64 = votes.iter().sum();
        if total <= 0.0 {
            return;
        }
        let mut ball = rng.random_range(0.0..total);
        let mut chosen = None;
        for (i, vote) in votes.iter().enumerate() {
            if *vote <= 0.0 {
                continue;
            }
            chosen = Some(i);
            ball -= vote;
            if ball <= 0.0 {
                break;
            }
        }
        // rounding in the cumulative walk can leave the ball fractionally
        // positive; fall back to the last weighted candidate
        if let Some(i) = chosen {
            let c = &mut self.members[i];
            c.num -= 1;
            if c.num == 0 {
                kset.add(i);
            }
        }
    }

    /// Frees every rule recorded in the kill set. Callers must have cleared
    /// all other sets first: compaction invalidates indices.
    pub(crate) fn kill_sweep(&mut self, kset: &mut Set) {
        if !kset.is_empty() {
            self.members.retain(|c| c.num > 0);
        }
        kset.clear();
    }
}

/// Roulette weight biasing removal toward large, low-fitness rules.
fn deletion_vote(c: &Classifier, params: &Params, mean_fit: f64) -> f64 {
    let base = c.size * f64::from(c.num);
    let micro_fit = c.micro_fitness();
    if c.exp > params.theta_del && micro_fit < params.delta * mean_fit {
        base * mean_fit / micro_fit
    } else {
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    fn seed_population(params: &Params, n: usize, rng: &mut Pcg64Mcg) -> Population {
        let mut pop = Population::new();
        for i in 0..n {
            let x = [f64::from(i as u32) / n as f64];
            pop.insert(Classifier::cover(params, &x, 0, 0, rng));
        }
        pop
    }

    #[test]
    fn cap_is_enforced_to_the_unit() {
        let mut rng = Pcg64Mcg::seed_from_u64(110);
        let mut params = Params::new(1, 1, 1);
        params.pop_size = 10;
        let mut pop = seed_population(&params, 25, &mut rng);
        let mut kset = Set::new();
        pop.enforce_cap(&params, &mut rng, &mut kset);
        assert_eq!(pop.total_num(), 10);
        // every deleted rule had numerosity one, so all are in the kill set
        assert_eq!(kset.len(), 15);
    }

    #[test]
    fn pop_size_one_never_exceeds_cap() {
        let mut rng = Pcg64Mcg::seed_from_u64(111);
        let mut params = Params::new(1, 1, 1);
        params.pop_size = 1;
        let mut pop = Population::new();
        let mut kset = Set::new();
        for _ in 0..5 {
            pop.insert(Classifier::cover(&params, &[0.5], 0, 0, &mut rng));
            pop.enforce_cap(&params, &mut rng, &mut kset);
            assert_eq!(pop.total_num(), 1);
        }
        pop.kill_sweep(&mut kset);
        assert_eq!(pop.members.len(), 1);
    }

    #[test]
    fn deletion_vote_biases_low_fitness() {
        let params = Params::new(1, 1, 1);
        let mut rng = Pcg64Mcg::seed_from_u64(112);
        let mut weak = Classifier::cover(&params, &[0.5], 0, 0, &mut rng);
        weak.size = 1.0;
        weak.exp = params.theta_del + 1;
        weak.fit = 0.001;
        let mut strong = weak.clone();
        strong.fit = 1.0;
        let mean_fit = 0.5;
        assert!(
            deletion_vote(&weak, &params, mean_fit) > deletion_vote(&strong, &params, mean_fit)
        );
    }

    #[test]
    fn kill_sweep_removes_only_dead_rules() {
        let mut rng = Pcg64Mcg::seed_from_u64(113);
        let params = Params::new(1, 1, 1);
        let mut pop = seed_population(&params, 4, &mut rng);
        let mut kset = Set::new();
        pop.members[1].num = 0;
        kset.add(1);
        pop.kill_sweep(&mut kset);
        assert_eq!(pop.members.len(), 3);
        assert!(pop.members.iter().all(|c| c.num > 0));
        assert!(kset.is_empty());
    }

    #[test]
    fn parallel_and_sequential_match_scans_agree() {
        let mut rng = Pcg64Mcg::seed_from_u64(114);
        let mut params = Params::new(1, 1, 1);
        let mut pop = seed_population(&params, 64, &mut rng);
        let x = [0.37];
        pop.scan_matches(&params, &x);
        let sequential: Vec<bool> = pop.members.iter().map(|c| c.m).collect();
        params.n_threads = 4;
        pop.scan_matches(&params, &x);
        let parallel: Vec<bool> = pop.members.iter().map(|c| c.m).collect();
        assert_eq!(sequential, parallel);
    }
}
