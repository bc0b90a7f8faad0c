//! Set algebra over the population: match set, action set and kill set.
//!
//! Sets are ordered index sequences into the population vector. They never
//! own classifiers; the population compacts itself only in the kill sweep,
//! after every set has been cleared.

use rand::Rng;

use crate::classifier::Classifier;
use crate::params::Params;
use crate::population::Population;

/// An ordered sequence of references (indices) into the population.
#[derive(Debug, Default, Clone)]
pub struct Set {
    members: Vec<usize>,
}

impl Set {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count of macro-classifiers in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.members.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub(crate) fn add(&mut self, index: usize) {
        if !self.members.contains(&index) {
            self.members.push(index);
        }
    }

    pub fn clear(&mut self) {
        self.members.clear();
    }

    pub(crate) fn indices(&self) -> &[usize] {
        &self.members
    }

    /// Sum of member numerosities.
    #[must_use]
    pub fn total_num(&self, pop: &Population) -> u32 {
        self.members.iter().map(|&i| pop.members[i].num).sum()
    }

    /// Drops members whose numerosity reached zero, recording them in the
    /// kill set. No set may reference a rule the sweep will free.
    pub(crate) fn validate(&mut self, pop: &Population, kset: &mut Set) {
        let mut live = Vec::with_capacity(self.members.len());
        for &i in &self.members {
            if pop.members[i].num > 0 {
                live.push(i);
            } else {
                kset.add(i);
            }
        }
        self.members = live;
    }
}

/// Populates the match set with every classifier matching `x`, covering
/// until all actions are represented.
///
/// Covering inserts directly into the population and enforces the cap after
/// each insertion, so a cover step can delete other matching rules; the
/// match set is re-validated after every insertion.
pub(crate) fn build_match_set<R: Rng + ?Sized>(
    pop: &mut Population,
    params: &Params,
    x: &[f64],
    time: u32,
    mset: &mut Set,
    kset: &mut Set,
    rng: &mut R,
) {
    mset.clear();
    pop.scan_matches(params, x);
    for (i, c) in pop.members.iter_mut().enumerate() {
        if c.m && c.num > 0 {
            c.current_action = c.action.compute(x);
            mset.members.push(i);
        }
    }
    loop {
        let mut present = vec![false; params.n_actions];
        for &i in &mset.members {
            present[pop.members[i].current_action] = true;
        }
        let Some(missing) = present.iter().position(|p| !p) else {
            break;
        };
        let covered = Classifier::cover(params, x, missing, time, rng);
        let index = pop.insert(covered);
        pop.members[index].current_action = pop.members[index].action.compute(x);
        mset.members.push(index);
        pop.enforce_cap(params, rng, kset);
        mset.validate(pop, kset);
    }
}

/// Filters the match set into the action set for the chosen action.
pub(crate) fn build_action_set(pop: &Population, mset: &Set, action: usize, aset: &mut Set) {
    aset.clear();
    for &i in &mset.members {
        if pop.members[i].current_action == action {
            aset.members.push(i);
        }
    }
}

/// Updates every member of the set against the target, then redistributes
/// fitness by relative accuracy. Runs set subsumption when enabled.
pub(crate) fn update_set<R: Rng>(
    pop: &mut Population,
    params: &Params,
    set: &mut Set,
    x: &[f64],
    y: &[f64],
    cur: bool,
    kset: &mut Set,
    rng: &mut R,
) {
    let set_num = set.total_num(pop);
    for &i in &set.members {
        pop.members[i].update(params, x, y, set_num, cur, rng);
    }
    let accuracies: Vec<f64> = set
        .members
        .iter()
        .map(|&i| pop.members[i].accuracy(params))
        .collect();
    let acc_sum: f64 = set
        .members
        .iter()
        .zip(&accuracies)
        .map(|(&i, acc)| acc * f64::from(pop.members[i].num))
        .sum();
    if acc_sum > 0.0 {
        for (&i, acc) in set.members.iter().zip(&accuracies) {
            pop.members[i].update_fitness(params, *acc, acc_sum);
        }
    }
    if params.do_set_subsumption {
        subsume_set(pop, params, set, kset);
    }
    set.validate(pop, kset);
}

/// Condenses the set around its most general qualified subsumer: every
/// member it subsumes is absorbed into its numerosity.
fn subsume_set(pop: &mut Population, params: &Params, set: &Set, kset: &mut Set) {
    let mut subsumer: Option<usize> = None;
    for &i in &set.members {
        let c = &pop.members[i];
        if c.num > 0 && c.could_subsume(params) {
            let more_general = subsumer.is_none_or(|s| {
                c.condition.general(&pop.members[s].condition)
            });
            if more_general {
                subsumer = Some(i);
            }
        }
    }
    let Some(s) = subsumer else {
        return;
    };
    for &i in &set.members {
        if i == s || pop.members[i].num == 0 {
            continue;
        }
        if pop.members[s].subsumes(params, &pop.members[i]) {
            let absorbed = pop.members[i].num;
            pop.members[i].num = 0;
            pop.members[s].num += absorbed;
            kset.add(i);
        }
    }
}
