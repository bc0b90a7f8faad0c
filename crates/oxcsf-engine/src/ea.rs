//! The steady-state evolutionary algorithm.
//!
//! Runs on an action set (or the match set in supervised mode) when the
//! average time since the set's last EA event exceeds `theta_ea`. Two
//! parents breed `lambda` offspring through crossover and mutation;
//! offspring are subsumed by their parents, merged into duplicates, or
//! inserted, and the population cap is enforced after each insertion.

use rand::Rng;

use crate::classifier::Classifier;
use crate::params::{EaSelectKind, Params};
use crate::population::Population;
use crate::set::Set;

/// Runs one EA invocation on the set if its trigger condition holds.
pub(crate) fn run<R: Rng + ?Sized>(
    pop: &mut Population,
    params: &Params,
    set: &Set,
    time: u32,
    kset: &mut Set,
    rng: &mut R,
) {
    if set.is_empty() || !should_run(pop, params, set, time) {
        return;
    }
    for &i in set.indices() {
        pop.members[i].time = time;
    }
    let mut created = 0;
    while created < params.lambda {
        // inserting an offspring can delete set members, so each round
        // re-selects among the still-live ones
        let Some(p1) = select_parent(pop, params, set, rng) else {
            return;
        };
        let Some(p2) = select_parent(pop, params, set, rng) else {
            return;
        };
        let mean_err = 0.5 * (pop.members[p1].err + pop.members[p2].err);
        let mean_fit =
            0.5 * (pop.members[p1].micro_fitness() + pop.members[p2].micro_fitness());
        let mut o1 = offspring_of(&pop.members[p1], time);
        let mut o2 = offspring_of(&pop.members[p2], time);

        if rng.random_bool(params.p_crossover) {
            o1.condition.crossover(&mut o2.condition, rng);
            o1.prediction.crossover(&mut o2.prediction, rng);
            o1.action.crossover(&mut o2.action, rng);
        }

        for mut o in [o1, o2] {
            if created >= params.lambda {
                break;
            }
            created += 1;
            let mutated = o.condition.mutate(params, rng)
                | o.action.mutate(params, rng)
                | o.prediction.mutate(params, rng);
            if mutated {
                // a changed rule cannot trade on its parent's record
                o.err = 0.1 * mean_err;
                o.fit = 0.1 * mean_fit;
            }
            insert_offspring(pop, params, o, p1, p2, kset, rng);
        }
    }
}

/// The average-time trigger: the numerosity-weighted mean of the set's
/// last EA timestamps must lag the clock by more than `theta_ea`.
fn should_run(pop: &Population, params: &Params, set: &Set, time: u32) -> bool {
    let num = set.total_num(pop);
    if num == 0 {
        return false;
    }
    let weighted: f64 = set
        .indices()
        .iter()
        .map(|&i| f64::from(pop.members[i].time) * f64::from(pop.members[i].num))
        .sum();
    f64::from(time) - weighted / f64::from(num) > params.theta_ea
}

/// Selects a live parent, or nothing if deletion emptied the set.
fn select_parent<R: Rng + ?Sized>(
    pop: &Population,
    params: &Params,
    set: &Set,
    rng: &mut R,
) -> Option<usize> {
    let live: Vec<usize> = set
        .indices()
        .iter()
        .copied()
        .filter(|&i| pop.members[i].num > 0)
        .collect();
    if live.is_empty() {
        return None;
    }
    let chosen = match params.ea_select_kind {
        EaSelectKind::Roulette => select_roulette(pop, &live, rng),
        EaSelectKind::Tournament => select_tournament(pop, params, &live, rng),
    };
    Some(chosen)
}

/// Roulette selection with probability proportional to fitness.
fn select_roulette<R: Rng + ?Sized>(pop: &Population, live: &[usize], rng: &mut R) -> usize {
    let total: f64 = live.iter().map(|&i| pop.members[i].fit).sum();
    let mut ball = rng.random_range(0.0..total);
    let mut chosen = live[0];
    for &i in live {
        chosen = i;
        ball -= pop.members[i].fit;
        if ball <= 0.0 {
            break;
        }
    }
    chosen
}

/// Tournament selection: `ceil(ea_select_size * |S|)` entrants (at least
/// one) sampled with replacement; the fittest wins.
fn select_tournament<R: Rng + ?Sized>(
    pop: &Population,
    params: &Params,
    live: &[usize],
    rng: &mut R,
) -> usize {
    let entrants = ((params.ea_select_size * live.len() as f64).ceil() as usize).max(1);
    let mut best = live[rng.random_range(0..live.len())];
    for _ in 1..entrants {
        let i = live[rng.random_range(0..live.len())];
        if pop.members[i].fit > pop.members[best].fit {
            best = i;
        }
    }
    best
}

/// A fresh copy of the parent with unit numerosity and no experience.
fn offspring_of(parent: &Classifier, time: u32) -> Classifier {
    let mut o = parent.clone();
    o.num = 1;
    o.exp = 0;
    o.fit = parent.micro_fitness();
    o.time = time;
    o.age = time;
    o
}

/// GA subsumption, duplicate merge, or plain insertion; the cap is
/// enforced afterwards in every case.
fn insert_offspring<R: Rng + ?Sized>(
    pop: &mut Population,
    params: &Params,
    offspring: Classifier,
    p1: usize,
    p2: usize,
    kset: &mut Set,
    rng: &mut R,
) {
    let live_subsumer = |pop: &Population, p: usize| {
        pop.members[p].num > 0 && pop.members[p].subsumes(params, &offspring)
    };
    if params.do_ga_subsumption && live_subsumer(pop, p1) {
        pop.members[p1].num += 1;
    } else if params.do_ga_subsumption && live_subsumer(pop, p2) {
        pop.members[p2].num += 1;
    } else if let Some(twin) = pop.find_identical(&offspring) {
        pop.members[twin].num += 1;
    } else {
        pop.insert(offspring);
    }
    pop.enforce_cap(params, rng, kset);
}
