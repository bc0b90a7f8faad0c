//! Reinforcement trial orchestration.
//!
//! Two surfaces are provided: a whole-run `fit` driver over an
//! [`Environment`], alternating explore and exploit trials, and the
//! incremental `step`/`update_reward` pair for callers that own the
//! environment loop.

use rand::{Rng, RngCore};

use crate::ea;
use crate::engine::Xcsf;
use crate::error::{Error, Result};
use crate::perf::{self, PerfTracker};
use crate::set;

/// A problem environment driving reinforcement trials.
///
/// Implementations live outside the engine; the multiplexer, maze and CSV
/// environments ship in the companion environments crate.
pub trait Environment {
    /// Input dimensionality of the state vector.
    fn x_dim(&self) -> usize;
    /// Number of discrete actions.
    fn n_actions(&self) -> usize;
    /// Whether trials span multiple steps.
    fn multistep(&self) -> bool;
    /// The maximum payoff obtainable in one step.
    fn max_payoff(&self) -> f64;
    /// Begins a new trial.
    fn reset(&mut self, rng: &mut dyn RngCore);
    /// The current state.
    fn state(&self) -> &[f64];
    /// Applies an action and returns the payoff.
    fn execute(&mut self, action: usize, rng: &mut dyn RngCore) -> f64;
    /// Whether the trial has ended.
    fn is_done(&self) -> bool;
}

/// Outcome of one trial, for performance tracking.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TrialResult {
    /// Steps taken before the trial ended.
    pub steps: u32,
    /// Mean absolute payoff prediction error, normalised by the
    /// environment's payoff range.
    pub error: f64,
}

/// Executes `max_trials` alternating explore/exploit trials and returns the
/// mean exploit performance: steps to goal for multistep environments,
/// payoff error for single-step ones.
pub(crate) fn fit(xcsf: &mut Xcsf, env: &mut dyn Environment, verbose: bool) -> Result<f64> {
    check_env(xcsf, env)?;
    let max_trials = xcsf.params.max_trials;
    let mut perf = PerfTracker::new(xcsf.params.perf_trials);
    let mut total = 0.0;
    for cnt in 0..max_trials {
        xcsf.params.explore = true;
        rl_trial(xcsf, env);
        xcsf.params.explore = false;
        let result = rl_trial(xcsf, env);
        let measure = if env.multistep() {
            f64::from(result.steps)
        } else {
            result.error
        };
        total += measure;
        if let Some(summary) = perf.record(cnt + 1, measure, None) {
            if verbose {
                perf::print_summary(&summary, xcsf.pop.num_macros(), xcsf.pop.total_num());
            }
        }
    }
    Ok(total / f64::from(max_trials))
}

/// One full trial: up to `teletransportation` steps in a multistep
/// environment, exactly one otherwise.
pub(crate) fn rl_trial(xcsf: &mut Xcsf, env: &mut dyn Environment) -> TrialResult {
    env.reset(&mut xcsf.rng);
    if xcsf.params.explore {
        xcsf.time += 1;
    }
    let mut steps = 0;
    let mut error = 0.0;
    let step_cap = if env.multistep() {
        xcsf.params.teletransportation
    } else {
        1
    };
    for _ in 0..step_cap {
        let (payoff_err, done) = rl_step(xcsf, env);
        steps += 1;
        error += payoff_err;
        if done {
            break;
        }
    }
    TrialResult {
        steps,
        error: error / f64::from(steps),
    }
}

/// One environment step following the trial sequence: match, aggregate,
/// act, observe, look ahead, update, evolve, sweep.
fn rl_step(xcsf: &mut Xcsf, env: &mut dyn Environment) -> (f64, bool) {
    let x = env.state().to_vec();
    xcsf.mset.clear();
    xcsf.aset.clear();
    xcsf.kset.clear();
    set::build_match_set(
        &mut xcsf.pop,
        &xcsf.params,
        &x,
        xcsf.time,
        &mut xcsf.mset,
        &mut xcsf.kset,
        &mut xcsf.rng,
    );
    xcsf.pa.build(&mut xcsf.pop, &xcsf.mset, &xcsf.params, &x);
    let explore_action =
        xcsf.params.explore && xcsf.rng.random_bool(xcsf.params.p_explore);
    let action = if explore_action {
        xcsf.pa.random_action(&mut xcsf.rng)
    } else {
        xcsf.pa.best_action()
    };
    let predicted = xcsf.pa.payoff(action).unwrap_or(0.0);
    set::build_action_set(&xcsf.pop, &xcsf.mset, action, &mut xcsf.aset);

    let reward = env.execute(action, &mut xcsf.rng);
    let done = env.is_done() || !env.multistep();

    // Q-style payoff: the immediate reward plus the discounted best
    // prediction for the successor state
    let payoff = if done {
        reward
    } else {
        let next = env.state().to_vec();
        xcsf.mset.clear();
        set::build_match_set(
            &mut xcsf.pop,
            &xcsf.params,
            &next,
            xcsf.time,
            &mut xcsf.mset,
            &mut xcsf.kset,
            &mut xcsf.rng,
        );
        // covering in the successor match may have deleted acting-set rules
        xcsf.aset.validate(&xcsf.pop, &mut xcsf.kset);
        xcsf.pa.build(&mut xcsf.pop, &xcsf.mset, &xcsf.params, &next);
        reward + xcsf.params.gamma * xcsf.pa.best_payoff()
    };

    if xcsf.params.explore && !xcsf.aset.is_empty() {
        set::update_set(
            &mut xcsf.pop,
            &xcsf.params,
            &mut xcsf.aset,
            &x,
            &[payoff],
            false,
            &mut xcsf.kset,
            &mut xcsf.rng,
        );
        ea::run(
            &mut xcsf.pop,
            &xcsf.params,
            &xcsf.aset,
            xcsf.time,
            &mut xcsf.kset,
            &mut xcsf.rng,
        );
    }
    xcsf.aset.clear();
    xcsf.mset.clear();
    xcsf.pop.kill_sweep(&mut xcsf.kset);

    let error = (payoff - predicted).abs() / env.max_payoff().max(f64::MIN_POSITIVE);
    (error, done)
}

/// Incremental interface: selects an action for `state` and retains the
/// acting set until the matching [`Xcsf::update_reward`] call.
pub(crate) fn step(xcsf: &mut Xcsf, state: &[f64]) -> Result<usize> {
    if state.len() != xcsf.params.x_dim {
        return Err(Error::Dimension {
            expected: xcsf.params.x_dim,
            actual: state.len(),
        });
    }
    if xcsf.rl.pending {
        // the successor state has arrived: close out the previous step
        finish_pending(xcsf, Some(state));
    }
    xcsf.mset.clear();
    xcsf.kset.clear();
    if xcsf.params.explore {
        xcsf.time += 1;
    }
    set::build_match_set(
        &mut xcsf.pop,
        &xcsf.params,
        state,
        xcsf.time,
        &mut xcsf.mset,
        &mut xcsf.kset,
        &mut xcsf.rng,
    );
    xcsf.pa.build(&mut xcsf.pop, &xcsf.mset, &xcsf.params, state);
    let explore_action =
        xcsf.params.explore && xcsf.rng.random_bool(xcsf.params.p_explore);
    let action = if explore_action {
        xcsf.pa.random_action(&mut xcsf.rng)
    } else {
        xcsf.pa.best_action()
    };
    set::build_action_set(&xcsf.pop, &xcsf.mset, action, &mut xcsf.aset);
    xcsf.rl.state = state.to_vec();
    xcsf.rl.explore_step = xcsf.params.explore;
    xcsf.mset.clear();
    Ok(action)
}

/// Records the payoff for the most recent `step`. A terminal reward closes
/// the trial immediately; otherwise the update completes on the next
/// `step`, when the successor state is known.
pub(crate) fn update_reward(xcsf: &mut Xcsf, reward: f64, done: bool) -> Result<()> {
    if xcsf.aset.is_empty() && !xcsf.rl.pending {
        return Err(Error::config("update_reward called before step"));
    }
    xcsf.rl.reward = reward;
    if done {
        xcsf.rl.pending = true;
        finish_pending(xcsf, None);
    } else {
        xcsf.rl.pending = true;
    }
    Ok(())
}

/// Completes the deferred action-set update. With a successor state the
/// payoff is the stored reward plus the discounted best prediction for it;
/// without one, the stored reward alone.
fn finish_pending(xcsf: &mut Xcsf, next_state: Option<&[f64]>) {
    let payoff = match next_state {
        Some(next) => {
            xcsf.mset.clear();
            set::build_match_set(
                &mut xcsf.pop,
                &xcsf.params,
                next,
                xcsf.time,
                &mut xcsf.mset,
                &mut xcsf.kset,
                &mut xcsf.rng,
            );
            xcsf.aset.validate(&xcsf.pop, &mut xcsf.kset);
            xcsf.pa.build(&mut xcsf.pop, &xcsf.mset, &xcsf.params, next);
            xcsf.rl.reward + xcsf.params.gamma * xcsf.pa.best_payoff()
        }
        None => xcsf.rl.reward,
    };
    let x = std::mem::take(&mut xcsf.rl.state);
    xcsf.aset.validate(&xcsf.pop, &mut xcsf.kset);
    if xcsf.rl.explore_step && !xcsf.aset.is_empty() {
        set::update_set(
            &mut xcsf.pop,
            &xcsf.params,
            &mut xcsf.aset,
            &x,
            &[payoff],
            false,
            &mut xcsf.kset,
            &mut xcsf.rng,
        );
        ea::run(
            &mut xcsf.pop,
            &xcsf.params,
            &xcsf.aset,
            xcsf.time,
            &mut xcsf.kset,
            &mut xcsf.rng,
        );
    }
    xcsf.aset.clear();
    xcsf.mset.clear();
    xcsf.pop.kill_sweep(&mut xcsf.kset);
    xcsf.rl.pending = false;
}

fn check_env(xcsf: &Xcsf, env: &dyn Environment) -> Result<()> {
    if env.x_dim() != xcsf.params.x_dim {
        return Err(Error::Dimension {
            expected: xcsf.params.x_dim,
            actual: env.x_dim(),
        });
    }
    if env.n_actions() != xcsf.params.n_actions {
        return Err(Error::config(format!(
            "environment has {} actions, parameters expect {}",
            env.n_actions(),
            xcsf.params.n_actions
        )));
    }
    if xcsf.params.y_dim != 1 {
        return Err(Error::config(
            "reinforcement learning requires y_dim = 1 (scalar payoff)",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng as _;
    use rand_pcg::Pcg64Mcg;

    use crate::params::{Params, PredictionKind};

    /// A one-step environment rewarding action == (state > 0.5).
    struct Threshold {
        state: [f64; 1],
        done: bool,
    }

    impl Environment for Threshold {
        fn x_dim(&self) -> usize {
            1
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
            self.state = [if rng.random_bool(0.5) { 0.9 } else { 0.1 }];
            self.done = false;
        }
        fn state(&self) -> &[f64] {
            &self.state
        }
        fn execute(&mut self, action: usize, _rng: &mut dyn RngCore) -> f64 {
            self.done = true;
            let wanted = usize::from(self.state[0] > 0.5);
            if action == wanted { 1.0 } else { 0.0 }
        }
        fn is_done(&self) -> bool {
            self.done
        }
    }

    fn rl_params() -> Params {
        let mut params = Params::new(1, 1, 2);
        params.pop_size = 200;
        params.max_trials = 1500;
        params.perf_trials = 10_000;
        params.prediction = PredictionKind::Nlms;
        params.eps_0 = 0.05;
        params.gamma = 0.0;
        params.seed = 7;
        params
    }

    #[test]
    fn learns_a_one_step_threshold_task() {
        let mut xcsf = Xcsf::new(rl_params()).unwrap();
        let mut env = Threshold {
            state: [0.1],
            done: false,
        };
        xcsf.fit_env(&mut env, false).unwrap();
        // exploit both states and expect the rewarded action
        let mut rng = Pcg64Mcg::seed_from_u64(1);
        xcsf.params.explore = false;
        let mut correct = 0;
        for _ in 0..100 {
            env.reset(&mut rng);
            let wanted = usize::from(env.state()[0] > 0.5);
            let action = xcsf.step(env.state().to_vec().as_slice()).unwrap();
            let reward = env.execute(action, &mut rng);
            xcsf.update_reward(reward, true).unwrap();
            if action == wanted {
                correct += 1;
            }
        }
        assert!(correct >= 90, "exploit accuracy {correct}/100");
    }

    #[test]
    fn step_rejects_wrong_state_width() {
        let mut xcsf = Xcsf::new(rl_params()).unwrap();
        assert!(matches!(
            xcsf.step(&[0.1, 0.2]),
            Err(Error::Dimension { .. })
        ));
    }

    #[test]
    fn environment_shape_is_checked() {
        let mut params = rl_params();
        params.n_actions = 3;
        let mut xcsf = Xcsf::new(params).unwrap();
        let mut env = Threshold {
            state: [0.1],
            done: false,
        };
        assert!(xcsf.fit_env(&mut env, false).is_err());
    }

    #[test]
    fn trials_leave_no_dead_rules_behind() {
        let mut params = rl_params();
        params.max_trials = 50;
        params.pop_size = 20;
        let mut xcsf = Xcsf::new(params).unwrap();
        let mut env = Threshold {
            state: [0.1],
            done: false,
        };
        xcsf.fit_env(&mut env, false).unwrap();
        assert!(xcsf.population().total_num() <= 20);
        assert!(xcsf.population().classifiers().all(|c| c.num > 0));
    }
}
