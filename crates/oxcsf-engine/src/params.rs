//! Typed configuration for the classifier system.
//!
//! Every knob the engine consults lives in [`Params`]. The struct is plain
//! data: orchestrators and genetic operators receive it by shared reference
//! and the engine handle owns the single mutable copy (the `explore` flag is
//! toggled between trials).

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::loss::LossKind;

/// Condition representation used by newly created classifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::FromStr, Serialize, Deserialize,
)]
#[from_str(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ConditionKind {
    #[default]
    Hyperrectangle,
    Ellipsoid,
    Ternary,
    Neural,
    Dgp,
    Tree,
    Dummy,
}

/// Action representation used by newly created classifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::FromStr, Serialize, Deserialize,
)]
#[from_str(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum ActionKind {
    #[default]
    Integer,
    Neural,
}

/// Prediction model used by newly created classifiers.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::FromStr, Serialize, Deserialize,
)]
#[from_str(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum PredictionKind {
    Constant,
    #[default]
    Nlms,
    Rls,
    Neural,
}

/// Parent selection scheme for the evolutionary algorithm.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, derive_more::FromStr, Serialize, Deserialize,
)]
#[from_str(rename_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum EaSelectKind {
    #[default]
    Roulette,
    Tournament,
}

/// The full configuration bag.
///
/// Field names follow the conventional XCSF parameter vocabulary; defaults
/// are the standard single-step regression settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    /// Maximum total numerosity of the population.
    pub pop_size: u32,
    /// Number of training trials executed by `fit`.
    pub max_trials: u32,
    /// Width of the windowed performance report.
    pub perf_trials: u32,
    /// Loss function used for error estimates and scoring.
    pub loss: LossKind,

    /// Input dimensionality.
    pub x_dim: usize,
    /// Output dimensionality.
    pub y_dim: usize,
    /// Number of discrete actions (1 in supervised mode).
    pub n_actions: usize,

    /// Whether the current trial updates and evolves the population.
    pub explore: bool,
    /// Seed for the engine PRNG.
    pub seed: u64,
    /// Worker threads for the match scan and prediction-array build.
    /// 1 selects the deterministic sequential path.
    pub n_threads: usize,

    // --- evolutionary algorithm ---
    /// Average set age that must elapse between EA invocations.
    pub theta_ea: f64,
    /// Probability of crossing offspring components.
    pub p_crossover: f64,
    /// Offspring created per EA invocation.
    pub lambda: u32,
    /// Parent selection scheme.
    pub ea_select_kind: EaSelectKind,
    /// Tournament size as a fraction of the acting set.
    pub ea_select_size: f64,

    // --- fitness / accuracy ---
    /// Accuracy offset for classifiers with error above `eps_0`.
    pub alpha: f64,
    /// Accuracy curve exponent.
    pub nu: f64,
    /// Learning rate for error, fitness and set-size estimates.
    pub beta: f64,
    /// Target error under which a classifier is considered accurate.
    pub eps_0: f64,

    // --- subsumption ---
    /// Experience threshold for a subsumer.
    pub theta_sub: u32,
    /// Whether offspring may be subsumed by their parents.
    pub do_ga_subsumption: bool,
    /// Whether action sets condense around their most general subsumer.
    pub do_set_subsumption: bool,

    // --- deletion ---
    /// Experience threshold above which low fitness biases the deletion vote.
    pub theta_del: u32,
    /// Fraction of mean fitness below which the vote is inflated.
    pub delta: f64,

    // --- classifier initialisation ---
    /// Fitness assigned to covered classifiers.
    pub init_fitness: f64,
    /// Error assigned to covered classifiers.
    pub init_error: f64,

    // --- reinforcement learning ---
    /// Discount factor for the Q-style payoff.
    pub gamma: f64,
    /// Probability of exploring (random action) during an explore trial.
    pub p_explore: f64,
    /// Maximum steps in a multistep trial.
    pub teletransportation: u32,

    // --- component selectors ---
    pub condition: ConditionKind,
    pub action: ActionKind,
    pub prediction: PredictionKind,

    // --- condition knobs ---
    /// Lower bound of the input space.
    pub cond_min: f64,
    /// Upper bound of the input space.
    pub cond_max: f64,
    /// Minimum spread of covered intervals.
    pub cond_spread_min: f64,
    /// Probability of a `#` symbol when covering a ternary condition.
    pub cond_p_dont_care: f64,
    /// Bits encoding each input variable in a ternary condition.
    pub cond_bits: usize,
    /// Hidden neurons for neural conditions, actions and predictions.
    pub hidden_neurons: usize,
    /// Nodes in a DGP graph condition.
    pub dgp_num_nodes: usize,
    /// Synchronous update cycles for a DGP graph.
    pub dgp_max_t: usize,
    /// Maximum depth of a GP tree condition.
    pub tree_max_depth: usize,

    // --- genetic operator rates ---
    /// Per-allele mutation probability.
    pub p_mutation: f64,
    /// Standard deviation of Gaussian mutation, relative to the input range.
    pub s_mutation: f64,

    // --- prediction knobs ---
    /// Gradient-descent learning rate (NLMS and neural predictions).
    pub pred_eta: f64,
    /// Constant input term prepended to linear models.
    pub pred_x0: f64,
    /// Initial diagonal of the RLS inverse covariance matrix.
    pub pred_rls_scale_factor: f64,
    /// RLS forgetting factor.
    pub pred_rls_lambda: f64,
}

impl Default for Params {
    fn default() -> Self {
        Self {
            pop_size: 2000,
            max_trials: 100_000,
            perf_trials: 1000,
            loss: LossKind::default(),
            x_dim: 1,
            y_dim: 1,
            n_actions: 1,
            explore: false,
            seed: 0,
            n_threads: 1,
            theta_ea: 50.0,
            p_crossover: 0.8,
            lambda: 2,
            ea_select_kind: EaSelectKind::default(),
            ea_select_size: 0.4,
            alpha: 0.1,
            nu: 5.0,
            beta: 0.1,
            eps_0: 0.01,
            theta_sub: 100,
            do_ga_subsumption: false,
            do_set_subsumption: false,
            theta_del: 20,
            delta: 0.1,
            init_fitness: 0.01,
            init_error: 0.0,
            gamma: 0.95,
            p_explore: 0.9,
            teletransportation: 50,
            condition: ConditionKind::default(),
            action: ActionKind::default(),
            prediction: PredictionKind::default(),
            cond_min: 0.0,
            cond_max: 1.0,
            cond_spread_min: 0.1,
            cond_p_dont_care: 0.33,
            cond_bits: 1,
            hidden_neurons: 10,
            dgp_num_nodes: 20,
            dgp_max_t: 10,
            tree_max_depth: 5,
            p_mutation: 0.04,
            s_mutation: 0.1,
            pred_eta: 0.1,
            pred_x0: 1.0,
            pred_rls_scale_factor: 1000.0,
            pred_rls_lambda: 1.0,
        }
    }
}

impl Params {
    /// Default parameters for the given problem dimensions.
    #[must_use]
    pub fn new(x_dim: usize, y_dim: usize, n_actions: usize) -> Self {
        Self {
            x_dim,
            y_dim,
            n_actions,
            ..Self::default()
        }
    }

    /// Checks every contract an implementer must honor.
    ///
    /// Called by `Xcsf::new` and after loading a configuration file, so a
    /// bad parameter surfaces before any trial runs.
    pub fn validate(&self) -> Result<()> {
        fn unit(name: &str, v: f64) -> Result<()> {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::config(format!("{name} must be within [0, 1]: {v}")));
            }
            Ok(())
        }

        if self.pop_size == 0 {
            return Err(Error::config("POP_SIZE must be at least 1"));
        }
        if self.x_dim == 0 || self.y_dim == 0 || self.n_actions == 0 {
            return Err(Error::config("x_dim, y_dim and n_actions must be positive"));
        }
        // covering must be able to represent every action at once
        if (self.pop_size as usize) < self.n_actions {
            return Err(Error::config(format!(
                "POP_SIZE ({}) must be at least n_actions ({})",
                self.pop_size, self.n_actions
            )));
        }
        if self.beta <= 0.0 || self.beta > 1.0 {
            return Err(Error::config(format!(
                "BETA must be within (0, 1]: {}",
                self.beta
            )));
        }
        if self.eps_0 <= 0.0 {
            return Err(Error::config(format!(
                "EPS_0 must be positive: {}",
                self.eps_0
            )));
        }
        if self.alpha <= 0.0 || self.alpha > 1.0 {
            return Err(Error::config(format!(
                "ALPHA must be within (0, 1]: {}",
                self.alpha
            )));
        }
        if self.nu <= 0.0 {
            return Err(Error::config(format!("NU must be positive: {}", self.nu)));
        }
        if self.lambda == 0 {
            return Err(Error::config("LAMBDA must be at least 1"));
        }
        if self.ea_select_size <= 0.0 || self.ea_select_size > 1.0 {
            return Err(Error::config(format!(
                "EA_SELECT_SIZE must be within (0, 1]: {}",
                self.ea_select_size
            )));
        }
        unit("P_CROSSOVER", self.p_crossover)?;
        unit("DELTA", self.delta)?;
        unit("GAMMA", self.gamma)?;
        unit("P_EXPLORE", self.p_explore)?;
        unit("P_MUTATION", self.p_mutation)?;
        unit("COND_P_DONT_CARE", self.cond_p_dont_care)?;
        if self.cond_min >= self.cond_max {
            return Err(Error::config(format!(
                "COND_MIN must be below COND_MAX: [{}, {}]",
                self.cond_min, self.cond_max
            )));
        }
        if self.cond_spread_min <= 0.0 || self.cond_spread_min > self.cond_range() {
            return Err(Error::config(format!(
                "COND_SPREAD_MIN must be within (0, COND_MAX - COND_MIN]: {}",
                self.cond_spread_min
            )));
        }
        if self.cond_bits == 0 || self.cond_bits > 8 {
            return Err(Error::config(format!(
                "COND_BITS must be within [1, 8]: {}",
                self.cond_bits
            )));
        }
        if self.hidden_neurons == 0 {
            return Err(Error::config("HIDDEN_NEURONS must be at least 1"));
        }
        if self.dgp_num_nodes == 0 || self.dgp_max_t == 0 {
            return Err(Error::config(
                "DGP_NUM_NODES and DGP_MAX_T must be at least 1",
            ));
        }
        if self.tree_max_depth == 0 {
            return Err(Error::config("TREE_MAX_DEPTH must be at least 1"));
        }
        if self.pred_eta <= 0.0 || self.pred_eta > 1.0 {
            return Err(Error::config(format!(
                "PRED_ETA must be within (0, 1]: {}",
                self.pred_eta
            )));
        }
        if self.pred_rls_scale_factor <= 0.0 {
            return Err(Error::config(format!(
                "PRED_RLS_SCALE_FACTOR must be positive: {}",
                self.pred_rls_scale_factor
            )));
        }
        if self.pred_rls_lambda <= 0.0 || self.pred_rls_lambda > 1.0 {
            return Err(Error::config(format!(
                "PRED_RLS_LAMBDA must be within (0, 1]: {}",
                self.pred_rls_lambda
            )));
        }
        if self.n_threads == 0 {
            return Err(Error::config("N_THREADS must be at least 1"));
        }
        if self.teletransportation == 0 {
            return Err(Error::config("TELETRANSPORTATION must be at least 1"));
        }
        Ok(())
    }

    /// Width of the input range, used to scale Gaussian mutation.
    #[must_use]
    pub(crate) fn cond_range(&self) -> f64 {
        self.cond_max - self.cond_min
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        Params::default().validate().unwrap();
        Params::new(6, 1, 2).validate().unwrap();
    }

    #[test]
    fn rejects_out_of_range() {
        let cases: &[fn(&mut Params)] = &[
            |p| p.pop_size = 0,
            |p| p.beta = 0.0,
            |p| p.beta = 1.5,
            |p| p.eps_0 = -0.1,
            |p| p.alpha = 0.0,
            |p| p.nu = 0.0,
            |p| p.lambda = 0,
            |p| p.ea_select_size = 0.0,
            |p| p.p_crossover = 1.2,
            |p| p.cond_min = 2.0,
            |p| p.cond_bits = 0,
            |p| p.n_threads = 0,
            |p| p.pred_eta = 0.0,
        ];
        for mutate in cases {
            let mut params = Params::default();
            mutate(&mut params);
            assert!(
                matches!(params.validate(), Err(Error::Config(_))),
                "expected a configuration error for {params:?}"
            );
        }
    }

    #[test]
    fn selectors_parse_kebab_case() {
        assert_eq!(
            "hyperrectangle".parse::<ConditionKind>().unwrap(),
            ConditionKind::Hyperrectangle
        );
        assert_eq!("dgp".parse::<ConditionKind>().unwrap(), ConditionKind::Dgp);
        assert_eq!(
            "tournament".parse::<EaSelectKind>().unwrap(),
            EaSelectKind::Tournament
        );
        assert_eq!(
            "rls".parse::<PredictionKind>().unwrap(),
            PredictionKind::Rls
        );
        assert!("perceptron".parse::<ConditionKind>().is_err());
    }
}
