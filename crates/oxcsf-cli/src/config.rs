//! INI-style configuration files.
//!
//! One `key = value` pair per line; `#` and `;` start comments; `[section]`
//! headers are cosmetic and ignored. Unknown keys are rejected so a typo
//! cannot silently fall back to a default.

use std::fs;
use std::path::Path;

use anyhow::Context as _;

use oxcsf_engine::{Error, Params};

pub(crate) fn load(path: &Path) -> anyhow::Result<Params> {
    let text = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    parse(&text).with_context(|| format!("in {}", path.display()))
}

pub(crate) fn parse(text: &str) -> anyhow::Result<Params> {
    let mut params = Params::default();
    for (line_no, raw) in text.lines().enumerate() {
        let line = raw
            .split(['#', ';'])
            .next()
            .unwrap_or_default()
            .trim();
        if line.is_empty() || (line.starts_with('[') && line.ends_with(']')) {
            continue;
        }
        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| Error::Config(format!("line {}: expected key = value", line_no + 1)))?;
        apply(&mut params, key.trim(), value.trim())
            .with_context(|| format!("line {}", line_no + 1))?;
    }
    params.validate()?;
    Ok(params)
}

fn apply(params: &mut Params, key: &str, value: &str) -> anyhow::Result<()> {
    fn bad(key: &str, value: &str) -> Error {
        Error::Config(format!("invalid value for {key}: {value:?}"))
    }
    macro_rules! set {
        ($field:ident) => {
            params.$field = value.parse().map_err(|_| bad(key, value))?
        };
    }
    match key.to_ascii_lowercase().as_str() {
        "pop_size" => set!(pop_size),
        "max_trials" => set!(max_trials),
        "perf_trials" => set!(perf_trials),
        "loss" => set!(loss),
        "x_dim" => set!(x_dim),
        "y_dim" => set!(y_dim),
        "n_actions" => set!(n_actions),
        "seed" => set!(seed),
        "n_threads" => set!(n_threads),
        "theta_ea" => set!(theta_ea),
        "p_crossover" => set!(p_crossover),
        "lambda" => set!(lambda),
        "ea_select_type" => set!(ea_select_kind),
        "ea_select_size" => set!(ea_select_size),
        "alpha" => set!(alpha),
        "nu" => set!(nu),
        "beta" => set!(beta),
        "eps_0" | "e0" => set!(eps_0),
        "theta_sub" => set!(theta_sub),
        "do_ga_subsumption" => set!(do_ga_subsumption),
        "do_set_subsumption" => set!(do_set_subsumption),
        "theta_del" => set!(theta_del),
        "delta" => set!(delta),
        "init_fitness" => set!(init_fitness),
        "init_error" => set!(init_error),
        "gamma" => set!(gamma),
        "p_explore" => set!(p_explore),
        "teletransportation" => set!(teletransportation),
        "condition" => set!(condition),
        "action" => set!(action),
        "prediction" => set!(prediction),
        "cond_min" => set!(cond_min),
        "cond_max" => set!(cond_max),
        "cond_spread_min" => set!(cond_spread_min),
        "cond_p_dont_care" => set!(cond_p_dont_care),
        "cond_bits" => set!(cond_bits),
        "hidden_neurons" => set!(hidden_neurons),
        "dgp_num_nodes" => set!(dgp_num_nodes),
        "dgp_max_t" => set!(dgp_max_t),
        "tree_max_depth" => set!(tree_max_depth),
        "p_mutation" => set!(p_mutation),
        "s_mutation" => set!(s_mutation),
        "pred_eta" => set!(pred_eta),
        "pred_x0" => set!(pred_x0),
        "pred_rls_scale_factor" => set!(pred_rls_scale_factor),
        "pred_rls_lambda" => set!(pred_rls_lambda),
        _ => return Err(Error::Config(format!("unknown key: {key}")).into()),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use oxcsf_engine::{ConditionKind, EaSelectKind, PredictionKind};

    #[test]
    fn parses_a_typical_file() {
        let params = parse(
            "# regression setup\n\
             [general]\n\
             pop_size = 500\n\
             max_trials = 1000  ; inline comment\n\
             x_dim = 6\n\
             condition = ternary\n\
             prediction = rls\n\
             ea_select_type = tournament\n\
             eps_0 = 0.005\n",
        )
        .unwrap();
        assert_eq!(params.pop_size, 500);
        assert_eq!(params.max_trials, 1000);
        assert_eq!(params.x_dim, 6);
        assert_eq!(params.condition, ConditionKind::Ternary);
        assert_eq!(params.prediction, PredictionKind::Rls);
        assert_eq!(params.ea_select_kind, EaSelectKind::Tournament);
        assert_eq!(params.eps_0, 0.005);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = parse("pop_sizee = 500\n").unwrap_err();
        assert!(err.to_string().contains("line 1"));
        assert!(format!("{err:#}").contains("unknown key"));
    }

    #[test]
    fn bad_values_are_rejected() {
        assert!(parse("pop_size = many\n").is_err());
        assert!(parse("condition = perceptron\n").is_err());
        assert!(parse("beta\n").is_err());
    }

    #[test]
    fn out_of_range_combinations_fail_validation() {
        assert!(parse("beta = 7.0\n").is_err());
    }
}
