//! End-to-end learning scenarios on synthetic regression targets.

use rand::{Rng as _, SeedableRng as _};
use rand_pcg::Pcg64Mcg;

use oxcsf_engine::{ConditionKind, Dataset, Params, PredictionKind, Xcsf};

fn linear_dataset(n: usize, seed: u64) -> Dataset {
    let mut rng = Pcg64Mcg::seed_from_u64(seed);
    let mut x = Vec::with_capacity(n);
    let mut y = Vec::with_capacity(n);
    for _ in 0..n {
        let v: f64 = rng.random_range(0.0..1.0);
        x.push(v);
        y.push(2.0 * v + 0.5);
    }
    Dataset::new(x, y, 1, 1).unwrap()
}

fn regression_params() -> Params {
    let mut params = Params::new(1, 1, 1);
    params.pop_size = 200;
    params.max_trials = 5000;
    params.perf_trials = 10_000;
    params.condition = ConditionKind::Hyperrectangle;
    params.prediction = PredictionKind::Nlms;
    params.eps_0 = 0.005;
    params.seed = 3;
    params
}

// hyperrectangle conditions with local linear models on y = 2x + 0.5
#[test]
fn linear_regression_converges() {
    let train = linear_dataset(1000, 1);
    let test = linear_dataset(200, 2);
    let mut xcsf = Xcsf::new(regression_params()).unwrap();
    xcsf.fit(&train, None, true).unwrap();
    let loss = xcsf.score(&test).unwrap();
    assert!(loss < 0.01, "held-out loss {loss}");
    assert!(xcsf.population().total_num() <= 200);
}

#[test]
fn constant_prediction_converges_more_slowly_but_converges() {
    let train = linear_dataset(1000, 3);
    let test = linear_dataset(200, 4);
    let mut params = regression_params();
    params.prediction = PredictionKind::Constant;
    params.eps_0 = 0.01;
    params.max_trials = 10_000;
    let mut xcsf = Xcsf::new(params).unwrap();
    xcsf.fit(&train, None, true).unwrap();
    let loss = xcsf.score(&test).unwrap();
    // constant models approximate the slope piecewise; the residual is the
    // within-region variance of y
    assert!(loss < 0.2, "held-out loss {loss}");
}

#[test]
fn population_stays_within_cap_throughout() {
    let train = linear_dataset(500, 5);
    let mut params = regression_params();
    params.pop_size = 30;
    params.max_trials = 1;
    let mut xcsf = Xcsf::new(params).unwrap();
    for _ in 0..2000 {
        xcsf.fit(&train, None, true).unwrap();
        assert!(xcsf.population().total_num() <= 30);
        assert!(xcsf.population().classifiers().all(|c| c.num > 0));
        assert!(
            xcsf.population()
                .classifiers()
                .all(|c| c.age <= xcsf.time())
        );
    }
}

#[test]
fn pop_size_one_boundary() {
    let train = linear_dataset(100, 6);
    let mut params = regression_params();
    params.pop_size = 1;
    params.max_trials = 500;
    let mut xcsf = Xcsf::new(params).unwrap();
    xcsf.fit(&train, None, true).unwrap();
    assert_eq!(xcsf.population().total_num(), 1);
}

#[test]
fn save_load_round_trip_after_training() {
    let train = linear_dataset(500, 7);
    let path = std::env::temp_dir().join(format!("oxcsf-e2e-{}.bin", std::process::id()));
    let mut params = regression_params();
    params.max_trials = 2000;
    let mut xcsf = Xcsf::new(params).unwrap();
    xcsf.fit(&train, None, true).unwrap();
    xcsf.save(&path).unwrap();
    let mut restored = Xcsf::load(&path).unwrap();

    let mut rng = Pcg64Mcg::seed_from_u64(8);
    let probe: Vec<f64> = (0..1000).map(|_| rng.random_range(0.0..1.0)).collect();
    assert_eq!(
        xcsf.predict(&probe).unwrap(),
        restored.predict(&probe).unwrap()
    );
    let _ = std::fs::remove_file(&path);
}

// injecting clones of an experienced accurate rule must collapse into a
// single macro-classifier via GA subsumption
#[test]
fn subsumption_stress() {
    let mut params = regression_params();
    params.pop_size = 2000;
    params.do_ga_subsumption = true;
    params.p_mutation = 0.0;
    params.p_crossover = 0.0;
    params.theta_ea = 0.0;
    params.lambda = 2;
    params.prediction = PredictionKind::Constant;
    params.condition = ConditionKind::Dummy;
    params.max_trials = 1;
    let train = Dataset::new(vec![0.5], vec![1.0], 1, 1).unwrap();
    let mut xcsf = Xcsf::new(params).unwrap();
    // enough trials for the sole rule to qualify as a subsumer, then many
    // EA rounds that keep trying to insert identical offspring
    for _ in 0..1200 {
        xcsf.fit(&train, None, false).unwrap();
    }
    assert_eq!(xcsf.population().num_macros(), 1, "clones were not absorbed");
    let rule = xcsf.population().classifiers().next().unwrap();
    assert!(rule.num > 1000);
}
