//! Supervised trial orchestration: fit, predict and score.

use rand::Rng;

use crate::data::Dataset;
use crate::ea;
use crate::engine::Xcsf;
use crate::error::{Error, Result};
use crate::perf::{self, PerfTracker};
use crate::set;

/// Executes `max_trials` learning iterations on the training data,
/// interleaving windowed evaluation on the test data when provided.
/// Returns the mean training loss over all trials.
pub(crate) fn fit(
    xcsf: &mut Xcsf,
    train: &Dataset,
    test: Option<&Dataset>,
    shuffle: bool,
) -> Result<f64> {
    check_dims(xcsf, train)?;
    if let Some(test) = test {
        check_dims(xcsf, test)?;
    }
    let max_trials = xcsf.params.max_trials;
    let mut perf = PerfTracker::new(xcsf.params.perf_trials);
    let mut total = 0.0;
    for cnt in 0..max_trials {
        let row = sample(train.n_samples(), cnt, shuffle, &mut xcsf.rng);
        let (x, y) = (train.x_row(row), train.y_row(row));
        xcsf.params.explore = true;
        trial(xcsf, x, Some(y));
        let train_loss = xcsf.params.loss.compute(xcsf.pa.vector(), y);
        total += train_loss;

        let test_loss = test.map(|data| {
            let row = sample(data.n_samples(), cnt, shuffle, &mut xcsf.rng);
            xcsf.params.explore = false;
            trial(xcsf, data.x_row(row), None);
            xcsf.params.loss.compute(xcsf.pa.vector(), data.y_row(row))
        });

        if let Some(summary) = perf.record(cnt + 1, train_loss, test_loss) {
            perf::print_summary(&summary, xcsf.pop.num_macros(), xcsf.pop.total_num());
        }
    }
    Ok(total / f64::from(max_trials))
}

/// Predictions for a row-major input matrix.
pub(crate) fn predict(xcsf: &mut Xcsf, x: &[f64]) -> Result<Vec<f64>> {
    if x.is_empty() || x.len() % xcsf.params.x_dim != 0 {
        return Err(Error::Dimension {
            expected: xcsf.params.x_dim,
            actual: x.len() % xcsf.params.x_dim,
        });
    }
    xcsf.params.explore = false;
    let n_samples = x.len() / xcsf.params.x_dim;
    let mut out = Vec::with_capacity(n_samples * xcsf.params.y_dim);
    for row in 0..n_samples {
        let x = &x[row * xcsf.params.x_dim..(row + 1) * xcsf.params.x_dim];
        trial(xcsf, x, None);
        out.extend_from_slice(xcsf.pa.vector());
    }
    Ok(out)
}

/// Mean loss over a labelled dataset.
pub(crate) fn score(xcsf: &mut Xcsf, test: &Dataset) -> Result<f64> {
    check_dims(xcsf, test)?;
    xcsf.params.explore = false;
    let mut total = 0.0;
    for row in 0..test.n_samples() {
        trial(xcsf, test.x_row(row), None);
        total += xcsf.params.loss.compute(xcsf.pa.vector(), test.y_row(row));
    }
    Ok(total / test.n_samples() as f64)
}

/// One supervised trial: match, aggregate, and in explore mode update the
/// match set and run the EA. The kill sweep closes every trial.
pub(crate) fn trial(xcsf: &mut Xcsf, x: &[f64], y: Option<&[f64]>) {
    xcsf.mset.clear();
    xcsf.kset.clear();
    if xcsf.params.explore {
        xcsf.time += 1;
    }
    set::build_match_set(
        &mut xcsf.pop,
        &xcsf.params,
        x,
        xcsf.time,
        &mut xcsf.mset,
        &mut xcsf.kset,
        &mut xcsf.rng,
    );
    xcsf.pa.build(&mut xcsf.pop, &xcsf.mset, &xcsf.params, x);
    if xcsf.params.explore {
        if let Some(y) = y {
            set::update_set(
                &mut xcsf.pop,
                &xcsf.params,
                &mut xcsf.mset,
                x,
                y,
                true,
                &mut xcsf.kset,
                &mut xcsf.rng,
            );
            ea::run(
                &mut xcsf.pop,
                &xcsf.params,
                &xcsf.mset,
                xcsf.time,
                &mut xcsf.kset,
                &mut xcsf.rng,
            );
        }
    }
    xcsf.mset.clear();
    xcsf.pop.kill_sweep(&mut xcsf.kset);
}

fn check_dims(xcsf: &Xcsf, data: &Dataset) -> Result<()> {
    if data.x_dim() != xcsf.params.x_dim {
        return Err(Error::Dimension {
            expected: xcsf.params.x_dim,
            actual: data.x_dim(),
        });
    }
    if data.y_dim() != xcsf.params.y_dim {
        return Err(Error::Dimension {
            expected: xcsf.params.y_dim,
            actual: data.y_dim(),
        });
    }
    Ok(())
}

fn sample<R: Rng + ?Sized>(n_samples: usize, cnt: u32, shuffle: bool, rng: &mut R) -> usize {
    if shuffle {
        rng.random_range(0..n_samples)
    } else {
        cnt as usize % n_samples
    }
}
