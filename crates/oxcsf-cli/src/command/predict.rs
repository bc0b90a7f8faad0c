use std::io::{self, Write as _};
use std::path::PathBuf;

use anyhow::ensure;

use oxcsf_engine::Xcsf;
use oxcsf_envs::csv;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct PredictArgs {
    /// Population snapshot written by `train`
    model: PathBuf,
    /// Input matrix CSV with one x row per line
    input_csv: PathBuf,
}

pub(crate) fn run(args: &PredictArgs) -> anyhow::Result<()> {
    let mut xcsf = Xcsf::load(&args.model)?;
    let (values, width) = csv::load_matrix(&args.input_csv)?;
    ensure!(
        width == xcsf.params().x_dim,
        "{} has {width} columns, the model expects {}",
        args.input_csv.display(),
        xcsf.params().x_dim
    );
    let y_dim = xcsf.params().y_dim;
    let predictions = xcsf.predict(&values)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for row in predictions.chunks(y_dim) {
        let line: Vec<String> = row.iter().map(|v| format!("{v}")).collect();
        writeln!(out, "{}", line.join(","))?;
    }
    Ok(())
}
