use std::path::PathBuf;

use oxcsf_engine::Xcsf;
use oxcsf_envs::csv;

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct ScoreArgs {
    /// Population snapshot written by `train`
    model: PathBuf,
    /// Labelled data CSV: x columns followed by y columns
    test_csv: PathBuf,
}

pub(crate) fn run(args: &ScoreArgs) -> anyhow::Result<()> {
    let mut xcsf = Xcsf::load(&args.model)?;
    let test = csv::load_dataset(
        &args.test_csv,
        xcsf.params().x_dim,
        xcsf.params().y_dim,
    )?;
    let loss = xcsf.score(&test)?;
    println!("{loss}");
    Ok(())
}
