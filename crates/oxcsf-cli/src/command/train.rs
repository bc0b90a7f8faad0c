use std::path::PathBuf;

use chrono::Utc;

use oxcsf_engine::Xcsf;
use oxcsf_envs::csv;

use crate::{config, summary::RunSummary};

#[derive(Debug, Clone, clap::Args)]
pub(crate) struct TrainArgs {
    /// Configuration file
    config: PathBuf,
    /// Training data CSV: x columns followed by y columns
    train_csv: PathBuf,
    /// Held-out data CSV, scored after training
    #[arg(long)]
    test_csv: Option<PathBuf>,
    /// Population snapshot output path
    #[arg(long, default_value = "model.xcsf")]
    output: PathBuf,
    /// JSON run summary output path
    #[arg(long)]
    summary: Option<PathBuf>,
    /// Present training rows cyclically instead of sampling at random
    #[arg(long)]
    no_shuffle: bool,
}

pub(crate) fn run(args: &TrainArgs) -> anyhow::Result<()> {
    let params = config::load(&args.config)?;
    let max_trials = params.max_trials;

    eprintln!("Loading training data from {}...", args.train_csv.display());
    let train = csv::load_dataset(&args.train_csv, params.x_dim, params.y_dim)?;
    eprintln!("Loaded {} samples", train.n_samples());
    let test = args
        .test_csv
        .as_ref()
        .map(|path| csv::load_dataset(path, params.x_dim, params.y_dim))
        .transpose()?;

    let mut xcsf = Xcsf::new(params)?;
    let train_loss = xcsf.fit(&train, test.as_ref(), !args.no_shuffle)?;
    let test_loss = test.as_ref().map(|data| xcsf.score(data)).transpose()?;
    xcsf.save(&args.output)?;

    let summary = RunSummary {
        trained_at: Utc::now(),
        trials: max_trials,
        train_loss,
        test_loss,
        macro_classifiers: xcsf.population().num_macros(),
        numerosity: xcsf.population().total_num(),
        snapshot: args.output.clone(),
        params: xcsf.params().clone(),
    };
    if let Some(path) = &args.summary {
        summary.save_json(path)?;
    }

    eprintln!();
    eprintln!("Training completed");
    eprintln!("  Snapshot: {}", args.output.display());
    eprintln!("  Trials: {max_trials}");
    eprintln!("  Mean train loss: {train_loss:.5}");
    if let Some(test_loss) = test_loss {
        eprintln!("  Test loss: {test_loss:.5}");
    }
    eprintln!(
        "  Population: {} macros, numerosity {}",
        summary.macro_classifiers, summary.numerosity
    );
    Ok(())
}
