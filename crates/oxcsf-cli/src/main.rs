use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod command;
mod config;
mod summary;

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Train a classifier system from a config file and CSV data
    Train(command::train::TrainArgs),
    /// Predict outputs for a CSV input matrix with a saved model
    Predict(command::predict::PredictArgs),
    /// Score a saved model against labelled CSV data
    Score(command::score::ScoreArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let result = match &cli.command {
        Command::Train(args) => command::train::run(args),
        Command::Predict(args) => command::predict::run(args),
        Command::Score(args) => command::score::run(args),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            exit_code(&err)
        }
    }
}

/// 1 configuration error, 2 I/O error, 3 runtime failure.
fn exit_code(err: &anyhow::Error) -> ExitCode {
    if let Some(engine) = err.downcast_ref::<oxcsf_engine::Error>() {
        return match engine {
            oxcsf_engine::Error::Config(_) => ExitCode::from(1),
            oxcsf_engine::Error::Io(_) | oxcsf_engine::Error::Snapshot(_) => ExitCode::from(2),
            oxcsf_engine::Error::Dimension { .. } => ExitCode::from(3),
        };
    }
    if err.downcast_ref::<std::io::Error>().is_some() {
        return ExitCode::from(2);
    }
    ExitCode::from(3)
}
