//! An accuracy-based learning classifier system (XCSF).
//!
//! The engine evolves a capped population of IF-THEN rules whose
//! conditions partition the input space and whose predictions compute
//! local models. Each trial filters the population into a match set,
//! aggregates a fitness-weighted prediction array per action, updates the
//! acting rules against the observed target or payoff, and periodically
//! breeds new rules with a steady-state evolutionary algorithm.
//!
//! # Architecture
//!
//! ```text
//! Trial orchestrators (supervised / reinforcement)
//!     ↓ drive
//! Set algebra (match set, action set, kill set) + prediction array
//!     ↓ over
//! Population (capped multiset, deletion by roulette vote)
//!     ↓ of
//! Classifiers (condition + action + prediction variants)
//! ```
//!
//! Conditions, actions and predictions are tagged variants behind a
//! uniform capability surface (cover, match/compute, crossover, mutate,
//! serialize), so the engine never depends on a concrete representation.
//!
//! # Example
//!
//! ```rust,no_run
//! use oxcsf_engine::{Dataset, Params, Xcsf};
//!
//! let params = Params::new(1, 1, 1);
//! let mut xcsf = Xcsf::new(params)?;
//! let train = Dataset::new(vec![0.0, 0.5, 1.0], vec![0.5, 1.5, 2.5], 1, 1)?;
//! let mean_loss = xcsf.fit(&train, None, true)?;
//! let predictions = xcsf.predict(&[0.25, 0.75])?;
//! # let _ = (mean_loss, predictions);
//! # Ok::<(), oxcsf_engine::Error>(())
//! ```

pub mod action;
pub mod classifier;
mod codec;
pub mod condition;
pub mod data;
mod ea;
pub mod error;
mod engine;
pub mod loss;
pub mod network;
mod pa;
pub mod params;
mod perf;
pub mod population;
pub mod prediction;
mod reinforcement;
mod set;
mod snapshot;
mod supervised;

pub use self::action::Action;
pub use self::classifier::Classifier;
pub use self::condition::Condition;
pub use self::data::Dataset;
pub use self::engine::Xcsf;
pub use self::error::{Error, Result};
pub use self::loss::LossKind;
pub use self::params::{ActionKind, ConditionKind, EaSelectKind, Params, PredictionKind};
pub use self::perf::{PerfSummary, PerfTracker};
pub use self::population::Population;
pub use self::prediction::Prediction;
pub use self::reinforcement::Environment;
pub use self::set::Set;
