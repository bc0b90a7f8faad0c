//! JSON run summaries written next to trained models.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use oxcsf_engine::Params;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub(crate) struct RunSummary {
    pub trained_at: DateTime<Utc>,
    pub trials: u32,
    pub train_loss: f64,
    pub test_loss: Option<f64>,
    pub macro_classifiers: usize,
    pub numerosity: u32,
    pub snapshot: PathBuf,
    pub params: Params,
}

impl RunSummary {
    pub(crate) fn save_json(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialises_round_trip() {
        let summary = RunSummary {
            trained_at: Utc::now(),
            trials: 1000,
            train_loss: 0.01,
            test_loss: Some(0.02),
            macro_classifiers: 42,
            numerosity: 200,
            snapshot: PathBuf::from("model.xcsf"),
            params: Params::new(6, 1, 2),
        };
        let json = serde_json::to_string(&summary).unwrap();
        let back: RunSummary = serde_json::from_str(&json).unwrap();
        assert_eq!(back.trials, 1000);
        assert_eq!(back.params.x_dim, 6);
    }
}
