// ============================================================
// Layer 6 — Checkpoint Manager
// ============================================================
// Persists the best model seen so far, plus the training config.
//
// What gets saved:
//   1. model_best.json  — (parameters, relation table, vocabulary)
//                         as one JSON document. The tables travel
//                         with the parameters because RelIds and
//                         word ids are only meaningful against
//                         them; a checkpoint is self-describing.
//   2. best_epoch.json  — which epoch produced it, at what loss
//   3. train_config.json — the hyperparameters of the run
//
// Checkpoint-best policy: the trainer calls save_best() only when
// an epoch improves on the lowest loss seen so far, so the file
// on disk is always the best model of the run, not the latest.
//
// Reloading a checkpoint must reproduce the parameter vector bit
// for bit; this relies on serde_json's `float_roundtrip` feature
// (the default float parser can be off in the last ulp).
//
// Reference: Rust Book §9 (Error Handling)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};

use crate::application::train_use_case::TrainConfig;
use crate::ml::params::Params;

/// A self-describing persisted model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Checkpoint {
    pub params:    Params,
    pub relations: Vec<String>,
    pub vocab:     Vec<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct BestEpoch {
    epoch: usize,
    loss:  f64,
}

pub struct CheckpointManager {
    dir: PathBuf,
}

impl CheckpointManager {
    /// Create a manager, making the directory if needed.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let dir = dir.into();
        fs::create_dir_all(&dir).ok();
        Self { dir }
    }

    /// Persist a new best model together with its epoch/loss marker.
    pub fn save_best(&self, checkpoint: &Checkpoint, epoch: usize, loss: f64) -> Result<()> {
        let model_path = self.dir.join("model_best.json");
        fs::write(&model_path, serde_json::to_string(checkpoint)?)
            .with_context(|| format!("Failed to save checkpoint to '{}'", model_path.display()))?;

        let marker_path = self.dir.join("best_epoch.json");
        fs::write(&marker_path, serde_json::to_string(&BestEpoch { epoch, loss })?)
            .with_context(|| "Failed to write best_epoch.json")?;

        tracing::debug!("Saved best checkpoint: epoch {epoch}, loss {loss:.6}");
        Ok(())
    }

    /// Load the persisted best model.
    pub fn load_best(&self) -> Result<Checkpoint> {
        let path = self.dir.join("model_best.json");
        let json = fs::read_to_string(&path).with_context(|| {
            format!(
                "Cannot load checkpoint '{}'. Have you trained a model first?",
                path.display()
            )
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    /// Save the run's hyperparameters next to the model.
    pub fn save_config(&self, cfg: &TrainConfig) -> Result<()> {
        let path = self.dir.join("train_config.json");
        fs::write(&path, serde_json::to_string_pretty(cfg)?)
            .with_context(|| format!("Cannot write config to '{}'", path.display()))?;
        Ok(())
    }

    pub fn load_config(&self) -> Result<TrainConfig> {
        let path = self.dir.join("train_config.json");
        let json = fs::read_to_string(&path)
            .with_context(|| format!("Cannot read config from '{}'", path.display()))?;
        Ok(serde_json::from_str(&json)?)
    }
}
