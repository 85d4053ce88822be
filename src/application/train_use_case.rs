// ============================================================
// Layer 2 — TrainUseCase
// ============================================================
// Orchestrates the full training pipeline in order:
//
//   Step 1: Validate hyperparameters   (fail fast)
//   Step 2: Load + resolve the dataset (Layer 4 - data)
//   Step 3: Pre-filter bad parses      (Layer 4 - data)
//   Step 4: Initialise parameters      (Layer 5 - ml)
//   Step 5: Save config                (Layer 6 - infra)
//   Step 6: Run training loop          (Layer 5 - ml)
//
// Reference: Iyyer et al. (2014) §4

use std::path::Path;

use anyhow::Result;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::data::dataset::Corpus;
use crate::data::embeddings::load_embeddings;
use crate::domain::error::ConfigurationError;
use crate::infra::checkpoint::CheckpointManager;
use crate::infra::metrics::MetricsLogger;
use crate::ml::params::Params;
use crate::ml::trainer::run_training;
use crate::ml::validate::AnswerRankValidator;

// ─── Training Configuration ──────────────────────────────────────────────────
// All hyperparameters for a training run.
// Serialisable so it can be saved to disk and reloaded later.
// Defaults follow the reference implementation's flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Path to the processed dataset JSON
    pub data:          String,

    /// Optional pre-trained embedding matrix (JSON); random
    /// initialisation when absent
    pub embeddings:    Option<String>,

    /// Directory for checkpoints, config, and metrics
    pub output_dir:    String,

    /// Hidden dimensionality of every node vector
    pub d:             usize,

    /// Parallel workers inside each minibatch
    pub num_workers:   usize,

    /// L2 weight on composition matrices and the lift matrix
    pub lambda_w:      f64,

    /// L2 weight on the embedding matrix
    pub lambda_we:     f64,

    pub batch_size:    usize,
    pub epochs:        usize,
    pub lr:            f64,

    /// Zero the Adagrad history every this many epochs (0 = never)
    pub adagrad_reset: usize,

    /// Compute advisory accuracies every this many epochs (0 = never)
    pub do_val:        usize,

    pub seed:          u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            data:          "data/dataset.json".to_string(),
            embeddings:    None,
            output_dir:    "models".to_string(),
            d:             100,
            num_workers:   6,
            lambda_w:      0.0,
            lambda_we:     0.0,
            batch_size:    272,
            epochs:        30,
            lr:            0.05,
            adagrad_reset: 3,
            do_val:        5,
            seed:          42,
        }
    }
}

impl TrainConfig {
    /// Reject configurations that would produce a degenerate model
    /// or a degenerate run before any data is touched.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.d == 0 {
            return Err(ConfigurationError("dimensionality d must be positive".into()));
        }
        if self.batch_size == 0 {
            return Err(ConfigurationError("batch size must be positive".into()));
        }
        if self.num_workers == 0 {
            return Err(ConfigurationError("worker count must be positive".into()));
        }
        if self.epochs == 0 {
            return Err(ConfigurationError("epoch count must be positive".into()));
        }
        if !(self.lr.is_finite() && self.lr > 0.0) {
            return Err(ConfigurationError(format!(
                "learning rate must be positive and finite, got {}",
                self.lr
            )));
        }
        for (name, lambda) in [("lambda_w", self.lambda_w), ("lambda_we", self.lambda_we)] {
            if !(lambda.is_finite() && lambda >= 0.0) {
                return Err(ConfigurationError(format!(
                    "{name} must be non-negative and finite, got {lambda}"
                )));
            }
        }
        Ok(())
    }
}

// ─── TrainUseCase ─────────────────────────────────────────────────────────────
// Owns the config and runs the full training pipeline.
pub struct TrainUseCase {
    config: TrainConfig,
}

impl TrainUseCase {
    pub fn new(config: TrainConfig) -> Self {
        Self { config }
    }

    /// Execute the full training pipeline end to end
    pub fn execute(&self) -> Result<()> {
        let cfg = &self.config;

        // ── Step 1: Fail fast on bad hyperparameters ──────────────────────────
        cfg.validate()?;

        // ── Step 2: Load and resolve the dataset ──────────────────────────────
        tracing::info!("Loading dataset from '{}'", cfg.data);
        let mut corpus = Corpus::load(Path::new(&cfg.data))?;

        // ── Step 3: Pre-filter structurally invalid parses ────────────────────
        let dropped = corpus.prefilter();
        if dropped > 0 {
            tracing::warn!("Dropped {dropped} structurally invalid trees");
        }

        // ── Step 4: Initialise parameters ─────────────────────────────────────
        // Composition matrices are always random; embedding columns are
        // overwritten from the pre-trained matrix when one is given.
        let mut rng = StdRng::seed_from_u64(cfg.seed);
        let mut initial = Params::random(
            cfg.d,
            corpus.vocab.len(),
            corpus.relations.len(),
            &mut rng,
        );
        if let Some(path) = &cfg.embeddings {
            tracing::info!("Loading pre-trained embeddings from '{path}'");
            initial.we = load_embeddings(Path::new(path), cfg.d, corpus.vocab.len())?;
        }

        // ── Step 5: Persist the run configuration ─────────────────────────────
        let ckpt = CheckpointManager::new(&cfg.output_dir);
        ckpt.save_config(cfg)?;
        let metrics = MetricsLogger::new(&cfg.output_dir)?;

        // ── Step 6: Train ─────────────────────────────────────────────────────
        let validator = AnswerRankValidator::new(corpus.answers.clone());
        let summary = run_training(cfg, &corpus, initial, &ckpt, &metrics, Some(&validator))?;

        tracing::info!(
            "Training finished after {} epochs, best epoch loss {:.6}",
            summary.epochs,
            summary.best_loss,
        );
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(TrainConfig::default().validate().is_ok());
    }

    #[test]
    fn test_degenerate_configs_are_rejected() {
        let mut cfg = TrainConfig::default();
        cfg.d = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.batch_size = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.num_workers = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.epochs = 0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.lr = 0.0;
        assert!(cfg.validate().is_err());

        let mut cfg = TrainConfig::default();
        cfg.lambda_we = -1.0;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let cfg = TrainConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: TrainConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.batch_size, cfg.batch_size);
        assert_eq!(back.seed, cfg.seed);
        assert!(back.embeddings.is_none());
    }
}
