// ============================================================
// Layer 1 — CLI Commands and Arguments
// ============================================================
// Defines the two subcommands: `train` and `features`
// and all their configurable flags.
//
// clap's derive macros automatically generate:
//   - help text (--help)
//   - error messages for missing args
//   - type conversion (string → usize, f64, etc.)
//
// Reference: Rust Book §12 (Building a CLI Program)

use clap::{Args, Subcommand};

use crate::application::train_use_case::TrainConfig;

/// The two top-level subcommands available to the user
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Train the dependency-tree RNN on a processed QA dataset
    Train(TrainArgs),

    /// Export hidden feature vectors from a trained checkpoint
    Features(FeaturesArgs),
}

/// All arguments for the `train` command.
/// Each field becomes a --flag on the command line.
#[derive(Args, Debug)]
pub struct TrainArgs {
    /// Processed dataset JSON (vocab, relations, answers, folds)
    #[arg(long, default_value = "data/dataset.json")]
    pub data: String,

    /// Pre-trained embedding matrix (JSON, one row per word);
    /// random initialisation when omitted
    #[arg(long)]
    pub embeddings: Option<String>,

    /// Directory to save checkpoints, config, and metrics
    #[arg(long, default_value = "models")]
    pub output_dir: String,

    /// Hidden dimensionality of every node vector
    #[arg(long, default_value_t = 100)]
    pub d: usize,

    /// Parallel workers inside each minibatch
    #[arg(long, default_value_t = 6)]
    pub num_workers: usize,

    /// L2 regularisation on composition and lift matrices
    #[arg(long, default_value_t = 0.0)]
    pub lambda_w: f64,

    /// L2 regularisation on the embedding matrix
    #[arg(long, default_value_t = 0.0)]
    pub lambda_we: f64,

    /// Number of trees per minibatch
    #[arg(long, default_value_t = 272)]
    pub batch_size: usize,

    /// Number of full passes through the training fold
    #[arg(long, default_value_t = 30)]
    pub epochs: usize,

    /// Adagrad base learning rate
    #[arg(long, default_value_t = 0.05)]
    pub lr: f64,

    /// Zero the Adagrad history every N epochs (0 disables)
    #[arg(long, default_value_t = 3)]
    pub adagrad_reset: usize,

    /// Compute advisory train/dev accuracy every N epochs (0 disables)
    #[arg(long, default_value_t = 5)]
    pub do_val: usize,

    /// Seed for initialisation, shuffling, and answer sampling
    #[arg(long, default_value_t = 42)]
    pub seed: u64,
}

/// Convert CLI TrainArgs into the application-layer TrainConfig.
/// This is the boundary between Layer 1 and Layer 2 —
/// the application layer never sees clap types.
impl From<TrainArgs> for TrainConfig {
    fn from(a: TrainArgs) -> Self {
        TrainConfig {
            data:          a.data,
            embeddings:    a.embeddings,
            output_dir:    a.output_dir,
            d:             a.d,
            num_workers:   a.num_workers,
            lambda_w:      a.lambda_w,
            lambda_we:     a.lambda_we,
            batch_size:    a.batch_size,
            epochs:        a.epochs,
            lr:            a.lr,
            adagrad_reset: a.adagrad_reset,
            do_val:        a.do_val,
            seed:          a.seed,
        }
    }
}

/// All arguments for the `features` command
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    /// Directory where checkpoints were saved during training
    #[arg(long, default_value = "models")]
    pub model_dir: String,

    /// Processed dataset JSON (same tables as used during training)
    #[arg(long, default_value = "data/dataset.json")]
    pub data: String,

    /// Which fold to export: "train" or "dev"
    #[arg(long, default_value = "train")]
    pub fold: String,

    /// Output path for the JSON feature records
    #[arg(long, default_value = "features.json")]
    pub output: String,
}
