// ============================================================
// Layer 1 — CLI / Presentation Layer
// ============================================================
// This is the entry point for all user interaction.
// It uses the `clap` crate to parse command line arguments.
// All business logic is delegated to Layer 2 (application).
//
// Two commands are supported:
//   1. `train`    — trains the tree RNN on a processed dataset
//   2. `features` — exports hidden vectors from a checkpoint
//
// Reference: Rust Book §7 (Modules), §12 (CLI programs)

// Declare the commands submodule
pub mod commands;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, FeaturesArgs, TrainArgs};

/// The main CLI struct — clap reads the fields and generates
/// argument parsing code automatically via the Parser derive macro.
#[derive(Parser, Debug)]
#[command(
    name = "dtree-qa",
    version = "0.1.0",
    about = "Train a dependency-tree RNN for factoid QA, then export its features."
)]
pub struct Cli {
    /// The subcommand to run (train or features)
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Match on the subcommand and dispatch to the correct use case.
    /// This keeps the CLI layer thin — it only routes, never computes.
    pub fn run(self) -> Result<()> {
        match self.command {
            Commands::Train(args)    => Self::run_train(args),
            Commands::Features(args) => Self::run_features(args),
        }
    }

    /// Handles the `train` subcommand.
    /// Converts CLI args into a TrainConfig and hands off to Layer 2.
    fn run_train(args: TrainArgs) -> Result<()> {
        use crate::application::train_use_case::TrainUseCase;

        tracing::info!("Starting training on dataset: {}", args.data);

        // Convert CLI args → application config (separates presentation from domain)
        let use_case = TrainUseCase::new(args.into());
        use_case.execute()?;

        println!("Training complete. Checkpoint saved.");
        Ok(())
    }

    /// Handles the `features` subcommand.
    /// Loads the best checkpoint and writes feature vectors to disk.
    fn run_features(args: FeaturesArgs) -> Result<()> {
        use crate::application::features_use_case::FeaturesUseCase;

        let use_case = FeaturesUseCase::new(
            args.model_dir.clone(),
            args.data.clone(),
            args.fold.clone(),
            args.output.clone(),
        );
        use_case.execute()?;

        println!("Features written to {}", args.output);
        Ok(())
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_train_args_parse_and_dispatch() {
        let cli = Cli::try_parse_from(["dtree-qa", "train", "--epochs", "2", "--d", "10"])
            .unwrap();
        match cli.command {
            Commands::Train(args) => {
                assert_eq!(args.epochs, 2);
                assert_eq!(args.d, 10);
                assert_eq!(args.batch_size, 272); // default preserved
            }
            other => panic!("expected train, parsed {other:?}"),
        }
    }

    #[test]
    fn test_features_args_parse() {
        let cli = Cli::try_parse_from(["dtree-qa", "features", "--fold", "dev"]).unwrap();
        match cli.command {
            Commands::Features(args) => assert_eq!(args.fold, "dev"),
            other => panic!("expected features, parsed {other:?}"),
        }
    }
}
