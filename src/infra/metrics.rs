// ============================================================
// Layer 6 — Metrics Logger
// ============================================================
// Records one CSV row per training epoch.
//
// Metrics recorded:
//   - epoch:      the epoch number (1, 2, 3, ...)
//   - epoch_loss: summed minibatch objective over the epoch
//   - best_loss:  lowest epoch loss seen so far in the run
//   - train_acc / val_acc: advisory accuracies, present only on
//     validation-cadence epochs (blank cells otherwise)
//
// Output file: {output_dir}/metrics.csv
//
// Example:
//   epoch,epoch_loss,best_loss,train_acc,val_acc
//   1,34.201893,34.201893,,
//   2,28.119406,28.119406,,
//   5,21.006310,21.006310,0.412000,0.305000
//
// Reference: Rust Book §12 (I/O and File Handling)

use anyhow::Result;
use std::{
    fs::{self, OpenOptions},
    io::Write,
    path::PathBuf,
};

/// One row of metrics data for a single training epoch.
#[derive(Debug, Clone)]
pub struct EpochMetrics {
    pub epoch:      usize,
    pub epoch_loss: f64,
    pub best_loss:  f64,
    pub train_acc:  Option<f64>,
    pub val_acc:    Option<f64>,
}

impl EpochMetrics {
    /// True when this epoch beat the previous best loss.
    pub fn is_improvement(&self, previous_best: f64) -> bool {
        self.epoch_loss < previous_best
    }
}

/// Appends epoch metrics to a CSV file for later analysis.
pub struct MetricsLogger {
    csv_path: PathBuf,
}

impl MetricsLogger {
    /// Create the logger, writing the CSV header if the file is new
    /// (appending across runs is allowed).
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        let csv_path = dir.join("metrics.csv");

        if !csv_path.exists() {
            let mut f = fs::File::create(&csv_path)?;
            writeln!(f, "epoch,epoch_loss,best_loss,train_acc,val_acc")?;
        }
        Ok(Self { csv_path })
    }

    /// Append one epoch's row.
    pub fn log(&self, m: &EpochMetrics) -> Result<()> {
        let mut f = OpenOptions::new().append(true).open(&self.csv_path)?;
        writeln!(
            f,
            "{},{:.6},{:.6},{},{}",
            m.epoch,
            m.epoch_loss,
            m.best_loss,
            fmt_opt(m.train_acc),
            fmt_opt(m.val_acc),
        )?;
        Ok(())
    }

    pub fn csv_path(&self) -> &PathBuf {
        &self.csv_path
    }
}

fn fmt_opt(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.6}")).unwrap_or_default()
}
