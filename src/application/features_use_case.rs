// ============================================================
// Layer 2 — FeaturesUseCase
// ============================================================
// Exports the hidden representations a trained model assigns to
// every word of every sentence in a dataset fold. A downstream
// classifier consumes these vectors; this crate only produces
// them.
//
// The workflow:
//
//   Step 1: Load the best checkpoint   (Layer 6 - infra)
//   Step 2: Load + resolve the dataset (Layer 4 - data)
//   Step 3: Consistency check — the dataset's vocabulary and
//           relation tables must be the ones the checkpoint was
//           trained against, or every index is meaningless
//   Step 4: Plain forward pass per tree (Layer 5 - ml)
//   Step 5: Write one JSON record per sentence
//
// The forward pass here never samples wrong answers and never
// computes a loss, so the output is deterministic.
//
// Reference: Iyyer et al. (2014) §5 (classifier features)

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::data::dataset::Corpus;
use crate::domain::tree::DepTree;
use crate::infra::checkpoint::{Checkpoint, CheckpointManager};
use crate::ml::forward::forward;
use crate::ml::params::Params;

/// One sentence's exported features.
#[derive(Debug, Serialize)]
struct FeatureRecord {
    qid:     Option<i64>,
    dist:    Option<usize>,
    answer:  String,

    /// One normalized hidden vector per word node, in parse
    /// position order (ROOT excluded)
    vectors: Vec<Vec<f64>>,
}

pub struct FeaturesUseCase {
    model_dir: String,
    data:      String,
    fold:      String,
    output:    String,
}

impl FeaturesUseCase {
    pub fn new(model_dir: String, data: String, fold: String, output: String) -> Self {
        Self { model_dir, data, fold, output }
    }

    pub fn execute(&self) -> Result<()> {
        // ── Step 1: Load the trained model ────────────────────────────────────
        let checkpoint = CheckpointManager::new(&self.model_dir).load_best()?;

        // ── Step 2: Load the dataset ──────────────────────────────────────────
        let mut corpus = Corpus::load(Path::new(&self.data))?;
        corpus.prefilter();

        // ── Step 3: Table consistency check ───────────────────────────────────
        verify_tables(&checkpoint, &corpus)?;

        let trees: &[DepTree] = match self.fold.as_str() {
            "train" => &corpus.train,
            "dev"   => &corpus.dev,
            other   => bail!("unknown fold '{other}' (expected 'train' or 'dev')"),
        };
        tracing::info!("Extracting features for {} '{}' sentences", trees.len(), self.fold);

        // ── Step 4: Forward pass per tree ─────────────────────────────────────
        let mut records = Vec::with_capacity(trees.len());
        for tree in trees {
            records.push(extract(&checkpoint.params, tree, &corpus.vocab)?);
        }

        // ── Step 5: Write the output file ─────────────────────────────────────
        let json = serde_json::to_string(&records)?;
        fs::write(&self.output, json)
            .with_context(|| format!("Cannot write features to '{}'", self.output))?;
        tracing::info!("Wrote {} feature records to '{}'", records.len(), self.output);
        Ok(())
    }
}

/// The checkpoint's tables must match the dataset's, index for
/// index. A mismatch means the dataset is not the one the model
/// was trained on.
fn verify_tables(checkpoint: &Checkpoint, corpus: &Corpus) -> Result<()> {
    if checkpoint.vocab != corpus.vocab {
        bail!(
            "checkpoint vocabulary ({} words) does not match dataset vocabulary ({} words)",
            checkpoint.vocab.len(),
            corpus.vocab.len()
        );
    }
    if checkpoint.relations != corpus.relations {
        bail!(
            "checkpoint relation table ({} relations) does not match dataset ({} relations)",
            checkpoint.relations.len(),
            corpus.relations.len()
        );
    }
    Ok(())
}

fn extract(params: &Params, tree: &DepTree, vocab: &[String]) -> Result<FeatureRecord> {
    let scratch = forward(params, tree)?;
    let vectors = tree
        .nodes
        .iter()
        .enumerate()
        .skip(1) // ROOT carries no feature of its own
        .filter(|(_, node)| node.is_word())
        .map(|(index, _)| scratch.nodes[index].p_norm.to_vec())
        .collect();
    Ok(FeatureRecord {
        qid:    tree.qid,
        dist:   tree.dist,
        answer: vocab[tree.ans].clone(),
        vectors,
    })
}
