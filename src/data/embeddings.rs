// ============================================================
// Layer 4 — Initial Word Embeddings
// ============================================================
// Loads a pre-trained embedding matrix (word2vec or similar)
// from JSON: one row of d floats per vocabulary word, in
// vocabulary order. Smart initialisation significantly helps
// both accuracy and training time; training falls back to random
// columns (Params::random) when no file is given, which
// converges slower and to a worse local minimum.
//
// Reference: Mikolov et al. (2013) word2vec

use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use ndarray::Array2;

/// Load a d × vocab embedding matrix. The file stores one row per
/// word; columns of the returned matrix are embeddings, matching
/// the Parameter Store convention.
pub fn load_embeddings(path: &Path, d: usize, vocab: usize) -> Result<Array2<f64>> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("Cannot read embeddings '{}'", path.display()))?;
    let rows: Vec<Vec<f64>> = serde_json::from_str(&json)
        .with_context(|| format!("Cannot decode embeddings '{}'", path.display()))?;

    if rows.len() != vocab {
        bail!(
            "embeddings '{}' cover {} words, vocabulary has {}",
            path.display(),
            rows.len(),
            vocab
        );
    }

    let mut we = Array2::zeros((d, vocab));
    for (j, row) in rows.iter().enumerate() {
        if row.len() != d {
            bail!(
                "embedding row {} has dimension {}, expected {}",
                j,
                row.len(),
                d
            );
        }
        for (i, &x) in row.iter().enumerate() {
            we[(i, j)] = x;
        }
    }
    Ok(we)
}
