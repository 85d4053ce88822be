// ============================================================
// Layer 3 — Core Traits (Abstractions)
// ============================================================
// The external QANTA pipeline scores a trained model with a
// separate logistic-regression harness. That harness is out of
// scope here, so the training loop only knows this seam: give
// it something that can turn (trees, parameters) into an
// accuracy number, and it will log that number on the
// validation cadence. The numbers are advisory — they never
// drive early stopping or any other control flow.
//
// The associated Params type keeps this layer free of ml-layer
// imports: the trainer instantiates the trait with its own
// parameter store type.
//
// Reference: Rust Book §10 (Traits: Defining Shared Behaviour)

use anyhow::Result;
use crate::domain::tree::DepTree;

// ─── Validator ────────────────────────────────────────────────────────────────
/// Any component that can score single-sentence answer accuracy
/// for a fold of trees under a given parameter store.
///
/// Implementations:
///   - AnswerRankValidator → ranks answers by activation dot product
///   - (external) the full classifier harness, out of scope here
pub trait Validator {
    /// The parameter store type the implementation evaluates with.
    type Params;

    /// Fraction of trees whose gold answer is ranked first, in [0, 1].
    fn accuracy(&self, trees: &[DepTree], params: &Self::Params) -> Result<f64>;
}
