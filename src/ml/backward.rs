// ============================================================
// Layer 5 — Backward Engine
// ============================================================
// Reverse-mode gradients for one tree, consistent with the
// forward computation. Must only be called after a loss-mode
// forward pass over the same tree (the TreeScratch it produced
// carries the activations and loss gradients this pass reads).
//
// Top-down traversal from the sentence head, carrying the delta
// handed down by the parent (zero at the head). At each node:
//
//   delta = J_normtanh(p) · (parent_delta + loss_grad)
//
// where J_normtanh is the Jacobian of the normalised tanh — the
// normalisation is part of the forward computation, so its
// Jacobian is part of the chain rule:
//
//   J = diag(1 − p²)/‖p‖ − (p − p³) pᵀ / ‖p‖³
//
// Accumulation per node:
//   rel[r]  += delta ⊗ p_norm(kid)   for every child edge (kid, r)
//   wv      += delta ⊗ we[:,word]
//   b       += delta
//   we[:,w] += wvᵀ · delta           for the node's own word w
// and each child inherits rel[r]ᵀ · delta as its parent delta.
//
// The embedding columns of the gold/negative answers also appear
// in the loss directly; following the reference, gradients flow
// to `we` only through the composition path above — the answer
// columns are deliberately not updated through the loss terms.
//
// Any order that visits parents before children is correct; a
// stack-based DFS is used here. The synthetic ROOT is excluded —
// its pass-through contributes nothing trainable.
//
// Reference: Iyyer et al. (2014) §4, Goller & Küchler (1996)
//            backpropagation through structure

use ndarray::{Array1, Array2, ArrayView1, Axis};

use crate::domain::error::{ModelError, StructuralError};
use crate::domain::tree::DepTree;
use crate::ml::forward::TreeScratch;
use crate::ml::params::{Grads, Params};

/// Accumulate this tree's parameter gradients into `grads`.
pub fn backward(
    params:  &Params,
    tree:    &DepTree,
    scratch: &TreeScratch,
    grads:   &mut Grads,
) -> Result<(), ModelError> {
    let d = params.dim();
    let head = tree.head()?;

    // (node index, delta handed down by the parent)
    let mut to_do: Vec<(usize, Array1<f64>)> = vec![(head, Array1::zeros(d))];

    while let Some((index, parent_delta)) = to_do.pop() {
        let node = tree.node(index);
        let state = &scratch.nodes[index];

        let word = node.word.ok_or_else(|| StructuralError::MissingHeadWord {
            text: tree.text.clone(),
        })?;

        let incoming = &parent_delta + &state.loss_grad;
        let delta = normalized_tanh_jacobian(&state.p).dot(&incoming);

        for &(kid, rel) in &node.kids {
            let w = params.rel.get(rel).ok_or(StructuralError::RelationOutOfRange {
                id:    rel,
                known: params.rel.len(),
            })?;
            grads.rel[rel] += &outer(delta.view(), scratch.nodes[kid].p_norm.view());
            to_do.push((kid, w.t().dot(&delta)));
        }

        grads.wv += &outer(delta.view(), params.we.column(word));
        grads.b += &delta;
        let mut col = grads.we.column_mut(word);
        col += &params.wv.t().dot(&delta);
    }

    Ok(())
}

/// Jacobian of x ↦ tanh(x)/‖tanh(x)‖ evaluated via p = tanh(x).
fn normalized_tanh_jacobian(p: &Array1<f64>) -> Array2<f64> {
    let norm = p.dot(p).sqrt();
    let dia = Array2::from_diag(&p.mapv(|x| 1.0 - x * x)) / norm;
    let y = p.mapv(|x| x - x.powi(3));
    dia - outer(y.view(), p.view()) / norm.powi(3)
}

fn outer(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array2<f64> {
    let a = a.insert_axis(Axis(1));
    let b = b.insert_axis(Axis(0));
    a.dot(&b)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::Node;
    use crate::ml::forward::forward_with_loss;
    use crate::ml::objective::{aggregate, Lambdas};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    /// ROOT(0) → runs(3); runs → dog(2); dog → the(1).
    /// Vocabulary: ROOT the dog runs cat bird; answers cat(4), bird(5).
    fn chain_tree() -> DepTree {
        DepTree {
            nodes: vec![
                Node { word: Some(0), kids: Vec::new(), parent: None },
                Node { word: Some(1), kids: Vec::new(), parent: Some((2, 0)) },
                Node { word: Some(2), kids: vec![(1, 0)], parent: Some((3, 0)) },
                Node { word: Some(3), kids: vec![(2, 0)], parent: None },
            ],
            head: Some(3),
            ans: 4,
            neg_answers: vec![5],
            qid: None,
            dist: None,
            text: "the dog runs".to_string(),
        }
    }

    #[test]
    fn test_backward_leaves_root_untouched() {
        let mut rng = StdRng::seed_from_u64(2);
        let params  = crate::ml::params::Params::random(2, 6, 1, &mut rng);
        let tree    = chain_tree();

        let scratch = forward_with_loss(&params, &tree, &mut rng).unwrap();
        let mut grads = Grads::zeros(2, 6, 1);
        backward(&params, &tree, &scratch, &mut grads).unwrap();

        // ROOT's word column (id 0) receives no embedding gradient
        assert_eq!(grads.we.column(0).sum(), 0.0);
        // the words actually in the tree do
        assert!(grads.we.column(3).iter().any(|&x| x != 0.0));
    }

    /// Central-difference gradient check on a 3-word chain with one
    /// relation and d=2. The embedding columns of the gold and
    /// negative answers are skipped: their direct appearance in the
    /// loss is intentionally not backpropagated (see module header).
    #[test]
    fn test_gradients_match_central_differences() {
        let d = 2;
        let vocab = 6;
        let relations = 1;
        let lambdas = Lambdas { w: 0.0, we: 0.0 };
        let trees = vec![chain_tree()];

        let mut rng = StdRng::seed_from_u64(13);
        let flat = crate::ml::params::Params::random(d, vocab, relations, &mut rng).pack();

        let loss_at = |flat: &[f64]| -> f64 {
            let p = crate::ml::params::Params::unpack(flat, d, vocab, relations).unwrap();
            aggregate(1, &trees, &p, lambdas, 99).unwrap().0
        };

        let params = crate::ml::params::Params::unpack(flat.as_slice().unwrap(), d, vocab, relations)
            .unwrap();
        let (_, grad) = aggregate(1, &trees, &params, lambdas, 99).unwrap();

        // flat layout: [rel | wv | b | we columns]; answer columns 4, 5
        // occupy the last 2*d coordinates
        let n_checked = flat.len() - 2 * d;
        let h = 1e-5;
        for i in 0..n_checked {
            let mut plus = flat.to_vec();
            plus[i] += h;
            let mut minus = flat.to_vec();
            minus[i] -= h;

            let numeric = (loss_at(&plus) - loss_at(&minus)) / (2.0 * h);
            let analytic = grad[i];
            assert!(
                (numeric - analytic).abs() < 1e-4,
                "coordinate {i}: numeric {numeric} vs analytic {analytic}"
            );
        }
    }
}
