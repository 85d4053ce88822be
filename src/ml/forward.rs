// ============================================================
// Layer 5 — Forward Engine
// ============================================================
// Bottom-up propagation over one dependency tree.
//
// Every word node receives
//   p      = tanh( Σ_kids W_rel(kid) · p_norm(kid)
//                  + wv · we[:,word] + b )
//   p_norm = p / ‖p‖₂
// where a leaf simply has no child sum. The synthetic ROOT is
// never computed — it copies its head's activation verbatim and
// contributes zero loss, because the parser's ROOT token carries
// no information.
//
// Ordering: a work-list re-queues any node whose children are
// not all finished yet. This reaches every node bottom-up
// without a precomputed topological order and must terminate
// because a (validated) tree is finite and acyclic.
//
// Loss (training passes only): a margin-ranking loss per node
// against a shuffled sample of at most MAX_WRONG_ANSWERS wrong
// answers. With base = 1 − gold·p_norm, every sampled negative a
// with base + a·p_norm > 0 adds that hinge term to the node loss
// and (a − gold) to the node's loss gradient. The reference
// implementation tracks a WARP-style rank factor alongside this
// accumulation but never multiplies it in; the effective
// behaviour — the plain sum over violating negatives — is what
// is preserved here.
//
// All per-pass state lives in TreeScratch, a side table parallel
// to the tree's node array. The tree itself is never mutated, so
// shard workers can share it read-only.
//
// Reference: Iyyer et al. (2014) §3-4
//            Weston et al. (2011) WSABIE / WARP loss

use std::collections::VecDeque;

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::domain::error::{ModelError, NumericError, StructuralError};
use crate::domain::tree::DepTree;
use crate::ml::params::Params;

/// Upper bound on sampled wrong answers per tree.
pub const MAX_WRONG_ANSWERS: usize = 100;

/// Per-node scratch state for one forward/backward pass.
#[derive(Debug, Clone)]
pub struct NodeScratch {
    /// Pre-normalisation activation tanh(·)
    pub p: Array1<f64>,

    /// Normalised activation p / ‖p‖₂ — the node's representation
    pub p_norm: Array1<f64>,

    /// Accumulated margin-ranking loss at this node
    pub loss: f64,

    /// Gradient of the node loss with respect to p_norm
    pub loss_grad: Array1<f64>,

    /// Set once the node's activation has been computed
    pub finished: bool,
}

/// Side table of per-pass state, keyed by node index. Owning the
/// scratch here (instead of mutable fields on the tree) is what
/// makes a forward pass free of hidden cross-pass state.
#[derive(Debug, Clone)]
pub struct TreeScratch {
    pub nodes: Vec<NodeScratch>,
}

impl TreeScratch {
    fn new(len: usize, d: usize) -> Self {
        let empty = NodeScratch {
            p:         Array1::zeros(d),
            p_norm:    Array1::zeros(d),
            loss:      0.0,
            loss_grad: Array1::zeros(d),
            finished:  false,
        };
        Self { nodes: vec![empty; len] }
    }

    /// Tree-level loss: the sum over all nodes (ROOT holds zero).
    pub fn total_loss(&self) -> f64 {
        self.nodes.iter().map(|n| n.loss).sum()
    }
}

/// Feature-computation pass: activations only, no loss, no
/// randomness. Two calls with the same inputs are bit-identical.
pub fn forward(params: &Params, tree: &DepTree) -> Result<TreeScratch, ModelError> {
    run(params, tree, None)
}

/// Training pass: activations plus per-node loss and loss gradient
/// against a freshly shuffled negative-answer sample.
pub fn forward_with_loss(
    params: &Params,
    tree:   &DepTree,
    rng:    &mut StdRng,
) -> Result<TreeScratch, ModelError> {
    let mut wrong = tree.neg_answers.clone();
    wrong.shuffle(rng);
    wrong.truncate(MAX_WRONG_ANSWERS);
    run(params, tree, Some(&wrong))
}

fn run(
    params: &Params,
    tree:   &DepTree,
    wrong:  Option<&[usize]>,
) -> Result<TreeScratch, ModelError> {
    let d = params.dim();
    let mut scratch = TreeScratch::new(tree.len(), d);

    // Work-list over every word node except the synthetic ROOT.
    let mut to_do: VecDeque<usize> = tree.word_indices().filter(|&i| i != 0).collect();

    while let Some(index) = to_do.pop_front() {
        let node = tree.node(index);

        // Children first: re-queue until all kids are finished.
        if !node.kids.iter().all(|&(kid, _)| scratch.nodes[kid].finished) {
            to_do.push_back(index);
            continue;
        }

        // word_indices() only yields word nodes
        let word = node.word.ok_or_else(|| StructuralError::MissingHeadWord {
            text: tree.text.clone(),
        })?;

        let mut z = params.wv.dot(&params.we.column(word)) + &params.b;
        for &(kid, rel) in &node.kids {
            let w = params.rel.get(rel).ok_or(StructuralError::RelationOutOfRange {
                id:    rel,
                known: params.rel.len(),
            })?;
            z += &w.dot(&scratch.nodes[kid].p_norm);
        }

        let p = z.mapv(f64::tanh);
        let norm = p.dot(&p).sqrt();
        if !norm.is_finite() || norm == 0.0 {
            return Err(NumericError::ZeroNorm { node: index, text: tree.text.clone() }.into());
        }
        let p_norm = &p / norm;

        if let Some(wrong) = wrong {
            let (loss, loss_grad) = node_loss(params, tree.ans, wrong, p_norm.view(), d);
            scratch.nodes[index].loss = loss;
            scratch.nodes[index].loss_grad = loss_grad;
        }

        scratch.nodes[index].p = p;
        scratch.nodes[index].p_norm = p_norm;
        scratch.nodes[index].finished = true;
    }

    // The ROOT never gets its own activation: it passes its single
    // child through verbatim, with zero loss.
    let head = tree.head()?;
    scratch.nodes[0].p = scratch.nodes[head].p.clone();
    scratch.nodes[0].p_norm = scratch.nodes[head].p_norm.clone();
    scratch.nodes[0].finished = true;

    Ok(scratch)
}

/// Margin-ranking loss at one node: every sampled wrong answer
/// whose hinge term is strictly positive contributes to the loss
/// and to the gradient with respect to p_norm.
fn node_loss(
    params: &Params,
    ans:    usize,
    wrong:  &[usize],
    p_norm: ArrayView1<f64>,
    d:      usize,
) -> (f64, Array1<f64>) {
    let gold = params.we.column(ans);
    let base = 1.0 - gold.dot(&p_norm);

    let mut loss = 0.0;
    let mut grad = Array1::zeros(d);
    for &a in wrong {
        let neg = params.we.column(a);
        let err = base + neg.dot(&p_norm);
        if err > 0.0 {
            loss += err;
            grad += &(&neg - &gold);
        }
    }
    (loss, grad)
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::Node;
    use rand::SeedableRng;

    /// ROOT(0) → likes(3); likes → dog(1), cat(4); dog → the(2).
    /// Answers are vocabulary ids 5 and 6.
    fn toy_tree() -> DepTree {
        DepTree {
            nodes: vec![
                Node { word: Some(0), kids: Vec::new(), parent: None },
                Node { word: Some(1), kids: vec![(2, 0)], parent: Some((3, 0)) },
                Node { word: Some(2), kids: Vec::new(), parent: Some((1, 0)) },
                Node { word: Some(3), kids: vec![(1, 0), (4, 1)], parent: None },
                Node { word: Some(4), kids: Vec::new(), parent: Some((3, 1)) },
            ],
            head: Some(3),
            ans: 5,
            neg_answers: vec![6],
            qid: None,
            dist: None,
            text: "the dog likes cat".to_string(),
        }
    }

    fn toy_params(seed: u64) -> Params {
        let mut rng = StdRng::seed_from_u64(seed);
        Params::random(4, 7, 2, &mut rng)
    }

    #[test]
    fn test_forward_is_deterministic_without_loss() {
        let params = toy_params(3);
        let tree   = toy_tree();

        let a = forward(&params, &tree).unwrap();
        let b = forward(&params, &tree).unwrap();

        for (x, y) in a.nodes.iter().zip(&b.nodes) {
            assert_eq!(x.p, y.p);
            assert_eq!(x.p_norm, y.p_norm);
        }
    }

    #[test]
    fn test_root_passes_head_through() {
        let params  = toy_params(4);
        let tree    = toy_tree();
        let scratch = forward(&params, &tree).unwrap();

        assert_eq!(scratch.nodes[0].p, scratch.nodes[3].p);
        assert_eq!(scratch.nodes[0].p_norm, scratch.nodes[3].p_norm);
        assert_eq!(scratch.nodes[0].loss, 0.0);
    }

    #[test]
    fn test_activations_are_unit_length() {
        let params  = toy_params(5);
        let tree    = toy_tree();
        let scratch = forward(&params, &tree).unwrap();

        for i in tree.word_indices() {
            let n = &scratch.nodes[i];
            let norm = n.p_norm.dot(&n.p_norm).sqrt();
            assert!((norm - 1.0).abs() < 1e-12, "node {i} norm {norm}");
        }
    }

    #[test]
    fn test_loss_is_non_negative() {
        let tree = toy_tree();
        for seed in 0..20 {
            let params  = toy_params(seed);
            let mut rng = StdRng::seed_from_u64(seed);
            let scratch = forward_with_loss(&params, &tree, &mut rng).unwrap();
            assert!(scratch.total_loss() >= 0.0);
        }
    }

    #[test]
    fn test_loss_is_stable_across_shuffles() {
        // With the negative pool inside the sample bound, the set of
        // violating negatives does not depend on shuffle order, so
        // the loss must not either.
        let params = toy_params(9);
        let tree   = toy_tree();

        let mut losses = Vec::new();
        for seed in 0..5 {
            let mut rng = StdRng::seed_from_u64(seed);
            let scratch = forward_with_loss(&params, &tree, &mut rng).unwrap();
            losses.push(scratch.total_loss());
        }
        for w in losses.windows(2) {
            assert!((w[0] - w[1]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_relation_is_fatal() {
        let params = toy_params(6);
        let mut tree = toy_tree();
        // relation id 9 has no composition matrix
        tree.nodes[3].kids[0].1 = 9;

        let err = forward(&params, &tree).unwrap_err();
        assert!(matches!(
            err,
            ModelError::Structural(StructuralError::RelationOutOfRange { id: 9, .. })
        ));
    }
}
