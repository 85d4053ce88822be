// ============================================================
// Layer 5 — Gradient Aggregator
// ============================================================
// Computes one minibatch's objective and gradient by fanning the
// trees out over independent shard workers:
//
//   1. Partition the minibatch into `workers` contiguous shards
//      (the last shard absorbs the remainder of an uneven split)
//   2. Every shard runs forward+backward over its trees with a
//      read-only view of the parameters and its own RNG
//   3. Reduce: sum losses, gradients and node counts; divide by
//      the total node count (mean per node, not per tree)
//   4. Add L2 regularisation for the composition matrices (λ_W)
//      and the embedding matrix (λ_We); the bias is never
//      regularised
//
// Concurrency contract: workers share no mutable state — the
// parameters are borrowed immutably, each worker owns its shard's
// scratch tables, and the only synchronisation point is the final
// reduction, which is a commutative sum. Negative-answer sampling
// is seeded per tree by the tree's position in the minibatch, so
// the result does not depend on how the batch was sharded.
//
// A worker failure aborts the whole minibatch; there is no
// partial or degraded aggregation and no retry.
//
// Reference: rayon parallel iterators; Iyyer et al. (2014) §4

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;

use crate::domain::error::ModelError;
use crate::domain::tree::DepTree;
use crate::ml::backward::backward;
use crate::ml::forward::forward_with_loss;
use crate::ml::params::{Grads, Params};

/// The two regularisation weights: composition matrices (and wv)
/// use `w`, the embedding matrix uses `we`.
#[derive(Debug, Clone, Copy)]
pub struct Lambdas {
    pub w:  f64,
    pub we: f64,
}

struct ShardResult {
    loss:  f64,
    grads: Grads,
    nodes: usize,
}

/// Objective and packed gradient for one minibatch of trees.
pub fn aggregate(
    workers: usize,
    trees:   &[DepTree],
    params:  &Params,
    lambdas: Lambdas,
    seed:    u64,
) -> Result<(f64, Array1<f64>), ModelError> {
    let d = params.dim();
    let vocab = params.vocab_size();
    let relations = params.n_relations();

    if trees.is_empty() {
        return Ok((0.0, Grads::zeros(d, vocab, relations).pack()));
    }

    // ── Contiguous shards; the last one may be larger ─────────────────────────
    let workers = workers.max(1);
    let shard_size = (trees.len() / workers).max(1);
    let mut shards: Vec<(usize, &[DepTree])> = Vec::with_capacity(workers);
    let mut start = 0usize;
    for w in 0..workers {
        if start >= trees.len() {
            break;
        }
        let end = if w == workers - 1 {
            trees.len()
        } else {
            (start + shard_size).min(trees.len())
        };
        shards.push((start, &trees[start..end]));
        start = end;
    }

    // ── Parallel fan-out; any shard error aborts the minibatch ────────────────
    let partials: Vec<ShardResult> = shards
        .into_par_iter()
        .enumerate()
        .map(|(shard_index, (offset, shard))| {
            shard_objective(params, shard, offset, seed).map_err(|source| ModelError::Worker {
                shard:  shard_index,
                source: Box::new(source),
            })
        })
        .collect::<Result<Vec<_>, ModelError>>()?;

    // ── Order-independent reduction ───────────────────────────────────────────
    let mut total = Grads::zeros(d, vocab, relations);
    let mut loss = 0.0;
    let mut nodes = 0usize;
    for partial in &partials {
        loss += partial.loss;
        nodes += partial.nodes;
        total.accumulate(&partial.grads);
    }

    // Mean per node, not per tree
    let scale = 1.0 / nodes as f64;
    total.scale(scale);
    let mut cost = loss * scale;

    // ── L2 regularisation (bias excluded) ─────────────────────────────────────
    for (grad_m, param_m) in total.rel.iter_mut().zip(&params.rel) {
        cost += 0.5 * lambdas.w * param_m.mapv(|x| x * x).sum();
        *grad_m += &(param_m * lambdas.w);
    }
    cost += 0.5 * lambdas.w * params.wv.mapv(|x| x * x).sum();
    total.wv += &(&params.wv * lambdas.w);

    cost += 0.5 * lambdas.we * params.we.mapv(|x| x * x).sum();
    total.we += &(&params.we * lambdas.we);

    Ok((cost, total.pack()))
}

/// One worker's share: forward+backward over every tree in the
/// shard. `offset` is the shard's position in the minibatch so the
/// per-tree RNG seed is identical however the batch is sharded.
fn shard_objective(
    params: &Params,
    shard:  &[DepTree],
    offset: usize,
    seed:   u64,
) -> Result<ShardResult, ModelError> {
    let mut grads = Grads::zeros(params.dim(), params.vocab_size(), params.n_relations());
    let mut loss = 0.0;
    let mut nodes = 0usize;

    for (i, tree) in shard.iter().enumerate() {
        let mut rng = StdRng::seed_from_u64(seed.wrapping_add((offset + i) as u64));
        let scratch = forward_with_loss(params, tree, &mut rng)?;
        loss += scratch.total_loss();
        nodes += tree.word_count();
        backward(params, tree, &scratch, &mut grads)?;
    }

    Ok(ShardResult { loss, grads, nodes })
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::Node;

    /// ROOT → head word, head word → one dependent. Words vary per
    /// tree so the embedding gradient is spread across the matrix.
    fn tree(head_word: usize, kid_word: usize, ans: usize, neg: usize) -> DepTree {
        DepTree {
            nodes: vec![
                Node { word: Some(0), kids: Vec::new(), parent: None },
                Node { word: Some(kid_word), kids: Vec::new(), parent: Some((2, 0)) },
                Node { word: Some(head_word), kids: vec![(1, 0)], parent: None },
            ],
            head: Some(2),
            ans,
            neg_answers: vec![neg],
            qid: None,
            dist: None,
            text: format!("w{kid_word} w{head_word}"),
        }
    }

    fn batch() -> Vec<DepTree> {
        (0..8)
            .map(|i| tree(1 + (i % 3), 4 + (i % 2), 6 + (i % 2), 7 - (i % 2)))
            .collect()
    }

    #[test]
    fn test_reduction_invariant_under_shard_count() {
        let mut rng = StdRng::seed_from_u64(21);
        let params = Params::random(3, 8, 1, &mut rng);
        let lambdas = Lambdas { w: 0.1, we: 0.01 };
        let trees = batch();

        let (l1, g1) = aggregate(1, &trees, &params, lambdas, 5).unwrap();
        let (l2, g2) = aggregate(2, &trees, &params, lambdas, 5).unwrap();
        let (l4, g4) = aggregate(4, &trees, &params, lambdas, 5).unwrap();

        assert!((l1 - l2).abs() < 1e-9);
        assert!((l1 - l4).abs() < 1e-9);
        for i in 0..g1.len() {
            assert!((g1[i] - g2[i]).abs() < 1e-9);
            assert!((g1[i] - g4[i]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_uneven_split_accepts_remainder() {
        // 8 trees over 3 workers: shards of 2, 2 and 4
        let mut rng = StdRng::seed_from_u64(22);
        let params = Params::random(2, 8, 1, &mut rng);
        let trees = batch();

        let (even, _) = aggregate(1, &trees, &params, Lambdas { w: 0.0, we: 0.0 }, 5).unwrap();
        let (uneven, _) = aggregate(3, &trees, &params, Lambdas { w: 0.0, we: 0.0 }, 5).unwrap();
        assert!((even - uneven).abs() < 1e-9);
    }

    #[test]
    fn test_bias_is_never_regularised() {
        let mut rng = StdRng::seed_from_u64(23);
        let mut params = Params::random(2, 8, 1, &mut rng);
        params.b.fill(10.0); // huge bias must not show up in the cost
        let trees = batch();

        let (no_reg, _) = aggregate(1, &trees, &params, Lambdas { w: 0.0, we: 0.0 }, 5).unwrap();
        let (reg, _) = aggregate(1, &trees, &params, Lambdas { w: 1.0, we: 0.0 }, 5).unwrap();

        let matrices: f64 = params
            .rel
            .iter()
            .map(|m| m.mapv(|x| x * x).sum())
            .sum::<f64>()
            + params.wv.mapv(|x| x * x).sum();
        assert!((reg - no_reg - 0.5 * matrices).abs() < 1e-9);
    }

    #[test]
    fn test_worker_failure_aborts_minibatch() {
        let mut rng = StdRng::seed_from_u64(24);
        let params = Params::random(2, 8, 1, &mut rng);
        let mut trees = batch();
        trees[5].nodes[2].kids[0].1 = 42; // unknown relation in one tree

        let err = aggregate(4, &trees, &params, Lambdas { w: 0.0, we: 0.0 }, 5).unwrap_err();
        assert!(matches!(err, ModelError::Worker { .. }));
    }

    #[test]
    fn test_empty_batch_yields_zero() {
        let mut rng = StdRng::seed_from_u64(25);
        let params = Params::random(2, 8, 1, &mut rng);
        let (loss, grad) = aggregate(4, &[], &params, Lambdas { w: 0.0, we: 0.0 }, 5).unwrap();
        assert_eq!(loss, 0.0);
        assert!(grad.iter().all(|&x| x == 0.0));
    }
}
