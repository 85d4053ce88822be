// ============================================================
// Layer 5 — Advisory Validation
// ============================================================
// The full QANTA evaluation trains a separate classifier on the
// per-node activations; that harness lives outside this crate.
// For the training loop's periodic "is this going anywhere"
// signal we rank answers directly: average a sentence's
// normalised node activations and score every candidate answer
// by dot product with its embedding column. Crude, cheap, and
// purely advisory — the trainer only logs the number.

use anyhow::Result;

use crate::domain::traits::Validator;
use crate::domain::tree::DepTree;
use crate::ml::forward::forward;
use crate::ml::params::Params;

/// Ranks candidate answers by activation/embedding dot product.
pub struct AnswerRankValidator {
    /// Vocabulary indices of every candidate answer
    answers: Vec<usize>,
}

impl AnswerRankValidator {
    pub fn new(answers: Vec<usize>) -> Self {
        Self { answers }
    }
}

impl Validator for AnswerRankValidator {
    type Params = Params;

    fn accuracy(&self, trees: &[DepTree], params: &Params) -> Result<f64> {
        if trees.is_empty() || self.answers.is_empty() {
            return Ok(0.0);
        }

        let mut correct = 0usize;
        for tree in trees {
            let scratch = forward(params, tree)?;

            // Sentence representation: mean of the non-root word
            // nodes' normalised activations
            let mut mean = ndarray::Array1::<f64>::zeros(params.dim());
            let mut count = 0usize;
            for i in tree.word_indices().filter(|&i| i != 0) {
                mean += &scratch.nodes[i].p_norm;
                count += 1;
            }
            if count == 0 {
                continue;
            }
            mean /= count as f64;

            let best = self
                .answers
                .iter()
                .map(|&a| (a, params.we.column(a).dot(&mean)))
                .max_by(|x, y| x.1.total_cmp(&y.1))
                .map(|(a, _)| a);

            if best == Some(tree.ans) {
                correct += 1;
            }
        }

        Ok(correct as f64 / trees.len() as f64)
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::tree::Node;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tree() -> DepTree {
        DepTree {
            nodes: vec![
                Node { word: Some(0), kids: Vec::new(), parent: None },
                Node { word: Some(1), kids: Vec::new(), parent: Some((2, 0)) },
                Node { word: Some(2), kids: vec![(1, 0)], parent: None },
            ],
            head: Some(2),
            ans: 3,
            neg_answers: vec![4],
            qid: None,
            dist: None,
            text: "w1 w2".to_string(),
        }
    }

    #[test]
    fn test_accuracy_is_a_fraction() {
        let mut rng = StdRng::seed_from_u64(1);
        let params = Params::random(3, 5, 1, &mut rng);
        let v = AnswerRankValidator::new(vec![3, 4]);

        let acc = v.accuracy(&[tree(), tree()], &params).unwrap();
        assert!((0.0..=1.0).contains(&acc));
    }

    #[test]
    fn test_empty_fold_scores_zero() {
        let mut rng = StdRng::seed_from_u64(2);
        let params = Params::random(3, 5, 1, &mut rng);
        let v = AnswerRankValidator::new(vec![3, 4]);
        assert_eq!(v.accuracy(&[], &params).unwrap(), 0.0);
    }
}
