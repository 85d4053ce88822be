// ============================================================
// Layer 3 — Dependency Tree Domain Type
// ============================================================
// The computation graph of the network is the dependency parse
// of one sentence. Each word has exactly one governing parent,
// labelled with a grammatical relation ("nsubj", "dobj", ...).
//
// Layout convention (inherited from the Stanford parser output):
//   - Nodes are indexed by parse position 0..max.
//   - Index 0 is a synthetic ROOT token. Its single child is the
//     true sentence head, resolved ONCE at build time and stored
//     in `head` — nothing downstream infers the head from
//     traversal order.
//   - Positions the parser never mentioned (e.g. punctuation
//     gaps) hold the non-word sentinel `word: None` and take no
//     part in any computation.
//
// Relation labels are resolved to dense integer ids against the
// dataset's relation table at load time, so a composition-matrix
// lookup is an array index, never a string hash.
//
// This struct is deliberately immutable during propagation: all
// per-pass scratch state (activations, deltas, losses) lives in
// `ml::forward::TreeScratch`, keyed by node index. That is what
// lets shard workers share `&DepTree` without any locking.
//
// Reference: Rust Book §5 (Structs)
//            de Marneffe & Manning (2008) Stanford typed dependencies

use serde::{Deserialize, Serialize};

use crate::domain::error::StructuralError;

/// Dense index into the dataset's ordered relation table.
pub type RelId = usize;

/// One parse position.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    /// Vocabulary index of the token, or `None` for the non-word
    /// sentinel (unmentioned position, or a failed parse at ROOT)
    pub word: Option<usize>,

    /// Outgoing dependency edges, in parse order
    pub kids: Vec<(usize, RelId)>,

    /// Incoming edge from the governing word. `None` for the ROOT
    /// node and for the sentence head (whose governor is ROOT)
    pub parent: Option<(usize, RelId)>,
}

impl Node {
    pub fn non_word() -> Self {
        Self { word: None, kids: Vec::new(), parent: None }
    }

    pub fn is_word(&self) -> bool {
        self.word.is_some()
    }
}

/// One sentence as a dependency tree, plus its answer annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepTree {
    /// Fixed node array indexed by parse position; index 0 is ROOT
    pub nodes: Vec<Node>,

    /// The true sentence head (ROOT's single child), if a root
    /// edge was present in the parse
    pub head: Option<usize>,

    /// Vocabulary index of the gold answer for this sentence
    pub ans: usize,

    /// Every candidate answer index except the gold one. Negatives
    /// for the margin-ranking loss are sampled from this list.
    pub neg_answers: Vec<usize>,

    /// Question id, if the dataset provides one (evaluation only)
    pub qid: Option<i64>,

    /// Position of this sentence within its question (evaluation only)
    pub dist: Option<usize>,

    /// Raw sentence text, kept solely for error messages and logs
    pub text: String,
}

impl DepTree {
    /// Number of parse positions (including ROOT and non-word gaps).
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &Node {
        &self.nodes[index]
    }

    /// The true sentence head, failing loudly on a headless parse.
    pub fn head(&self) -> Result<usize, StructuralError> {
        self.head
            .ok_or_else(|| StructuralError::MissingHead { text: self.text.clone() })
    }

    /// Indices of all word nodes, ROOT included (ROOT carries the
    /// parser's "ROOT" token and counts toward per-node averaging,
    /// even though it never receives its own activation).
    pub fn word_indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.nodes
            .iter()
            .enumerate()
            .filter(|(_, n)| n.is_word())
            .map(|(i, _)| i)
    }

    /// Number of word nodes, ROOT included.
    pub fn word_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_word()).count()
    }

    /// Check every structural invariant the engines rely on:
    ///
    ///   1. ROOT is a word (the parser did not fail on this sentence)
    ///   2. a root edge resolved the sentence head
    ///   3. every non-root word node except the head has exactly one
    ///      parent
    ///   4. every non-root word node is reachable from the head
    ///      (single connected component, no cycles)
    ///
    /// Trees failing any check must be excluded by the dataset
    /// pre-filter; the training loop never sees them.
    pub fn validate(&self) -> Result<(), StructuralError> {
        if self.nodes.is_empty() || !self.nodes[0].is_word() {
            return Err(StructuralError::MissingHeadWord { text: self.text.clone() });
        }
        let head = self.head()?;

        for (index, node) in self.nodes.iter().enumerate().skip(1) {
            if !node.is_word() {
                continue;
            }
            let parents = node.parent.iter().count();
            let expected = if index == head { 0 } else { 1 };
            if parents != expected {
                return Err(StructuralError::NotATree {
                    index,
                    parents,
                    text: self.text.clone(),
                });
            }
        }

        // Walk down from the head; every non-root word node must be
        // visited exactly once.
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![head];
        let mut visited = 0usize;
        while let Some(i) = stack.pop() {
            if seen[i] {
                return Err(StructuralError::NotATree {
                    index: i,
                    parents: 1,
                    text: self.text.clone(),
                });
            }
            seen[i] = true;
            visited += 1;
            for &(kid, _) in &self.nodes[i].kids {
                stack.push(kid);
            }
        }
        // word_count() includes ROOT, which the walk never visits
        if visited != self.word_count() - 1 {
            return Err(StructuralError::NotATree {
                index: head,
                parents: 0,
                text: self.text.clone(),
            });
        }

        Ok(())
    }
}
