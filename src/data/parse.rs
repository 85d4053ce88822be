// ============================================================
// Layer 4 — Parser Output Adapter
// ============================================================
// The dependency parser (external to this crate) describes one
// sentence as a flat list of relation triples:
//
//   (relation, [(governor position, governor token),
//               (dependent position, dependent token)])
//
// e.g. nsubj(finalized-5, john-1) becomes
//   { relation: "nsubj", endpoints: [(5, "finalized"), (1, "john")] }
//
// This module assembles those triples into the positional word
// array and edge list a DepTree is built from. Tokens are still
// strings here — vocabulary and relation-table resolution happens
// in the dataset loader, which owns the tables.
//
// A triple missing either endpoint is a fatal parse error, not
// something to paper over: it means the upstream parser output
// was truncated or corrupted.
//
// Reference: Stanford parser typed-dependency output format

use serde::{Deserialize, Serialize};

use crate::domain::error::StructuralError;

/// One typed dependency edge as emitted by the parser adapter.
/// `endpoints[0]` is the governor, `endpoints[1]` the dependent.
/// Kept as a Vec (not a fixed pair) so truncated parser output
/// surfaces as a checked MalformedParse instead of a decode error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationTriple {
    pub relation:  String,
    pub endpoints: Vec<(usize, String)>,
}

/// One sentence's worth of assembled parser output: a word (or
/// the non-word sentinel) per parse position, plus labelled edges.
#[derive(Debug, Clone)]
pub struct RawTree {
    /// Token per position; `None` for positions the parse never
    /// mentions (position 0 is the parser's synthetic ROOT token)
    pub words: Vec<Option<String>>,

    /// (governor position, dependent position, relation label)
    pub edges: Vec<(usize, usize, String)>,
}

impl RawTree {
    /// Raw sentence text (ROOT token excluded), for error messages.
    pub fn text(&self) -> String {
        self.words
            .iter()
            .skip(1)
            .flatten()
            .cloned()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Assemble one sentence's relation triples into a RawTree.
pub fn assemble(triples: &[RelationTriple]) -> Result<RawTree, StructuralError> {
    // ── Pass 1: find the highest parse position ───────────────────────────────
    let mut max_index = 0usize;
    for triple in triples {
        if triple.endpoints.len() != 2 {
            return Err(StructuralError::MalformedParse {
                relation: triple.relation.clone(),
                found:    triple.endpoints.len(),
            });
        }
        for &(index, _) in &triple.endpoints {
            max_index = max_index.max(index);
        }
    }

    // ── Pass 2: place tokens at their positions ───────────────────────────────
    let mut words: Vec<Option<String>> = vec![None; max_index + 1];
    for triple in triples {
        for (index, token) in &triple.endpoints {
            words[*index] = Some(token.clone());
        }
    }

    // ── Pass 3: collect labelled edges ────────────────────────────────────────
    let edges = triples
        .iter()
        .map(|t| (t.endpoints[0].0, t.endpoints[1].0, t.relation.clone()))
        .collect();

    Ok(RawTree { words, edges })
}
