// ============================================================
// Layer 4 — Dataset Loader
// ============================================================
// Loads a processed QA dataset from one JSON file:
//
//   {
//     "vocab":     ["ROOT", "the", ...],   every token + answer
//     "relations": ["root", "nsubj", ...], ordered relation labels
//     "answers":   ["lincoln", ...],       candidate answer tokens
//     "folds": {
//       "train": [ { "edges": [...], "answer": "...",
//                    "qid": 7, "dist": 0 }, ... ],
//       "dev":   [ ... ]
//     }
//   }
//
// Loading does all string→index resolution exactly once:
//   - tokens against `vocab` (an unknown token is a fatal load
//     error — the dataset is inconsistent with its own tables)
//   - relation labels against the TRAINABLE relation table, which
//     is `relations` minus "root": the synthetic root edge is
//     modelled as the tree's explicit head, never as a
//     composition-matrix edge
//   - the gold answer against `vocab`, with every other candidate
//     answer forming the tree's negative list
//
// After resolution the pre-filter removes structurally invalid
// trees (parser failures) so the training loop never sees one —
// recovery happens here, explicitly, or not at all.
//
// Reference: Iyyer et al. (2014) dataset preparation
//            Rust Book §9 (Error Handling)

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::data::parse::{assemble, RawTree, RelationTriple};
use crate::domain::error::StructuralError;
use crate::domain::tree::{DepTree, Node};

/// The relation label of the synthetic root edge; excluded from
/// the trainable relation table.
pub const ROOT_RELATION: &str = "root";

// ─── On-disk schema ───────────────────────────────────────────────────────────
#[derive(Debug, Deserialize)]
struct DatasetFile {
    vocab:     Vec<String>,
    relations: Vec<String>,
    answers:   Vec<String>,
    folds:     HashMap<String, Vec<SentenceRecord>>,
}

#[derive(Debug, Deserialize)]
struct SentenceRecord {
    edges:  Vec<RelationTriple>,
    answer: String,
    #[serde(default)]
    qid:    Option<i64>,
    #[serde(default)]
    dist:   Option<usize>,
}

// ─── In-memory corpus ─────────────────────────────────────────────────────────
/// A fully resolved dataset: index tables plus tree folds.
#[derive(Debug, Clone)]
pub struct Corpus {
    pub vocab: Vec<String>,

    /// Trainable relation labels in table order ("root" removed);
    /// RelIds on every tree index into this list
    pub relations: Vec<String>,

    /// Vocabulary indices of every candidate answer
    pub answers: Vec<usize>,

    pub train: Vec<DepTree>,
    pub dev:   Vec<DepTree>,
}

impl Corpus {
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Cannot read dataset '{}'", path.display()))?;
        Self::from_json(&json)
            .with_context(|| format!("Cannot decode dataset '{}'", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: DatasetFile = serde_json::from_str(json)?;

        // ── Index tables ──────────────────────────────────────────────────────
        let vocab_index: HashMap<&str, usize> = file
            .vocab
            .iter()
            .enumerate()
            .map(|(i, w)| (w.as_str(), i))
            .collect();

        // The root edge is structural, not compositional
        let relations: Vec<String> = file
            .relations
            .iter()
            .filter(|r| r.as_str() != ROOT_RELATION)
            .cloned()
            .collect();
        let rel_index: HashMap<&str, usize> = relations
            .iter()
            .enumerate()
            .map(|(i, r)| (r.as_str(), i))
            .collect();

        let answers = file
            .answers
            .iter()
            .map(|a| lookup_word(&vocab_index, a))
            .collect::<Result<Vec<_>, _>>()?;

        // ── Resolve every sentence in every fold ──────────────────────────────
        let resolve_fold = |name: &str| -> Result<Vec<DepTree>> {
            file.folds
                .get(name)
                .map(|sentences| {
                    sentences
                        .iter()
                        .map(|s| resolve(s, &vocab_index, &rel_index, &answers))
                        .collect::<Result<Vec<_>>>()
                })
                .unwrap_or_else(|| Ok(Vec::new()))
        };
        let train = resolve_fold("train")?;
        let dev   = resolve_fold("dev")?;

        tracing::info!(
            "Dataset: {} train / {} dev sentences, {} relations, {} answers, vocab {}",
            train.len(),
            dev.len(),
            relations.len(),
            answers.len(),
            file.vocab.len(),
        );

        Ok(Self { vocab: file.vocab, relations, answers, train, dev })
    }

    /// Remove structurally invalid trees (parser failures) from both
    /// folds before any training touches them. Returns how many
    /// trees were dropped.
    pub fn prefilter(&mut self) -> usize {
        let train_removed = prefilter_fold(&mut self.train, "train");
        let dev_removed   = prefilter_fold(&mut self.dev, "dev");
        train_removed + dev_removed
    }
}

fn prefilter_fold(trees: &mut Vec<DepTree>, fold: &str) -> usize {
    let before = trees.len();
    trees.retain(|tree| match tree.validate() {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!("Excluding bad {fold} tree: {err}");
            false
        }
    });
    before - trees.len()
}

fn lookup_word(vocab_index: &HashMap<&str, usize>, word: &str) -> Result<usize, StructuralError> {
    vocab_index
        .get(word)
        .copied()
        .ok_or_else(|| StructuralError::UnknownWord { word: word.to_string() })
}

/// Resolve one sentence record into a DepTree. Structural problems
/// that mean "bad parse" (no root edge, non-word ROOT) survive
/// resolution so the pre-filter can report and drop them; problems
/// that mean "dataset inconsistent with its own tables" (unknown
/// word or relation) fail the load immediately.
fn resolve(
    record:      &SentenceRecord,
    vocab_index: &HashMap<&str, usize>,
    rel_index:   &HashMap<&str, usize>,
    answers:     &[usize],
) -> Result<DepTree> {
    let raw: RawTree = assemble(&record.edges)?;
    let text = raw.text();

    let mut nodes: Vec<Node> = raw
        .words
        .iter()
        .map(|w| {
            Ok(match w {
                Some(token) => Node {
                    word:   Some(lookup_word(vocab_index, token)?),
                    kids:   Vec::new(),
                    parent: None,
                },
                None => Node::non_word(),
            })
        })
        .collect::<Result<Vec<_>, StructuralError>>()?;

    let mut head: Option<usize> = None;
    for (governor, dependent, relation) in &raw.edges {
        if *governor == 0 || relation == ROOT_RELATION {
            if head.is_some() {
                return Err(StructuralError::DuplicateHead { text }.into());
            }
            head = Some(*dependent);
            continue;
        }
        let rel = *rel_index
            .get(relation.as_str())
            .ok_or_else(|| StructuralError::UnknownRelation { label: relation.clone() })?;
        nodes[*governor].kids.push((*dependent, rel));
        nodes[*dependent].parent = Some((*governor, rel));
    }

    let ans = lookup_word(vocab_index, &record.answer)?;
    let neg_answers: Vec<usize> = answers.iter().copied().filter(|&a| a != ans).collect();

    Ok(DepTree {
        nodes,
        head,
        ans,
        neg_answers,
        qid: record.qid,
        dist: record.dist,
        text,
    })
}
