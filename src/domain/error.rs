// ============================================================
// Layer 3 — Error Taxonomy
// ============================================================
// Every failure the core can produce falls into one of four
// categories:
//
//   StructuralError     — a malformed tree or parameter vector.
//                         Carries the offending sentence text
//                         where available so bad parses can be
//                         debugged from the log alone.
//   NumericError        — a degenerate value during propagation
//                         (zero-magnitude activation). Indicates
//                         a data or initialisation problem and is
//                         never masked with an epsilon.
//   ConfigurationError  — invalid hyperparameters or paths at
//                         startup. Fail fast, no retry.
//   ModelError::Worker  — a gradient worker failed; the whole
//                         minibatch is aborted, never partially
//                         aggregated.
//
// Nothing in the core retries automatically. The only recovery
// mechanism is the explicit pre-filter pass that removes invalid
// trees from a dataset before training begins.
//
// Reference: Rust Book §9 (Error Handling)

use thiserror::Error;

/// A tree or parameter vector that violates the data model.
/// These are fatal for the tree (or run) that produced them.
#[derive(Debug, Error)]
pub enum StructuralError {
    /// A relation triple from the parser is missing one of its
    /// two (position, token) endpoints.
    #[error("malformed relation triple '{relation}': expected 2 endpoints, found {found}")]
    MalformedParse { relation: String, found: usize },

    /// The synthetic ROOT node carries the non-word sentinel —
    /// the parser failed on this sentence.
    #[error("tree root is not a word (parser failure): '{text}'")]
    MissingHeadWord { text: String },

    /// No root edge was found, so the true sentence head is unknown.
    #[error("tree has no head (no root edge): '{text}'")]
    MissingHead { text: String },

    /// More than one root edge claims to introduce the sentence head.
    #[error("tree has more than one root edge: '{text}'")]
    DuplicateHead { text: String },

    /// A non-root node has zero or multiple parents, or is not
    /// reachable from the head — the edges do not form a tree.
    #[error("node {index} breaks the tree shape ({parents} parent edges): '{text}'")]
    NotATree { index: usize, parents: usize, text: String },

    /// A token is not present in the vocabulary the dataset declared.
    #[error("word '{word}' is not in the vocabulary")]
    UnknownWord { word: String },

    /// A relation label is not in the dataset's relation table.
    #[error("unknown dependency relation '{label}'")]
    UnknownRelation { label: String },

    /// A relation id survived data loading but has no composition
    /// matrix — the parameter store and the data disagree.
    #[error("relation id {id} out of range ({known} composition matrices)")]
    RelationOutOfRange { id: usize, known: usize },

    /// A flat vector handed to unpack has the wrong length for the
    /// declared (d, vocabulary, relations) shape.
    #[error("parameter vector has length {found}, expected {expected} (d={d}, vocab={vocab}, relations={relations})")]
    DimensionMismatch {
        found:     usize,
        expected:  usize,
        d:         usize,
        vocab:     usize,
        relations: usize,
    },
}

/// A degenerate numeric value during forward propagation.
#[derive(Debug, Error)]
pub enum NumericError {
    /// The pre-normalisation activation has zero (or non-finite)
    /// magnitude, so the normalised activation is undefined.
    #[error("zero-magnitude activation at node {node}: '{text}'")]
    ZeroNorm { node: usize, text: String },
}

/// Invalid hyperparameters or paths detected before any computation.
#[derive(Debug, Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigurationError(pub String);

/// Anything the forward/backward/aggregation path can fail with.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error(transparent)]
    Structural(#[from] StructuralError),

    #[error(transparent)]
    Numeric(#[from] NumericError),

    /// A shard worker failed during the parallel phase. The minibatch
    /// is aborted; there is no partial or degraded aggregation.
    #[error("gradient worker {shard} failed")]
    Worker {
        shard: usize,
        #[source]
        source: Box<ModelError>,
    },
}
