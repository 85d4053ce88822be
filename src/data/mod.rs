// ============================================================
// Layer 4 — Data Pipeline
// ============================================================
// This layer takes raw parser output all the way to training-ready
// dependency trees.
//
// The pipeline flows in this order:
//
//   relation triples (parser output)
//       │
//       ▼
//   parse.rs       → assembles triples into a raw word/edge form
//       │
//       ▼
//   dataset.rs     → resolves strings to indices, builds DepTrees,
//                    pre-filters structurally invalid parses
//       │
//       ▼
//   embeddings.rs  → optional pre-trained embedding matrix
//       │
//       ▼
//   training loop  (Layer 5)
//
// Each module is responsible for exactly one step.
// All string→index resolution happens here, exactly once; the
// ML layer only ever sees dense indices.
//
// Reference: Rust Book §13 (Iterators and Closures)

/// Assembles parser relation triples into raw word/edge form
pub mod parse;

/// Dataset loading, index resolution, and the structural pre-filter
pub mod dataset;

/// Pre-trained word embedding matrix loading
pub mod embeddings;
