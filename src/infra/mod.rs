// ============================================================
// Layer 6 — Infrastructure Layer
// ============================================================
// Handles all cross-cutting concerns that don't belong in
// any specific business layer:
//
//   checkpoint.rs — Saving and loading model parameters
//                   Serialises the parameter store together with
//                   its relation table and vocabulary as JSON, so
//                   a checkpoint is self-describing. Also saves
//                   and loads TrainConfig so a later run can
//                   rebuild the exact same model shape.
//
//   metrics.rs    — Training metrics logging
//                   Writes epoch-level metrics (loss, advisory
//                   accuracies) to a CSV file for later analysis
//                   and plotting.
//
// Why is this a separate layer?
//   These concerns are used by multiple other layers but
//   don't belong to any one of them. Keeping them here:
//   - Prevents duplication across layers
//   - Makes it easy to swap implementations
//   - Keeps other layers focused on their core logic
//
// Reference: Rust Book §7 (Modules)
//            Rust Book §9 (Error Handling with anyhow)

/// Model checkpoint saving and loading
pub mod checkpoint;

/// Training metrics CSV logger
pub mod metrics;
