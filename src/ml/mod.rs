// ============================================================
// Layer 5 — ML / Model Layer
// ============================================================
// This layer contains ALL the numerical code — every ndarray
// operation in the crate lives here. No other layer does math.
//
// What's in this layer:
//
//   params.rs    — The parameter store
//                  Per-relation composition matrices, the word
//                  lift matrix, the bias, and the embedding
//                  matrix, with a lossless pack/unpack bijection
//                  to one flat vector for the optimiser
//
//   forward.rs   — Forward propagation over a dependency tree
//                  Bottom-up normalized-tanh composition, with
//                  an optional margin-ranking loss pass over
//                  sampled wrong answers
//
//   backward.rs  — Backward propagation
//                  Reverse traversal accumulating exact
//                  gradients for every parameter block
//
//   objective.rs — The parallel minibatch aggregator
//                  Fans trees out to rayon workers, sums loss
//                  and gradient shards, applies L2 terms
//
//   adagrad.rs   — The Adagrad optimiser over the flat vector
//
//   trainer.rs   — The epoch/minibatch training loop
//                  Shuffling, updates, checkpoint-best saving,
//                  periodic optimiser resets, advisory validation
//
//   validate.rs  — Answer-ranking accuracy for validation
//
// Reference: Iyyer et al. (2014) A Neural Network for Factoid
//            Question Answering over Paragraphs
//            Duchi et al. (2011) Adaptive Subgradient Methods

/// Parameter store with the flat-vector pack/unpack bijection
pub mod params;

/// Bottom-up forward propagation and the ranking loss
pub mod forward;

/// Reverse-traversal gradient accumulation
pub mod backward;

/// Parallel minibatch objective aggregator
pub mod objective;

/// Adagrad optimiser over the packed parameter vector
pub mod adagrad;

/// Epoch/minibatch training loop
pub mod trainer;

/// Answer-ranking validation accuracy
pub mod validate;
