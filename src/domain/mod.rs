// ============================================================
// Layer 3 — Domain Layer
// ============================================================
// Pure Rust types defining what the system computes over:
// dependency trees, the error taxonomy, and the validator seam.
//
// Rules for this layer:
//   - NO linear-algebra code or ndarray math
//   - NO file I/O
//   - NO training logic
//   - Only plain structs, enums, and traits
//
// Why keep this layer pure?
//   - The engines (Layer 5) can be tested against tiny
//     hand-built trees with no I/O at all
//   - Tree invariants live next to the type that owns them
//
// Reference: Rust Book §5 (Structs), §10 (Traits)

// A sentence as a dependency tree of word nodes
pub mod tree;

// StructuralError / NumericError / ConfigurationError / ModelError
pub mod error;

// The advisory validation seam
pub mod traits;
