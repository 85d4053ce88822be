// ============================================================
// Layer 5 — Parameter Store
// ============================================================
// All trainable tensors of the DT-RNN, and the bijection
// between their structured view and the single flat vector the
// optimizer works on.
//
// Structured view:
//   rel — one d×d composition matrix per dependency relation,
//         indexed by RelId in relation-table order
//   wv  — d×d matrix lifting a word embedding into hidden space
//   b   — bias vector of length d
//   we  — d×vocab embedding matrix, column j = embedding of word j
//
// Flat layout (pack/unpack are exact inverses of each other):
//   [rel[0] row-major | rel[1] | ... | wv row-major | b |
//    we column 0 | we column 1 | ... ]
//
// The embedding block is column-major by word id so that one
// word's embedding is a contiguous d-sized slice of the flat
// vector.
//
// Reference: Iyyer et al. (2014) §3

use ndarray::{Array1, Array2, Axis};
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::domain::error::StructuralError;

/// The structured view of every trainable tensor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Params {
    pub rel: Vec<Array2<f64>>,
    pub wv:  Array2<f64>,
    pub b:   Array1<f64>,
    pub we:  Array2<f64>,
}

/// Gradients are structurally identical to the parameters they
/// gradient, accumulated by summation and never aliased with them.
pub type Grads = Params;

impl Params {
    /// Hidden dimension d.
    pub fn dim(&self) -> usize {
        self.b.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.we.ncols()
    }

    pub fn n_relations(&self) -> usize {
        self.rel.len()
    }

    /// Length of the flat vector for a given shape.
    pub fn expected_len(d: usize, vocab: usize, relations: usize) -> usize {
        relations * d * d + d * d + d + d * vocab
    }

    /// All-zero store — the shape gradient accumulation starts from.
    pub fn zeros(d: usize, vocab: usize, relations: usize) -> Self {
        Self {
            rel: (0..relations).map(|_| Array2::zeros((d, d))).collect(),
            wv:  Array2::zeros((d, d)),
            b:   Array1::zeros(d),
            we:  Array2::zeros((d, vocab)),
        }
    }

    /// Random initialisation: composition matrices and wv uniform in
    /// ±√6/√(2d+1), embeddings uniform in ±√6/√(d+1), bias zero.
    /// Word2vec-style pre-trained embeddings should replace `we`
    /// whenever available — random columns converge noticeably slower.
    pub fn random<R: Rng>(d: usize, vocab: usize, relations: usize, rng: &mut R) -> Self {
        let r_mat = (6.0f64 / (2 * d + 1) as f64).sqrt();
        let r_emb = (6.0f64 / (d + 1) as f64).sqrt();
        let mut uniform = |rows: usize, cols: usize, r: f64| {
            Array2::from_shape_fn((rows, cols), |_| rng.gen_range(-r..r))
        };
        Self {
            rel: (0..relations).map(|_| uniform(d, d, r_mat)).collect(),
            wv:  uniform(d, d, r_mat),
            b:   Array1::zeros(d),
            we:  uniform(d, vocab, r_emb),
        }
    }

    /// Flatten into the optimizer's vector representation.
    pub fn pack(&self) -> Array1<f64> {
        let d = self.dim();
        let mut flat =
            Vec::with_capacity(Self::expected_len(d, self.vocab_size(), self.n_relations()));
        for m in &self.rel {
            flat.extend(m.iter());
        }
        flat.extend(self.wv.iter());
        flat.extend(self.b.iter());
        for col in self.we.axis_iter(Axis(1)) {
            flat.extend(col.iter());
        }
        Array1::from_vec(flat)
    }

    /// Rebuild the structured view from a flat vector. The exact
    /// length must match the declared shape — anything else is a
    /// dimension mismatch, not something to pad or truncate.
    pub fn unpack(
        flat:      &[f64],
        d:         usize,
        vocab:     usize,
        relations: usize,
    ) -> Result<Self, StructuralError> {
        let expected = Self::expected_len(d, vocab, relations);
        if flat.len() != expected {
            return Err(StructuralError::DimensionMismatch {
                found: flat.len(),
                expected,
                d,
                vocab,
                relations,
            });
        }

        let mat = d * d;
        let mut off = 0usize;

        let mut rel = Vec::with_capacity(relations);
        for _ in 0..relations {
            rel.push(take_matrix(flat, &mut off, d, d));
        }
        let wv = take_matrix(flat, &mut off, d, d);
        let b  = Array1::from_vec(flat[off..off + d].to_vec());
        off += d;

        let mut we = Array2::zeros((d, vocab));
        for j in 0..vocab {
            let col = &flat[off..off + d];
            for (i, &x) in col.iter().enumerate() {
                we[(i, j)] = x;
            }
            off += d;
        }

        debug_assert_eq!(off, relations * mat + mat + d + d * vocab);
        Ok(Self { rel, wv, b, we })
    }

    /// Elementwise accumulation (gradient reduction is a commutative
    /// sum, so reduction order never affects the result).
    pub fn accumulate(&mut self, other: &Self) {
        for (m, o) in self.rel.iter_mut().zip(&other.rel) {
            *m += o;
        }
        self.wv += &other.wv;
        self.b  += &other.b;
        self.we += &other.we;
    }

    /// Multiply every tensor by a scalar.
    pub fn scale(&mut self, factor: f64) {
        for m in &mut self.rel {
            *m *= factor;
        }
        self.wv *= factor;
        self.b  *= factor;
        self.we *= factor;
    }
}

fn take_matrix(flat: &[f64], off: &mut usize, rows: usize, cols: usize) -> Array2<f64> {
    let len = rows * cols;
    let m = Array2::from_shape_vec((rows, cols), flat[*off..*off + len].to_vec())
        .expect("slice length equals rows * cols");
    *off += len;
    m
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_pack_unpack_round_trip_from_structured() {
        let mut rng = StdRng::seed_from_u64(7);
        let params  = Params::random(3, 5, 2, &mut rng);

        let flat = params.pack();
        let back = Params::unpack(flat.as_slice().unwrap(), 3, 5, 2).unwrap();

        assert_eq!(params.wv, back.wv);
        assert_eq!(params.b, back.b);
        assert_eq!(params.we, back.we);
        for (a, b) in params.rel.iter().zip(&back.rel) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_unpack_pack_round_trip_from_flat() {
        let mut rng = StdRng::seed_from_u64(11);
        let len = Params::expected_len(2, 4, 3);
        let flat: Vec<f64> = (0..len).map(|_| rng.gen_range(-1.0..1.0)).collect();

        let params = Params::unpack(&flat, 2, 4, 3).unwrap();
        let packed = params.pack();

        assert_eq!(packed.as_slice().unwrap(), &flat[..]);
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let flat = vec![0.0; 10];
        let err  = Params::unpack(&flat, 3, 5, 2).unwrap_err();
        assert!(matches!(err, StructuralError::DimensionMismatch { found: 10, .. }));
    }

    #[test]
    fn test_embedding_block_is_column_major() {
        // With d=2, vocab=2 and no relations: [wv(4) | b(2) | we col 0 | we col 1]
        let flat = vec![
            0.0, 0.0, 0.0, 0.0, // wv
            0.0, 0.0,           // b
            1.0, 2.0,           // we[:,0]
            3.0, 4.0,           // we[:,1]
        ];
        let params = Params::unpack(&flat, 2, 2, 0).unwrap();
        assert_eq!(params.we[(0, 0)], 1.0);
        assert_eq!(params.we[(1, 0)], 2.0);
        assert_eq!(params.we[(0, 1)], 3.0);
        assert_eq!(params.we[(1, 1)], 4.0);
    }

    #[test]
    fn test_accumulate_and_scale() {
        let mut a = Params::zeros(2, 2, 1);
        let mut b = Params::zeros(2, 2, 1);
        b.b[0] = 2.0;
        b.rel[0][(1, 1)] = 4.0;

        a.accumulate(&b);
        a.accumulate(&b);
        a.scale(0.5);

        assert_eq!(a.b[0], 2.0);
        assert_eq!(a.rel[0][(1, 1)], 4.0);
    }
}
