// ============================================================
// Layer 5 — Adagrad Optimizer
// ============================================================
// Per-parameter adaptive learning rates:
//
//   h += g²                          (running squared-gradient sum)
//   update = lr · g / (ε + √h)       (elementwise)
//
// Parameters with a history of large gradients get small steps,
// rarely-updated parameters (most embedding columns) get large
// ones. reset() zeroes the history; called on a fixed epoch
// cadence it counteracts the over-aggressive shrinkage caused by
// large early gradients. That reset is an empirical stabiliser,
// not part of the Adagrad derivation.
//
// Reference: Duchi et al. (2011) Adagrad

use ndarray::Array1;

pub struct Adagrad {
    lr:  f64,
    eps: f64,
    /// Running sum of squared gradients, same shape as the flat
    /// parameter vector
    h: Array1<f64>,
}

impl Adagrad {
    pub fn new(dim: usize, lr: f64) -> Self {
        Self { lr, eps: 1e-6, h: Array1::zeros(dim) }
    }

    /// Accumulate the gradient's square into the history and return
    /// the rescaled update. Callers apply `params -= update`.
    pub fn rescale_update(&mut self, grad: &Array1<f64>) -> Array1<f64> {
        self.h += &grad.mapv(|g| g * g);
        let denom = self.h.mapv(f64::sqrt) + self.eps;
        grad * self.lr / denom
    }

    /// Zero the squared-gradient history.
    pub fn reset(&mut self) {
        self.h.fill(0.0);
    }
}
