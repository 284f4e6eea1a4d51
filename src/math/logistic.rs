//! Numerically stable logistic helpers and per-group feature standardization.
//!
//! Numerical notes:
//! - `ln σ(t)` is computed as `-ln(1 + e^{-t})` via `ln_1p`, switching branches on
//!   the sign of `t` so the exponential never overflows. For any finite `t` the
//!   result is finite (it tends to `t` as `t → -∞`), so log-likelihoods never hit
//!   `-inf` even when the noise parameter is tiny.

/// Logistic function `1 / (1 + e^{-t})`.
pub fn sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        1.0 / (1.0 + (-t).exp())
    } else {
        let e = t.exp();
        e / (1.0 + e)
    }
}

/// `ln σ(t)`, stable for large `|t|`.
pub fn log_sigmoid(t: f64) -> f64 {
    if t >= 0.0 {
        -(-t).exp().ln_1p()
    } else {
        t - t.exp().ln_1p()
    }
}

/// Affine map of a feature axis onto zero mean / unit spread.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisScale {
    pub mean: f64,
    pub sd: f64,
}

impl AxisScale {
    /// Population mean and standard deviation. A degenerate axis (all values equal)
    /// gets `sd = 1` so the transform stays invertible.
    pub fn fit(values: impl Iterator<Item = f64>) -> AxisScale {
        let mut n = 0usize;
        let mut sum = 0.0;
        let mut sum_sq = 0.0;
        for v in values {
            n += 1;
            sum += v;
            sum_sq += v * v;
        }
        if n == 0 {
            return AxisScale { mean: 0.0, sd: 1.0 };
        }
        let mean = sum / n as f64;
        let var = (sum_sq / n as f64 - mean * mean).max(0.0);
        let sd = var.sqrt();
        AxisScale {
            mean,
            sd: if sd > 1e-12 && sd.is_finite() { sd } else { 1.0 },
        }
    }

    pub fn to_z(&self, v: f64) -> f64 {
        (v - self.mean) / self.sd
    }

    pub fn from_z(&self, z: f64) -> f64 {
        self.mean + z * self.sd
    }
}
