//! Likelihood and parameterization for the six decision-bound variants.
//!
//! Every variant answers the same three questions, so the fitter stays generic:
//! - how far is a stimulus from the bound, signed toward the A side (`signed_distance`)
//! - how likely is each observed response under a parameter vector (`log_likelihood`)
//! - where should the optimizer start (`initial_guesses`), and how does an
//!   unconstrained optimizer vector map to reported parameters (`decode`)
//!
//! Reported parameters live in raw feature units:
//!
//! ```text
//! uni-X / uni-Y : [b, noise]           bound x = b (or y = b)
//! GLC           : [a, b, c, noise]     bound a·x + b·y + c = 0, (a, b) unit, a > 0
//! ```
//!
//! The optimizer works on a standardized copy of the features (per-group z-scores),
//! with the noise as a clamped log and the GLC normal as an angle `atan(u)`. This
//! keeps every optimizer vector valid and the simplex well scaled.

use std::f64::consts::FRAC_PI_4;

use crate::domain::{Category, ModelKind, Trial};
use crate::math::{AxisScale, log_sigmoid, sigmoid};

/// Lower clamp of the log-noise in standardized units.
pub const LN_NOISE_MIN: f64 = -6.907_755_278_982_137; // ln(1e-3)
/// Upper clamp of the log-noise in standardized units.
pub const LN_NOISE_MAX: f64 = 6.907_755_278_982_137; // ln(1e3)

/// Bound positions/offsets are clamped to this many standard deviations from the
/// group centroid, so a variant that would rather push its bound off to infinity
/// settles at a finite optimum instead.
pub const BOUND_Z_MAX: f64 = 10.0;

/// Noise levels (standardized units) tried from every start position.
const START_NOISE: [f64; 2] = [0.5, 1.0];

/// Per-group standardization of both feature axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureScales {
    pub x: AxisScale,
    pub y: AxisScale,
}

impl FeatureScales {
    pub fn fit(trials: &[Trial]) -> FeatureScales {
        FeatureScales {
            x: AxisScale::fit(trials.iter().map(|t| t.x)),
            y: AxisScale::fit(trials.iter().map(|t| t.y)),
        }
    }
}

/// Signed distance from `(x, y)` to the bound, positive on the A side.
///
/// For GLC the normal is unit length, so this is a Euclidean distance.
pub fn signed_distance(model: ModelKind, params: &[f64], x: f64, y: f64) -> f64 {
    match model {
        ModelKind::UniX0 => params[0] - x,
        ModelKind::UniX1 => x - params[0],
        ModelKind::UniY0 => params[0] - y,
        ModelKind::UniY1 => y - params[0],
        ModelKind::Glc0 => -(params[0] * x + params[1] * y + params[2]),
        ModelKind::Glc1 => params[0] * x + params[1] * y + params[2],
    }
}

/// Probability of responding A: `logistic(d / noise)`; exactly 0.5 on the bound.
pub fn prob_a(model: ModelKind, params: &[f64], x: f64, y: f64) -> f64 {
    let noise = params[model.reported_len() - 1];
    sigmoid(signed_distance(model, params, x, y) / noise)
}

/// Log-probability of the trial's observed response.
pub fn trial_log_likelihood(model: ModelKind, params: &[f64], trial: &Trial) -> f64 {
    let noise = params[model.reported_len() - 1];
    let t = signed_distance(model, params, trial.x, trial.y) / noise;
    match trial.response {
        Category::A => log_sigmoid(t),
        // ln(1 - σ(t)) = ln σ(-t)
        Category::B => log_sigmoid(-t),
    }
}

/// Sum of per-trial log-probabilities of the observed responses.
pub fn log_likelihood(model: ModelKind, params: &[f64], trials: &[Trial]) -> f64 {
    trials
        .iter()
        .map(|t| trial_log_likelihood(model, params, t))
        .sum()
}

/// Map an optimizer vector (standardized space) to reported parameters.
///
/// Optimizer layouts:
/// - uni: `[b_z, ln_noise_z]`
/// - GLC: `[u, c_z, ln_noise_z]` with normal angle `atan(u)`
///
/// `b_z` / `c_z` are clamped to `±BOUND_Z_MAX` and the log-noise to
/// `[LN_NOISE_MIN, LN_NOISE_MAX]`, so every optimizer vector decodes to finite
/// parameters with a positive noise.
pub fn decode(model: ModelKind, theta: &[f64], scales: &FeatureScales) -> Vec<f64> {
    let noise_z = theta[theta.len() - 1].clamp(LN_NOISE_MIN, LN_NOISE_MAX).exp();
    match model {
        ModelKind::UniX0 | ModelKind::UniX1 => {
            let b_z = theta[0].clamp(-BOUND_Z_MAX, BOUND_Z_MAX);
            vec![scales.x.from_z(b_z), noise_z * scales.x.sd]
        }
        ModelKind::UniY0 | ModelKind::UniY1 => {
            let b_z = theta[0].clamp(-BOUND_Z_MAX, BOUND_Z_MAX);
            vec![scales.y.from_z(b_z), noise_z * scales.y.sd]
        }
        ModelKind::Glc0 | ModelKind::Glc1 => {
            let angle = theta[0].atan();
            let (n_y, n_x) = angle.sin_cos();
            let c_z = theta[1].clamp(-BOUND_Z_MAX, BOUND_Z_MAX);

            // n_x·zx + n_y·zy + c_z expressed in raw coordinates.
            let a = n_x / scales.x.sd;
            let b = n_y / scales.y.sd;
            let c = c_z - a * scales.x.mean - b * scales.y.mean;
            let len = a.hypot(b);

            vec![a / len, b / len, c / len, noise_z / len]
        }
    }
}

/// Deterministic optimizer starts (standardized space) for one group.
///
/// - uni: bound at the midpoint of the observed range and at midpoint ± a quarter
///   range
/// - GLC: normal angles `0`, `+π/4`, `-π/4`, bound through the group centroid
///
/// Each position is paired with every entry of `START_NOISE`.
pub fn initial_guesses(model: ModelKind, trials: &[Trial], scales: &FeatureScales) -> Vec<Vec<f64>> {
    let positions: Vec<Vec<f64>> = match model {
        ModelKind::UniX0 | ModelKind::UniX1 => {
            uni_positions(trials.iter().map(|t| scales.x.to_z(t.x)))
        }
        ModelKind::UniY0 | ModelKind::UniY1 => {
            uni_positions(trials.iter().map(|t| scales.y.to_z(t.y)))
        }
        ModelKind::Glc0 | ModelKind::Glc1 => [0.0, FRAC_PI_4, -FRAC_PI_4]
            .iter()
            .map(|angle: &f64| vec![angle.tan(), 0.0])
            .collect(),
    };

    let mut out = Vec::with_capacity(positions.len() * START_NOISE.len());
    for pos in positions {
        for noise in START_NOISE {
            let mut theta = pos.clone();
            theta.push(noise.ln());
            out.push(theta);
        }
    }
    out
}

fn uni_positions(z: impl Iterator<Item = f64>) -> Vec<Vec<f64>> {
    let (lo, hi) = z.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !(lo.is_finite() && hi.is_finite()) {
        return vec![vec![0.0]];
    }
    let mid = 0.5 * (lo + hi);
    let quarter = 0.25 * (hi - lo);
    vec![vec![mid], vec![mid - quarter], vec![mid + quarter]]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GroupKey;
    use approx::assert_abs_diff_eq;

    fn trial(x: f64, y: f64, response: Category) -> Trial {
        Trial {
            key: GroupKey::new(1, 1),
            trial: None,
            category: response,
            x,
            y,
            response,
        }
    }

    #[test]
    fn probability_is_half_on_the_bound_and_saturates() {
        let p = [50.0, 2.0];
        assert_abs_diff_eq!(prob_a(ModelKind::UniX0, &p, 50.0, 10.0), 0.5);
        assert!(prob_a(ModelKind::UniX0, &p, 10.0, 10.0) > 0.999);
        assert!(prob_a(ModelKind::UniX0, &p, 90.0, 10.0) < 0.001);
        // Opposite orientation mirrors the probability.
        assert_abs_diff_eq!(
            prob_a(ModelKind::UniX1, &p, 30.0, 0.0),
            1.0 - prob_a(ModelKind::UniX0, &p, 30.0, 0.0),
            epsilon = 1e-12
        );
    }

    #[test]
    fn noise_controls_steepness() {
        let sharp = prob_a(ModelKind::UniY1, &[0.0, 0.1], 0.0, 1.0);
        let shallow = prob_a(ModelKind::UniY1, &[0.0, 10.0], 0.0, 1.0);
        assert!(sharp > 0.99);
        assert!(shallow > 0.5 && shallow < 0.6);
    }

    #[test]
    fn glc_distance_uses_unit_normal() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let p = [s, -s, 0.0, 1.0]; // bound y = x
        assert_abs_diff_eq!(signed_distance(ModelKind::Glc1, &p, 1.0, 0.0), s, epsilon = 1e-12);
        assert_abs_diff_eq!(signed_distance(ModelKind::Glc0, &p, 1.0, 0.0), -s, epsilon = 1e-12);
    }

    #[test]
    fn log_likelihood_counts_observed_responses() {
        let trials = vec![trial(10.0, 0.0, Category::A), trial(90.0, 0.0, Category::B)];
        let p = [50.0, 40.0 / 3.0_f64.ln()];
        // Each trial is 40 units from the bound: P = σ(ln 3) = 0.75.
        let ll = log_likelihood(ModelKind::UniX0, &p, &trials);
        assert_abs_diff_eq!(ll, 2.0 * 0.75_f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn decoded_glc_preserves_standardized_probabilities() {
        let trials = vec![
            trial(10.0, 200.0, Category::A),
            trial(40.0, 150.0, Category::B),
            trial(70.0, 400.0, Category::A),
            trial(90.0, 300.0, Category::B),
        ];
        let scales = FeatureScales::fit(&trials);
        let theta = [0.7, 0.2, (0.8_f64).ln()];
        let params = decode(ModelKind::Glc1, &theta, &scales);

        assert_abs_diff_eq!(params[0].hypot(params[1]), 1.0, epsilon = 1e-12);
        assert!(params[0] > 0.0);

        let angle = theta[0].atan();
        for t in &trials {
            let zx = scales.x.to_z(t.x);
            let zy = scales.y.to_z(t.y);
            let expected = sigmoid((angle.cos() * zx + angle.sin() * zy + theta[1]) / 0.8);
            assert_abs_diff_eq!(prob_a(ModelKind::Glc1, &params, t.x, t.y), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn decoded_noise_is_clamped_and_finite() {
        let trials = vec![trial(0.0, 0.0, Category::A), trial(1.0, 1.0, Category::B)];
        let scales = FeatureScales::fit(&trials);
        let params = decode(ModelKind::UniX0, &[0.0, -1e9], &scales);
        assert!(params.iter().all(|v| v.is_finite()));
        assert!(params[1] > 0.0);
    }

    #[test]
    fn starts_cover_range_midpoint() {
        let trials: Vec<Trial> = (0..=10).map(|i| trial(i as f64 * 10.0, 0.0, Category::A)).collect();
        let scales = FeatureScales::fit(&trials);
        let starts = initial_guesses(ModelKind::UniX0, &trials, &scales);
        assert_eq!(starts.len(), 6);
        let first = decode(ModelKind::UniX0, &starts[0], &scales);
        assert_abs_diff_eq!(first[0], 50.0, epsilon = 1e-9);

        let glc = initial_guesses(ModelKind::Glc0, &trials, &scales);
        assert_eq!(glc.len(), 6);
        assert!(glc.iter().all(|t| t.len() == 3));
    }
}
