//! Maximum-likelihood fit of a single model variant.
//!
//! Given a group's trials and a `ModelKind`, we:
//! - standardize the features once per group
//! - run Nelder–Mead on the negative log-likelihood from each deterministic start
//! - keep the converged restart with the highest log-likelihood
//!
//! Restarts that exhaust the iteration budget are discarded; a variant with no
//! converged restart is reported back to the selection step as skipped.

use nalgebra::DVector;

use crate::domain::{FitResult, ModelKind, Trial};
use crate::math::NelderMead;
use crate::models::{FeatureScales, decode, initial_guesses, log_likelihood};

/// Smallest number of extra trials beyond the most complex candidate's parameter count.
pub const MIN_N_BUFFER: usize = 2;

/// Largest BIC parameter count on the menu (GLC).
pub fn max_param_count() -> usize {
    ModelKind::ALL
        .iter()
        .map(|k| k.param_count())
        .max()
        .unwrap_or(0)
}

/// Engine options.
#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Groups with fewer trials fail with `InsufficientData`.
    pub min_trials: usize,
    pub optimizer: NelderMead,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            min_trials: max_param_count() + MIN_N_BUFFER,
            optimizer: NelderMead::default(),
        }
    }
}

impl FitOptions {
    pub fn with_min_trials(mut self, min_trials: usize) -> Self {
        self.min_trials = min_trials;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.optimizer.max_iter = max_iter;
        self
    }
}

/// Best converged restart for one variant.
#[derive(Debug, Clone)]
struct Restart {
    start: usize,
    params: Vec<f64>,
    log_likelihood: f64,
}

/// Fit a single variant to a group.
///
/// Returns the reason as `Err` when no restart converged.
pub fn fit_model(
    model: ModelKind,
    trials: &[Trial],
    scales: &FeatureScales,
    optimizer: &NelderMead,
) -> Result<FitResult, String> {
    let n = trials.len();
    let starts = initial_guesses(model, trials, scales);

    let objective = |theta: &DVector<f64>| {
        let params = decode(model, theta.as_slice(), scales);
        -log_likelihood(model, &params, trials)
    };

    let mut best: Option<Restart> = None;
    let mut diverged = 0usize;

    for (start, theta0) in starts.iter().enumerate() {
        let min = optimizer.minimize(&objective, &DVector::from_column_slice(theta0));
        if !min.converged {
            diverged += 1;
            tracing::trace!(model = %model, start, iterations = min.iterations, "restart did not converge");
            continue;
        }

        let params = decode(model, min.x.as_slice(), scales);
        let log_l = -min.f;
        if !(log_l.is_finite() && params.iter().all(|v| v.is_finite())) {
            diverged += 1;
            continue;
        }

        // Strictly better only, so the earliest start wins ties.
        let improves = best.as_ref().is_none_or(|b| log_l > b.log_likelihood);
        if improves {
            best = Some(Restart {
                start,
                params,
                log_likelihood: log_l,
            });
        }
    }

    let Some(best) = best else {
        return Err(format!(
            "no restart converged within {} iterations ({diverged}/{} diverged)",
            optimizer.max_iter,
            starts.len()
        ));
    };

    tracing::trace!(model = %model, start = best.start, log_l = best.log_likelihood, "variant fitted");

    let k = model.param_count();
    Ok(FitResult {
        model,
        params: best.params,
        log_likelihood: best.log_likelihood,
        k,
        n,
        bic: crate::fit::selection::bic(n, k, best.log_likelihood),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Category, GroupKey};
    use approx::assert_abs_diff_eq;

    fn grid_trials(boundary: f64, a_below: bool) -> Vec<Trial> {
        (0..100)
            .map(|i| {
                let x = i as f64 + 0.5;
                let below = x < boundary;
                let cat = if below == a_below { Category::A } else { Category::B };
                Trial {
                    key: GroupKey::new(1, 1),
                    trial: Some(i),
                    category: cat,
                    x,
                    y: ((i * 37) % 100) as f64,
                    response: cat,
                }
            })
            .collect()
    }

    #[test]
    fn default_threshold_is_glc_plus_margin() {
        assert_eq!(max_param_count(), 3);
        assert_eq!(FitOptions::default().min_trials, 5);
    }

    #[test]
    fn uni_x_recovers_separating_bound() {
        let trials = grid_trials(30.0, false);
        let scales = FeatureScales::fit(&trials);
        let fit = fit_model(ModelKind::UniX1, &trials, &scales, &NelderMead::default()).unwrap();

        assert_eq!(fit.k, 2);
        assert_eq!(fit.n, 100);
        assert_abs_diff_eq!(fit.params[0], 30.0, epsilon = 1.0);
        assert!(fit.log_likelihood > -0.5);
        assert!(fit.log_likelihood <= 0.0);
    }

    #[test]
    fn wrong_orientation_fits_worse() {
        let trials = grid_trials(30.0, false);
        let scales = FeatureScales::fit(&trials);
        let nm = NelderMead::default();
        let right = fit_model(ModelKind::UniX1, &trials, &scales, &nm).unwrap();
        let wrong = fit_model(ModelKind::UniX0, &trials, &scales, &nm).unwrap();
        assert!(wrong.log_likelihood < right.log_likelihood - 10.0);
        assert!(wrong.bic > right.bic);
    }

    #[test]
    fn exhausted_budget_is_an_error() {
        let trials = grid_trials(30.0, true);
        let scales = FeatureScales::fit(&trials);
        let nm = NelderMead {
            max_iter: 1,
            ..NelderMead::default()
        };
        let err = fit_model(ModelKind::Glc0, &trials, &scales, &nm).unwrap_err();
        assert!(err.contains("no restart converged"));
    }
}
