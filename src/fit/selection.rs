//! Model selection across the six decision-bound variants using BIC.
//!
//! For one group the engine fits each variant and computes:
//! - the maximized log-likelihood
//! - BIC = k * ln(n) - 2 * logL
//!
//! Selection rules:
//! 1. Reject groups with fewer than `min_trials` trials (`InsufficientData`)
//! 2. Reject groups carrying non-finite features (`MalformedTrial`)
//! 3. Choose the converged variant with minimum BIC; exact ties go to the variant
//!    declared first in `ModelKind::ALL` (uni-X, uni-Y, GLC; orientation 0 first)
//! 4. If no variant converged, fail with `OptimizationDiverged`

use crate::domain::{FitResult, ModelKind, ModelSelection, Trial};
use crate::error::FitError;
use crate::fit::fitter::{FitOptions, fit_model, max_param_count};
use crate::models::FeatureScales;

/// Bayesian information criterion; lower is better.
pub fn bic(n: usize, k: usize, log_likelihood: f64) -> f64 {
    (k as f64) * (n as f64).ln() - 2.0 * log_likelihood
}

/// Fit every candidate variant to one group and select the best by BIC.
///
/// Pure function of its inputs: no shared state, safe to call from many threads.
pub fn fit_group(trials: &[Trial], opts: &FitOptions) -> Result<ModelSelection, FitError> {
    let n = trials.len();
    let required = opts.min_trials.max(max_param_count() + 1);
    if n < required {
        return Err(FitError::InsufficientData { n, required });
    }

    if let Some((index, t)) = trials
        .iter()
        .enumerate()
        .find(|(_, t)| !(t.x.is_finite() && t.y.is_finite()))
    {
        return Err(FitError::MalformedTrial {
            index,
            reason: format!("non-finite feature (x={}, y={})", t.x, t.y),
        });
    }

    let scales = FeatureScales::fit(trials);

    let mut fits = Vec::with_capacity(ModelKind::ALL.len());
    let mut skipped = Vec::new();
    for kind in ModelKind::ALL {
        match fit_model(kind, trials, &scales, &opts.optimizer) {
            Ok(fit) => fits.push(fit),
            Err(reason) => skipped.push((kind, reason)),
        }
    }

    let Some(best) = select_by_bic(&fits) else {
        return Err(FitError::OptimizationDiverged { n });
    };

    tracing::debug!(
        n,
        model = %best.model,
        bic = best.bic,
        log_l = best.log_likelihood,
        skipped = skipped.len(),
        "group fitted"
    );

    Ok(ModelSelection {
        family: best.family(),
        best,
        fits,
        skipped,
    })
}

/// Minimum-BIC fit; on exact ties the earliest entry wins.
pub fn select_by_bic(fits: &[FitResult]) -> Option<FitResult> {
    let mut best = fits.first()?;
    for f in &fits[1..] {
        if f.bic < best.bic {
            best = f;
        }
    }
    Some(best.clone())
}
