//! Synthetic trial generation for demos and end-to-end tests.
//!
//! Stimuli are drawn uniformly from a 100 x 100 feature square. The category
//! structure is fixed per strategy; a simulated observer responds with its own
//! bound plus Gaussian perceptual noise on the signed distance.

use std::fs;
use std::path::Path;

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::Serialize;

use crate::domain::{Category, GroupKey, SimConfig, SimStrategy, Trial};
use crate::error::AppError;

/// Side length of the stimulus square.
pub const FEATURE_RANGE: f64 = 100.0;

/// Bound an observer (or the category structure) uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bound {
    /// `x = 50`, A on the left.
    Vertical,
    /// `y = x`, A above the diagonal.
    Diagonal,
}

impl Bound {
    /// Signed distance, positive on the A side.
    pub fn signed_distance(self, x: f64, y: f64) -> f64 {
        match self {
            Bound::Vertical => FEATURE_RANGE / 2.0 - x,
            Bound::Diagonal => (y - x) / std::f64::consts::SQRT_2,
        }
    }

    fn classify(self, d: f64) -> Category {
        if d > 0.0 { Category::A } else { Category::B }
    }
}

/// Category structure for a strategy (rule-based task for `unix`, oblique otherwise).
pub fn category_bound(strategy: SimStrategy) -> Bound {
    match strategy {
        SimStrategy::Unix => Bound::Vertical,
        SimStrategy::Glc | SimStrategy::Mixed => Bound::Diagonal,
    }
}

/// Bound the simulated observer uses on a given day.
///
/// `mixed` observers start with the vertical rule and switch to the diagonal in the
/// second half of training.
pub fn observer_bound(strategy: SimStrategy, day: u32, days: u32) -> Bound {
    match strategy {
        SimStrategy::Unix => Bound::Vertical,
        SimStrategy::Glc => Bound::Diagonal,
        SimStrategy::Mixed => {
            if day <= days / 2 {
                Bound::Vertical
            } else {
                Bound::Diagonal
            }
        }
    }
}

pub fn simulate_trials(config: &SimConfig) -> Result<Vec<Trial>, AppError> {
    if config.subjects == 0 || config.days == 0 || config.trials_per_day == 0 {
        return Err(AppError::new(2, "Subjects, days and trials per day must all be > 0."));
    }
    if !(config.noise.is_finite() && config.noise >= 0.0) {
        return Err(AppError::new(2, "Noise must be a finite, non-negative number."));
    }

    let mut rng = StdRng::seed_from_u64(config.seed);
    let normal = Normal::new(0.0, config.noise)
        .map_err(|e| AppError::new(4, format!("Noise distribution error: {e}")))?;
    let categories = category_bound(config.strategy);

    let total = config.subjects as usize * config.days as usize * config.trials_per_day;
    let mut trials = Vec::with_capacity(total);

    for subject in 1..=config.subjects {
        for day in 1..=config.days {
            let observer = observer_bound(config.strategy, day, config.days);
            let key = GroupKey::new(subject, day);
            for i in 0..config.trials_per_day {
                let x = rng.gen_range(0.0..FEATURE_RANGE);
                let y = rng.gen_range(0.0..FEATURE_RANGE);
                let category = categories.classify(categories.signed_distance(x, y));
                let perceived = observer.signed_distance(x, y) + normal.sample(&mut rng);
                trials.push(Trial {
                    key,
                    trial: Some(i as u32),
                    category,
                    x,
                    y,
                    response: observer.classify(perceived),
                });
            }
        }
    }

    tracing::debug!(trials = trials.len(), strategy = ?config.strategy, "simulated trials");
    Ok(trials)
}

#[derive(Debug, Serialize)]
struct TrialRow {
    subject: u32,
    day: u32,
    trial: Option<u32>,
    cat: Category,
    x: f64,
    y: f64,
    resp: Category,
}

/// Write trials in the input CSV schema accepted by `load_trials`.
pub fn write_trials_csv(path: &Path, trials: &[Trial]) -> Result<(), AppError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .map_err(|e| AppError::new(2, format!("Failed to create '{}': {e}", dir.display())))?;
    }
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create trials CSV '{}': {e}", path.display())))?;
    for t in trials {
        writer
            .serialize(TrialRow {
                subject: t.key.subject,
                day: t.key.day,
                trial: t.trial,
                cat: t.category,
                x: t.x,
                y: t.y,
                resp: t.response,
            })
            .map_err(|e| AppError::new(2, format!("Failed to write trial row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush trials CSV: {e}")))
}
