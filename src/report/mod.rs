//! Reporting utilities: per-day strategy summaries and failure tallies.

use std::collections::BTreeMap;

use crate::app::pipeline::GroupFailure;
use crate::domain::{GroupKey, ModelFamily};
use crate::io::cache::ResultCache;

pub mod format;

pub use format::*;

/// Strategy mix across subjects on one day.
#[derive(Debug, Clone, PartialEq)]
pub struct DaySummary {
    pub day: u32,
    pub n_groups: usize,
    pub procedural: usize,
    pub rule_based: usize,
    /// Mean winning BIC among procedural groups (None when there are none).
    pub mean_bic_procedural: Option<f64>,
    pub mean_bic_rule_based: Option<f64>,
}

impl DaySummary {
    pub fn proportion(&self, family: ModelFamily) -> f64 {
        let count = match family {
            ModelFamily::Procedural => self.procedural,
            ModelFamily::RuleBased => self.rule_based,
        };
        if self.n_groups == 0 {
            0.0
        } else {
            count as f64 / self.n_groups as f64
        }
    }
}

/// Aggregate cached outcomes by day (days ascending).
pub fn summarize_by_day(cache: &ResultCache) -> Vec<DaySummary> {
    #[derive(Default)]
    struct Acc {
        procedural: Vec<f64>,
        rule_based: Vec<f64>,
    }

    let mut by_day: BTreeMap<u32, Acc> = BTreeMap::new();
    for row in cache.rows() {
        let acc = by_day.entry(row.day).or_default();
        match row.family {
            ModelFamily::Procedural => acc.procedural.push(row.bic),
            ModelFamily::RuleBased => acc.rule_based.push(row.bic),
        }
    }

    by_day
        .into_iter()
        .map(|(day, acc)| DaySummary {
            day,
            n_groups: acc.procedural.len() + acc.rule_based.len(),
            procedural: acc.procedural.len(),
            rule_based: acc.rule_based.len(),
            mean_bic_procedural: mean(&acc.procedural),
            mean_bic_rule_based: mean(&acc.rule_based),
        })
        .collect()
}

/// Failed groups keyed by failure kind (`FitError::kind_label`).
pub fn failures_by_kind(failures: &[GroupFailure]) -> BTreeMap<&'static str, Vec<GroupKey>> {
    let mut out: BTreeMap<&'static str, Vec<GroupKey>> = BTreeMap::new();
    for f in failures {
        out.entry(f.error.kind_label()).or_default().push(f.key);
    }
    out
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{FitResult, ModelKind, ModelSelection};
    use crate::error::FitError;
    use crate::io::cache::CachedOutcome;
    use approx::assert_abs_diff_eq;
    use chrono::Utc;

    pub(crate) fn cache_with(rows: &[(u32, u32, ModelKind, f64)]) -> ResultCache {
        let now = Utc::now();
        let mut cache = ResultCache::default();
        cache.merge(rows.iter().map(|&(subject, day, model, bic)| {
            let best = FitResult {
                model,
                params: vec![0.5; model.reported_len()],
                log_likelihood: -bic / 2.0,
                k: model.param_count(),
                n: 100,
                bic,
            };
            let selection = ModelSelection {
                family: model.family(),
                fits: vec![best.clone()],
                best,
                skipped: Vec::new(),
            };
            CachedOutcome::from_selection(GroupKey::new(subject, day), &selection, now)
        }));
        cache
    }

    #[test]
    fn day_summary_counts_and_means() {
        let cache = cache_with(&[
            (1, 1, ModelKind::UniX0, 100.0),
            (2, 1, ModelKind::UniY1, 120.0),
            (3, 1, ModelKind::Glc0, 90.0),
            (1, 2, ModelKind::Glc1, 80.0),
        ]);
        let days = summarize_by_day(&cache);
        assert_eq!(days.len(), 2);

        let d1 = &days[0];
        assert_eq!((d1.day, d1.n_groups, d1.procedural, d1.rule_based), (1, 3, 1, 2));
        assert_abs_diff_eq!(d1.mean_bic_rule_based.unwrap(), 110.0);
        assert_abs_diff_eq!(d1.proportion(ModelFamily::Procedural), 1.0 / 3.0);

        let d2 = &days[1];
        assert_eq!(d2.mean_bic_rule_based, None);
        assert_abs_diff_eq!(d2.proportion(ModelFamily::Procedural), 1.0);
    }

    #[test]
    fn failures_grouped_by_kind() {
        let failures = vec![
            GroupFailure {
                key: GroupKey::new(1, 1),
                error: FitError::InsufficientData { n: 3, required: 5 },
            },
            GroupFailure {
                key: GroupKey::new(2, 3),
                error: FitError::OptimizationDiverged { n: 40 },
            },
            GroupFailure {
                key: GroupKey::new(4, 1),
                error: FitError::InsufficientData { n: 1, required: 5 },
            },
        ];
        let grouped = failures_by_kind(&failures);
        assert_eq!(grouped["insufficient-data"], vec![GroupKey::new(1, 1), GroupKey::new(4, 1)]);
        assert_eq!(grouped["diverged"], vec![GroupKey::new(2, 3)]);
    }
}
