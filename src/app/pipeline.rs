//! The batch "fit pipeline" shared by `dbm fit` and tests.
//!
//! load trials -> group -> skip cached groups -> fit in parallel -> merge -> persist
//!
//! The engine (`fit::fit_group`) stays pure; everything stateful (cache, files,
//! thread pool) lives here.

use chrono::Utc;
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;

use crate::aggregate::partition_trials;
use crate::domain::{FitConfig, GroupKey, ModelSelection, Trial};
use crate::error::{AppError, FitError};
use crate::fit::{FitOptions, fit_group, max_param_count};
use crate::io::cache::{CachedOutcome, ResultCache, read_cache};
use crate::io::export::{write_candidates_csv, write_selections_json};
use crate::io::ingest::{RowError, TrialColumns, load_trials};

/// A group the engine could not fit, and why.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupFailure {
    pub key: GroupKey,
    pub error: FitError,
}

/// All computed outputs of a single `dbm fit` run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub rows_read: usize,
    pub no_response: usize,
    pub row_errors: Vec<RowError>,
    /// Distinct groups seen in the input (clean and malformed).
    pub groups_total: usize,
    /// Groups skipped because the cache already had them.
    pub cached: usize,
    /// Newly fitted groups, in key order.
    pub fitted: Vec<(GroupKey, ModelSelection)>,
    pub failures: Vec<GroupFailure>,
    /// Cache contents after the merge.
    pub cache: ResultCache,
}

/// Reject option values the engine cannot work with.
pub fn validate_config(config: &FitConfig) -> Result<(), AppError> {
    let floor = max_param_count() + 1;
    if config.min_trials < floor {
        return Err(AppError::new(
            2,
            format!("--min-trials must be at least {floor} (got {}).", config.min_trials),
        ));
    }
    if config.max_iter == 0 {
        return Err(AppError::new(2, "--max-iter must be > 0."));
    }
    Ok(())
}

pub fn fit_options(config: &FitConfig) -> FitOptions {
    FitOptions::default()
        .with_min_trials(config.min_trials)
        .with_max_iter(config.max_iter)
}

/// Execute the full batch and persist new outcomes to the cache.
pub fn run_fit(config: &FitConfig) -> Result<RunOutput, AppError> {
    validate_config(config)?;

    let columns = TrialColumns {
        x: config.x_column.clone(),
        y: config.y_column.clone(),
    };
    let ingest = load_trials(&config.trials_path, &columns)?;
    tracing::info!(
        rows = ingest.rows_read,
        trials = ingest.trials.len(),
        no_response = ingest.no_response,
        row_errors = ingest.row_errors.len(),
        "loaded trials"
    );
    for err in &ingest.row_errors {
        tracing::warn!(line = err.line, "skipped row: {}", err.message);
    }

    let mut cache = if config.refit {
        tracing::info!("--refit: ignoring existing cache");
        ResultCache::default()
    } else {
        read_cache(&config.cache_path)?
    };

    let groups = partition_trials(&ingest.clean_trials());
    let groups_total = groups.len() + ingest.malformed.len();

    let mut failures: Vec<GroupFailure> = ingest
        .malformed
        .iter()
        .filter(|(key, _)| !cache.contains(key))
        .map(|(key, row)| GroupFailure {
            key: *key,
            error: FitError::MalformedTrial {
                index: row.line,
                reason: format!("CSV line {}: {}", row.line, row.message),
            },
        })
        .collect();

    let pending: Vec<(GroupKey, Vec<Trial>)> = groups
        .into_iter()
        .filter(|(key, _)| !cache.contains(key))
        .collect();
    let cached = groups_total - pending.len() - failures.len();
    tracing::info!(groups = groups_total, cached, pending = pending.len(), "fitting groups");

    let opts = fit_options(config);
    let results = with_thread_pool(config.threads, || {
        pending
            .par_iter()
            .map(|(key, trials)| {
                let _span = tracing::debug_span!("group", group = %key).entered();
                (*key, fit_group(trials, &opts))
            })
            .collect::<Vec<_>>()
    })?;

    let mut fitted = Vec::with_capacity(results.len());
    for (key, result) in results {
        match result {
            Ok(selection) => fitted.push((key, selection)),
            Err(error) => failures.push(GroupFailure { key, error }),
        }
    }
    failures.sort_by_key(|f| f.key);
    for f in &failures {
        tracing::warn!(group = %f.key, kind = f.error.kind_label(), "{}", f.error);
    }

    if !fitted.is_empty() || config.refit {
        let now = Utc::now();
        cache.merge(
            fitted
                .iter()
                .map(|(key, selection)| CachedOutcome::from_selection(*key, selection, now)),
        );
        cache.write(&config.cache_path)?;
        tracing::info!(path = %config.cache_path.display(), rows = cache.len(), "cache written");
    }

    if let Some(path) = &config.export_candidates {
        write_candidates_csv(path, &fitted)?;
    }
    if let Some(path) = &config.export_json {
        write_selections_json(path, &fitted)?;
    }

    Ok(RunOutput {
        rows_read: ingest.rows_read,
        no_response: ingest.no_response,
        row_errors: ingest.row_errors,
        groups_total,
        cached,
        fitted,
        failures,
        cache,
    })
}

/// Run `f` on a dedicated pool when `threads > 0`, else on rayon's global pool.
fn with_thread_pool<T, F>(threads: usize, f: F) -> Result<T, AppError>
where
    T: Send,
    F: FnOnce() -> T + Send,
{
    if threads == 0 {
        return Ok(f());
    }
    let pool = ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| AppError::new(4, format!("Failed to create thread pool: {e}")))?;
    Ok(pool.install(f))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{simulate_trials, write_trials_csv};
    use crate::domain::{ModelFamily, SimConfig, SimStrategy};
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    fn config(dir: &Path) -> FitConfig {
        FitConfig {
            trials_path: dir.join("trials.csv"),
            cache_path: dir.join("fits").join("dbm_results.csv"),
            x_column: "x".to_string(),
            y_column: "y".to_string(),
            min_trials: 5,
            max_iter: 2000,
            threads: 2,
            refit: false,
            export_candidates: None,
            export_json: None,
        }
    }

    fn simulate_into(path: &Path, strategy: SimStrategy, subjects: u32, days: u32) {
        let trials = simulate_trials(&SimConfig {
            out_path: PathBuf::from(path),
            subjects,
            days,
            trials_per_day: 80,
            seed: 7,
            noise: 5.0,
            strategy,
        })
        .unwrap();
        write_trials_csv(path, &trials).unwrap();
    }

    #[test]
    fn fits_every_group_and_persists_them() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        simulate_into(&cfg.trials_path, SimStrategy::Mixed, 2, 4);

        let run = run_fit(&cfg).unwrap();
        assert_eq!(run.groups_total, 8);
        assert_eq!(run.cached, 0);
        assert_eq!(run.fitted.len(), 8);
        assert!(run.failures.is_empty());

        let keys: Vec<GroupKey> = run.fitted.iter().map(|(k, _)| *k).collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);

        let on_disk = read_cache(&cfg.cache_path).unwrap();
        assert_eq!(on_disk.len(), 8);
        let late = on_disk.get(&GroupKey::new(1, 4)).unwrap();
        assert_eq!(late.family, ModelFamily::Procedural);
    }

    #[test]
    fn cached_groups_are_not_refitted() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        simulate_into(&cfg.trials_path, SimStrategy::Glc, 1, 2);

        let first = run_fit(&cfg).unwrap();
        assert_eq!(first.fitted.len(), 2);
        let stamp = read_cache(&cfg.cache_path)
            .unwrap()
            .get(&GroupKey::new(1, 1))
            .unwrap()
            .fitted_at;

        let second = run_fit(&cfg).unwrap();
        assert!(second.fitted.is_empty());
        assert_eq!(second.cached, 2);
        let after = read_cache(&cfg.cache_path).unwrap();
        assert_eq!(after.get(&GroupKey::new(1, 1)).unwrap().fitted_at, stamp);

        let refit = run_fit(&FitConfig { refit: true, ..cfg.clone() }).unwrap();
        assert_eq!(refit.fitted.len(), 2);
    }

    #[test]
    fn small_and_malformed_groups_are_reported_not_cached() {
        let dir = tempdir().unwrap();
        let cfg = config(dir.path());
        let mut csv = String::from("subject,day,cat,x,y,resp\n");
        for i in 0..3 {
            csv.push_str(&format!("1,1,A,{},{},A\n", 10 + i, 20 + i));
        }
        csv.push_str("2,1,A,10,20,A\n2,1,A,oops,20,A\n");
        for i in 0..40 {
            let x = i as f64 * 2.5;
            let (cat, other) = if x < 50.0 { ("A", "B") } else { ("B", "A") };
            let resp = if i % 10 == 5 { other } else { cat };
            csv.push_str(&format!("3,1,{cat},{x},{},{resp}\n", (i * 7) % 40));
        }
        std::fs::write(&cfg.trials_path, csv).unwrap();

        let run = run_fit(&cfg).unwrap();
        assert_eq!(run.groups_total, 3);
        assert_eq!(run.fitted.len(), 1);

        let kinds: Vec<(GroupKey, &str)> = run
            .failures
            .iter()
            .map(|f| (f.key, f.error.kind_label()))
            .collect();
        assert_eq!(
            kinds,
            vec![
                (GroupKey::new(1, 1), "insufficient-data"),
                (GroupKey::new(2, 1), "malformed"),
            ]
        );

        let cache = read_cache(&cfg.cache_path).unwrap();
        assert!(!cache.contains(&GroupKey::new(1, 1)));
        assert!(!cache.contains(&GroupKey::new(2, 1)));
        assert!(cache.contains(&GroupKey::new(3, 1)));
    }

    #[test]
    fn optional_exports_are_written() {
        let dir = tempdir().unwrap();
        let cfg = FitConfig {
            export_candidates: Some(dir.path().join("candidates.csv")),
            export_json: Some(dir.path().join("fits.json")),
            threads: 0,
            ..config(dir.path())
        };
        simulate_into(&cfg.trials_path, SimStrategy::Unix, 1, 1);

        let run = run_fit(&cfg).unwrap();
        let n_fits = run.fitted[0].1.fits.len();
        let text = std::fs::read_to_string(dir.path().join("candidates.csv")).unwrap();
        assert_eq!(text.lines().count(), n_fits + 1);
        assert!(dir.path().join("fits.json").exists());
    }

    #[test]
    fn min_trials_below_floor_is_a_config_error() {
        let dir = tempdir().unwrap();
        let cfg = FitConfig {
            min_trials: 3,
            ..config(dir.path())
        };
        assert_eq!(run_fit(&cfg).unwrap_err().exit_code(), 2);
    }
}
