//! Persistent results table (one row per fitted group).
//!
//! The cache is a plain CSV so downstream plotting code can read it directly:
//!
//! ```text
//! subject,day,model,family,side,n_trials,k,log_likelihood,bic,params,fitted_at
//! 3,12,glc_0,procedural,0,300,3,-91.2,199.5,0.81;-0.58;-9.4;6.2,2026-10-18T09:00:00Z
//! ```
//!
//! - keyed uniquely by `(subject, day)`; rows are kept sorted by key
//! - `params` is the winning variant's raw-space parameter vector, `;`-joined
//! - floats are written in shortest round-trip form, so a re-read reproduces them
//!   bit-for-bit
//!
//! The engine never touches this file. The batch driver loads it once, fits only
//! the groups it lacks, merges, and writes it back once.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::{GroupKey, ModelFamily, ModelKind, ModelSelection};
use crate::error::AppError;

/// One row of the results table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedOutcome {
    pub subject: u32,
    pub day: u32,
    pub model: ModelKind,
    pub family: ModelFamily,
    pub side: u8,
    pub n_trials: usize,
    pub k: usize,
    pub log_likelihood: f64,
    pub bic: f64,
    #[serde(with = "joined_params")]
    pub params: Vec<f64>,
    pub fitted_at: DateTime<Utc>,
}

impl CachedOutcome {
    pub fn from_selection(key: GroupKey, selection: &ModelSelection, fitted_at: DateTime<Utc>) -> Self {
        let best = &selection.best;
        Self {
            subject: key.subject,
            day: key.day,
            model: best.model,
            family: selection.family,
            side: best.model.side(),
            n_trials: best.n,
            k: best.k,
            log_likelihood: best.log_likelihood,
            bic: best.bic,
            params: best.params.clone(),
            fitted_at,
        }
    }

    pub fn key(&self) -> GroupKey {
        GroupKey::new(self.subject, self.day)
    }
}

/// In-memory snapshot of the results table.
#[derive(Debug, Clone, Default)]
pub struct ResultCache {
    rows: BTreeMap<GroupKey, CachedOutcome>,
}

impl ResultCache {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains(&self, key: &GroupKey) -> bool {
        self.rows.contains_key(key)
    }

    pub fn get(&self, key: &GroupKey) -> Option<&CachedOutcome> {
        self.rows.get(key)
    }

    /// Rows in key order.
    pub fn rows(&self) -> impl Iterator<Item = &CachedOutcome> {
        self.rows.values()
    }

    /// Keys from `keys` (order preserved) that have no cached row.
    pub fn missing_groups<'a>(&self, keys: impl IntoIterator<Item = &'a GroupKey>) -> Vec<GroupKey> {
        keys.into_iter()
            .filter(|k| !self.contains(k))
            .copied()
            .collect()
    }

    /// Insert outcomes; a row for an existing key replaces it.
    pub fn merge(&mut self, outcomes: impl IntoIterator<Item = CachedOutcome>) {
        for row in outcomes {
            self.rows.insert(row.key(), row);
        }
    }

    /// Write the whole table, replacing `path` atomically.
    pub fn write(&self, path: &Path) -> Result<(), AppError> {
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| {
                AppError::new(2, format!("Failed to create cache directory '{}': {e}", dir.display()))
            })?;
        }

        let tmp = temp_path(path);
        {
            let file = File::create(&tmp).map_err(|e| {
                AppError::new(2, format!("Failed to create cache file '{}': {e}", tmp.display()))
            })?;
            let mut writer = csv::Writer::from_writer(file);
            for row in self.rows.values() {
                writer
                    .serialize(row)
                    .map_err(|e| AppError::new(2, format!("Failed to write cache row: {e}")))?;
            }
            writer
                .flush()
                .map_err(|e| AppError::new(2, format!("Failed to flush cache file: {e}")))?;
        }

        fs::rename(&tmp, path).map_err(|e| {
            AppError::new(2, format!("Failed to replace cache file '{}': {e}", path.display()))
        })
    }
}

/// Load the results table; a missing file is an empty cache.
pub fn read_cache(path: &Path) -> Result<ResultCache, AppError> {
    if !path.exists() {
        return Ok(ResultCache::default());
    }

    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to open cache '{}': {e}", path.display())))?;

    let mut cache = ResultCache::default();
    for (idx, row) in reader.deserialize::<CachedOutcome>().enumerate() {
        let row = row.map_err(|e| {
            AppError::new(
                2,
                format!("Invalid cache row {} in '{}': {e}", idx + 2, path.display()),
            )
        })?;
        if row.params.len() != row.model.reported_len() {
            return Err(AppError::new(
                2,
                format!(
                    "Invalid cache row {}: model {} expects {} params, found {}.",
                    idx + 2,
                    row.model,
                    row.model.reported_len(),
                    row.params.len()
                ),
            ));
        }
        cache.rows.insert(row.key(), row);
    }
    Ok(cache)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// `Vec<f64>` <-> `"v1;v2;..."` for a single CSV field.
pub(crate) mod joined_params {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(params: &[f64], s: S) -> Result<S::Ok, S::Error> {
        let joined = params
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(";");
        s.serialize_str(&joined)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<f64>, D::Error> {
        let raw = String::deserialize(d)?;
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }
        raw.split(';')
            .map(|p| p.trim().parse::<f64>().map_err(serde::de::Error::custom))
            .collect()
    }
}
