//! Secondary exports: block accuracy, every candidate fit, full JSON dumps.
//!
//! These are meant to be easy to consume in spreadsheets or plotting scripts.

use std::fs::File;
use std::path::Path;

use serde::Serialize;

use crate::domain::{BlockAccuracy, GroupKey, ModelFamily, ModelKind, ModelSelection};
use crate::error::AppError;

/// One candidate fit for one group (all six variants are written per group).
#[derive(Debug, Clone, Serialize)]
struct CandidateRow<'a> {
    subject: u32,
    day: u32,
    model: ModelKind,
    family: ModelFamily,
    k: usize,
    log_likelihood: f64,
    bic: f64,
    #[serde(serialize_with = "crate::io::cache::joined_params::serialize")]
    params: &'a [f64],
}

#[derive(Debug, Serialize)]
struct SelectionRecord<'a> {
    subject: u32,
    day: u32,
    #[serde(flatten)]
    selection: &'a ModelSelection,
}

/// Write per-block accuracy to CSV.
pub fn write_blocks_csv(path: &Path, blocks: &[BlockAccuracy]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::new(2, format!("Failed to create block CSV '{}': {e}", path.display())))?;
    for b in blocks {
        writer
            .serialize(b)
            .map_err(|e| AppError::new(2, format!("Failed to write block CSV row: {e}")))?;
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush block CSV: {e}")))
}

/// Write every converged candidate of every group to CSV.
pub fn write_candidates_csv(path: &Path, fitted: &[(GroupKey, ModelSelection)]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| {
        AppError::new(2, format!("Failed to create candidates CSV '{}': {e}", path.display()))
    })?;
    for (key, selection) in fitted {
        for fit in &selection.fits {
            writer
                .serialize(CandidateRow {
                    subject: key.subject,
                    day: key.day,
                    model: fit.model,
                    family: fit.family(),
                    k: fit.k,
                    log_likelihood: fit.log_likelihood,
                    bic: fit.bic,
                    params: &fit.params,
                })
                .map_err(|e| AppError::new(2, format!("Failed to write candidates CSV row: {e}")))?;
        }
    }
    writer
        .flush()
        .map_err(|e| AppError::new(2, format!("Failed to flush candidates CSV: {e}")))
}

/// Dump full per-group selections (all candidates + skipped reasons) as JSON.
pub fn write_selections_json(path: &Path, fitted: &[(GroupKey, ModelSelection)]) -> Result<(), AppError> {
    let file = File::create(path)
        .map_err(|e| AppError::new(2, format!("Failed to create JSON '{}': {e}", path.display())))?;
    let records: Vec<SelectionRecord<'_>> = fitted
        .iter()
        .map(|(key, selection)| SelectionRecord {
            subject: key.subject,
            day: key.day,
            selection,
        })
        .collect();
    serde_json::to_writer_pretty(file, &records)
        .map_err(|e| AppError::new(2, format!("Failed to write JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FitResult;
    use tempfile::tempdir;

    fn fitted() -> Vec<(GroupKey, ModelSelection)> {
        let fit = |model: ModelKind, bic: f64| FitResult {
            model,
            params: vec![1.5; model.reported_len()],
            log_likelihood: -10.0,
            k: model.param_count(),
            n: 50,
            bic,
        };
        let best = fit(ModelKind::UniX0, 27.8);
        vec![(
            GroupKey::new(2, 4),
            ModelSelection {
                family: ModelFamily::RuleBased,
                fits: vec![best.clone(), fit(ModelKind::Glc1, 31.7)],
                best,
                skipped: vec![(ModelKind::UniY0, "no restart converged".to_string())],
            },
        )]
    }

    #[test]
    fn candidates_csv_has_one_row_per_fit() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("candidates.csv");
        write_candidates_csv(&path, &fitted()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "subject,day,model,family,k,log_likelihood,bic,params");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].starts_with("2,4,glc_1,procedural,3,"));
        assert!(lines[2].ends_with("1.5;1.5;1.5;1.5"));
    }

    #[test]
    fn json_dump_is_readable() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("fits.json");
        write_selections_json(&path, &fitted()).unwrap();

        let value: serde_json::Value = serde_json::from_reader(File::open(&path).unwrap()).unwrap();
        assert_eq!(value[0]["subject"], 2);
        assert_eq!(value[0]["family"], "rule-based");
        assert_eq!(value[0]["best"]["model"], "unix_0");
        assert_eq!(value[0]["skipped"][0][0], "uniy_0");
    }

    #[test]
    fn blocks_csv_header() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blocks.csv");
        let blocks = vec![BlockAccuracy {
            subject: 1,
            day: 2,
            block: 0,
            n: 25,
            n_correct: 20,
            accuracy: 0.8,
        }];
        write_blocks_csv(&path, &blocks).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "subject,day,block,n,n_correct,accuracy\n1,2,0,25,20,0.8\n");
    }
}
