//! CSV ingest and validation for clean trial tables.
//!
//! This module turns a trial CSV into `Trial`s that are safe to group and fit.
//!
//! Design goals:
//! - **Strict schema** for required columns (clear errors + exit code 2)
//! - **Row-level validation**: a row whose group key cannot be read is skipped and
//!   reported; a row with a readable key but bad labels/features taints its whole
//!   group, which the driver then reports as malformed instead of fitting it
//! - **No experiment quirks**: per-subject patches belong upstream of this file
//! - **Deterministic behavior**: rows are kept in file order

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::Path;

use csv::StringRecord;

use crate::domain::{Category, GroupKey, Trial};
use crate::error::AppError;

/// Which columns hold the modeling-space features.
#[derive(Debug, Clone)]
pub struct TrialColumns {
    pub x: String,
    pub y: String,
}

impl Default for TrialColumns {
    fn default() -> Self {
        Self {
            x: "x".to_string(),
            y: "y".to_string(),
        }
    }
}

/// A row-level error encountered during ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    /// Group the row belongs to, when the key itself was readable.
    pub key: Option<GroupKey>,
    pub message: String,
}

/// Ingest output: clean trials + diagnostics.
#[derive(Debug, Clone)]
pub struct IngestedTrials {
    pub trials: Vec<Trial>,
    /// Groups with at least one malformed row, with the first problem seen.
    pub malformed: BTreeMap<GroupKey, RowError>,
    /// Rows skipped because their group key was unreadable.
    pub row_errors: Vec<RowError>,
    /// Rows dropped because no response was recorded.
    pub no_response: usize,
    pub rows_read: usize,
}

impl IngestedTrials {
    /// Trials whose group is not tainted by a malformed row.
    pub fn clean_trials(&self) -> Vec<Trial> {
        self.trials
            .iter()
            .filter(|t| !self.malformed.contains_key(&t.key))
            .cloned()
            .collect()
    }
}

/// Load a trial CSV.
pub fn load_trials(path: &Path, columns: &TrialColumns) -> Result<IngestedTrials, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::new(2, format!("Failed to open trials CSV '{}': {e}", path.display())))?;
    read_trials(file, columns)
}

/// Parse trials from any reader (exposed for tests and in-memory inputs).
pub fn read_trials<R: std::io::Read>(reader: R, columns: &TrialColumns) -> Result<IngestedTrials, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::new(2, format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let x_col = normalize_header_name(&columns.x);
    let y_col = normalize_header_name(&columns.y);
    for required in ["subject", "day", "cat", "resp", x_col.as_str(), y_col.as_str()] {
        if !header_map.contains_key(required) {
            return Err(AppError::new(2, format!("Missing required column: `{required}`")));
        }
    }

    let mut out = IngestedTrials {
        trials: Vec::new(),
        malformed: BTreeMap::new(),
        row_errors: Vec::new(),
        no_response: 0,
        rows_read: 0,
    };

    for (idx, result) in reader.records().enumerate() {
        // +2: header is line 1 and records() is 0-based.
        let line = idx + 2;
        out.rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                out.row_errors.push(RowError {
                    line,
                    key: None,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        let key = match parse_key(&record, &header_map) {
            Ok(k) => k,
            Err(message) => {
                out.row_errors.push(RowError { line, key: None, message });
                continue;
            }
        };

        if get_optional(&record, &header_map, "resp").is_none() {
            out.no_response += 1;
            continue;
        }

        match parse_trial(&record, &header_map, key, &x_col, &y_col) {
            Ok(trial) => out.trials.push(trial),
            Err(message) => {
                tracing::warn!(line, group = %key, "{message}");
                out.malformed.entry(key).or_insert(RowError {
                    line,
                    key: Some(key),
                    message,
                });
            }
        }
    }

    if out.trials.is_empty() && out.malformed.is_empty() {
        return Err(AppError::new(3, "No valid trial rows in input."));
    }

    Ok(out)
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Spreadsheet exports sometimes prefix the first header with a UTF-8 BOM.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

fn parse_key(record: &StringRecord, header_map: &HashMap<String, usize>) -> Result<GroupKey, String> {
    let subject = parse_index(get_required(record, header_map, "subject")?, "subject")?;
    let day = parse_index(get_required(record, header_map, "day")?, "day")?;
    Ok(GroupKey::new(subject, day))
}

fn parse_trial(
    record: &StringRecord,
    header_map: &HashMap<String, usize>,
    key: GroupKey,
    x_col: &str,
    y_col: &str,
) -> Result<Trial, String> {
    let category: Category = get_required(record, header_map, "cat")?.parse()?;
    let response: Category = get_required(record, header_map, "resp")?.parse()?;
    let x = parse_feature(get_required(record, header_map, x_col)?, x_col)?;
    let y = parse_feature(get_required(record, header_map, y_col)?, y_col)?;
    let trial = match get_optional(record, header_map, "trial") {
        Some(s) => Some(parse_index(s, "trial")?),
        None => None,
    };

    Ok(Trial {
        key,
        trial,
        category,
        x,
        y,
        response,
    })
}

/// Integer-valued column; accepts `"3"` and `"3.0"` (pandas float exports).
fn parse_index(s: &str, name: &str) -> Result<u32, String> {
    if let Ok(v) = s.parse::<u32>() {
        return Ok(v);
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(v as u32),
        _ => Err(format!("Invalid `{name}` value '{s}' (expected a non-negative integer).")),
    }
}

fn parse_feature(s: &str, name: &str) -> Result<f64, String> {
    match s.parse::<f64>() {
        Ok(v) if v.is_finite() => Ok(v),
        _ => Err(format!("Invalid `{name}` value '{s}' (expected a finite number).")),
    }
}

fn get_required<'a>(
    record: &'a StringRecord,
    header_map: &HashMap<String, usize>,
    name: &str,
) -> Result<&'a str, String> {
    let idx = header_map
        .get(name)
        .ok_or_else(|| format!("Missing required column: `{name}`"))?;
    record
        .get(*idx)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| format!("Missing required value: `{name}`"))
}

fn get_optional<'a>(record: &'a StringRecord, header_map: &HashMap<String, usize>, name: &str) -> Option<&'a str> {
    let idx = header_map.get(name)?;
    record.get(*idx).map(str::trim).filter(|s| !s.is_empty())
}
