//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - used in-memory during fitting
//! - written to the results cache (CSV) and JSON dumps
//! - reloaded on later runs to skip already-fitted groups

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// One of the two category labels used for both the true category and the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    A,
    B,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::A => "A",
            Category::B => "B",
        }
    }
}

impl FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" | "a" => Ok(Category::A),
            "B" | "b" => Ok(Category::B),
            other => Err(format!("unrecognized category label '{other}' (expected A or B)")),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Grouping key for a fitting window: one subject on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupKey {
    pub subject: u32,
    pub day: u32,
}

impl GroupKey {
    pub fn new(subject: u32, day: u32) -> Self {
        Self { subject, day }
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub {:03} day {:02}", self.subject, self.day)
    }
}

/// One classification decision.
#[derive(Debug, Clone, PartialEq)]
pub struct Trial {
    pub key: GroupKey,
    /// Trial index within the session, when the input carries one.
    pub trial: Option<u32>,
    pub category: Category,
    pub x: f64,
    pub y: f64,
    pub response: Category,
}

impl Trial {
    pub fn is_correct(&self) -> bool {
        self.category == self.response
    }
}

/// Coarse strategy label collapsed from the winning model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelFamily {
    #[serde(rename = "procedural")]
    Procedural,
    #[serde(rename = "rule-based")]
    RuleBased,
}

impl ModelFamily {
    pub fn label(self) -> &'static str {
        match self {
            ModelFamily::Procedural => "procedural",
            ModelFamily::RuleBased => "rule-based",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The six candidate decision-bound variants.
///
/// Declaration order is the tie-break priority used by model selection: on an exact
/// BIC tie the earlier variant wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    /// Vertical bound `x = b`, respond A when `x < b`.
    #[serde(rename = "unix_0")]
    UniX0,
    /// Vertical bound `x = b`, respond A when `x > b`.
    #[serde(rename = "unix_1")]
    UniX1,
    /// Horizontal bound `y = b`, respond A when `y < b`.
    #[serde(rename = "uniy_0")]
    UniY0,
    /// Horizontal bound `y = b`, respond A when `y > b`.
    #[serde(rename = "uniy_1")]
    UniY1,
    /// General linear bound, respond A on the negative side of `a·x + b·y + c`.
    #[serde(rename = "glc_0")]
    Glc0,
    /// General linear bound, respond A on the positive side of `a·x + b·y + c`.
    #[serde(rename = "glc_1")]
    Glc1,
}

impl ModelKind {
    pub const ALL: [ModelKind; 6] = [
        ModelKind::UniX0,
        ModelKind::UniX1,
        ModelKind::UniY0,
        ModelKind::UniY1,
        ModelKind::Glc0,
        ModelKind::Glc1,
    ];

    /// Stable identifier written to the results cache.
    pub fn id(self) -> &'static str {
        match self {
            ModelKind::UniX0 => "unix_0",
            ModelKind::UniX1 => "unix_1",
            ModelKind::UniY0 => "uniy_0",
            ModelKind::UniY1 => "uniy_1",
            ModelKind::Glc0 => "glc_0",
            ModelKind::Glc1 => "glc_1",
        }
    }

    pub fn parse(id: &str) -> Option<ModelKind> {
        ModelKind::ALL.into_iter().find(|k| k.id() == id.trim())
    }

    /// Which orientation of the bound maps to category A (0 or 1).
    pub fn side(self) -> u8 {
        match self {
            ModelKind::UniX0 | ModelKind::UniY0 | ModelKind::Glc0 => 0,
            ModelKind::UniX1 | ModelKind::UniY1 | ModelKind::Glc1 => 1,
        }
    }

    pub fn family(self) -> ModelFamily {
        match self {
            ModelKind::Glc0 | ModelKind::Glc1 => ModelFamily::Procedural,
            _ => ModelFamily::RuleBased,
        }
    }

    pub fn is_glc(self) -> bool {
        self.family() == ModelFamily::Procedural
    }

    /// Free parameters counted by BIC: bound coefficients plus one noise parameter.
    pub fn param_count(self) -> usize {
        if self.is_glc() { 3 } else { 2 }
    }

    /// Length of the reported parameter vector (`[b, noise]` or `[a, b, c, noise]`).
    pub fn reported_len(self) -> usize {
        if self.is_glc() { 4 } else { 2 }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Fit of one candidate variant to one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitResult {
    pub model: ModelKind,
    /// Raw-feature-space parameters: `[b, noise]` (uni) or `[a, b, c, noise]` (GLC,
    /// with `(a, b)` a unit normal).
    pub params: Vec<f64>,
    pub log_likelihood: f64,
    /// Parameter count used by BIC.
    pub k: usize,
    /// Number of trials in the group.
    pub n: usize,
    pub bic: f64,
}

impl FitResult {
    pub fn family(&self) -> ModelFamily {
        self.model.family()
    }

    /// Noise (response stochasticity) in raw feature units.
    pub fn noise(&self) -> f64 {
        self.params.last().copied().unwrap_or(f64::NAN)
    }
}

/// Per-group outcome of fitting all candidates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSelection {
    pub best: FitResult,
    pub family: ModelFamily,
    /// All candidates that produced a converged fit, in priority order.
    pub fits: Vec<FitResult>,
    /// Candidates that did not converge and why.
    pub skipped: Vec<(ModelKind, String)>,
}

/// Accuracy over a run of consecutive trials.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockAccuracy {
    pub subject: u32,
    pub day: u32,
    pub block: usize,
    pub n: usize,
    pub n_correct: usize,
    pub accuracy: f64,
}

/// Which bound generated synthetic responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SimStrategy {
    /// Oblique (information-integration) bound.
    Glc,
    /// Vertical bound on x.
    Unix,
    /// Rule-based on early days, drifting to the oblique bound later.
    Mixed,
}

/// A full `dbm fit` run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags (plus environment and defaults).
#[derive(Debug, Clone)]
pub struct FitConfig {
    pub trials_path: PathBuf,
    pub cache_path: PathBuf,
    pub x_column: String,
    pub y_column: String,
    pub min_trials: usize,
    pub max_iter: usize,
    /// Worker threads for group-level parallelism (0 = rayon default).
    pub threads: usize,
    /// Ignore any existing cache and refit every group.
    pub refit: bool,
    pub export_candidates: Option<PathBuf>,
    pub export_json: Option<PathBuf>,
}

/// Configuration for `dbm simulate`.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub out_path: PathBuf,
    pub subjects: u32,
    pub days: u32,
    pub trials_per_day: usize,
    pub seed: u64,
    /// Std-dev of Gaussian perceptual noise added to the signed distance.
    pub noise: f64,
    pub strategy: SimStrategy,
}
