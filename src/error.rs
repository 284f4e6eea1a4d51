//! Error types.
//!
//! Two layers:
//!
//! - [`AppError`]: what the binary reports (message + process exit code).
//! - [`FitError`]: per-group failures of the fitting engine. These are never fatal
//!   to a batch; the driver records them and moves on to the next group.

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}

/// Why a single group could not be fitted.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    /// Too few trials to identify the most complex candidate.
    #[error("insufficient data: {n} trials, at least {required} required")]
    InsufficientData { n: usize, required: usize },

    /// No restart of any candidate converged within the iteration budget.
    #[error("optimization diverged: no candidate converged ({n} trials)")]
    OptimizationDiverged { n: usize },

    /// A trial that should have been rejected upstream reached the engine.
    #[error("malformed trial at index {index}: {reason}")]
    MalformedTrial { index: usize, reason: String },
}

impl FitError {
    /// Short machine-friendly label used in summaries.
    pub fn kind_label(&self) -> &'static str {
        match self {
            FitError::InsufficientData { .. } => "insufficient-data",
            FitError::OptimizationDiverged { .. } => "diverged",
            FitError::MalformedTrial { .. } => "malformed",
        }
    }
}
