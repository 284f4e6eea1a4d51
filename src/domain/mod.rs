//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - trial-level inputs (`Category`, `GroupKey`, `Trial`)
//! - the candidate model menu (`ModelKind`, `ModelFamily`)
//! - fit outputs (`FitResult`, `ModelSelection`, `BlockAccuracy`)
//! - run configuration (`FitConfig`, `SimConfig`)

pub mod types;

pub use types::*;
