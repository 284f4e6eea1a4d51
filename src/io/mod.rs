//! Input/output helpers.
//!
//! - trial CSV ingest + validation (`ingest`)
//! - persistent results table (`cache`)
//! - secondary exports (CSV/JSON) (`export`)

pub mod cache;
pub mod export;
pub mod ingest;

pub use cache::*;
pub use export::*;
pub use ingest::*;
