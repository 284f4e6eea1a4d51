//! Decision-bound fitting engine.
//!
//! Responsibilities:
//!
//! - fit each candidate variant by maximum likelihood (`fitter`)
//! - score candidates by BIC and pick the winner per group (`selection`)

pub mod fitter;
pub mod selection;

pub use fitter::*;
pub use selection::*;
