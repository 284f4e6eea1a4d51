//! Mathematical utilities: stable logistic functions and a simplex optimizer.

pub mod logistic;
pub mod simplex;

pub use logistic::*;
pub use simplex::*;
