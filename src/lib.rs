//! `dbm-fit` library crate.
//!
//! The binary (`dbm`) is a thin wrapper around this library so that:
//!
//! - the fitting engine is testable without spawning processes
//! - the engine (`fit`) stays a pure function of a group's trials, with caching,
//!   parallelism and reporting layered around it

pub mod aggregate;
pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod report;
