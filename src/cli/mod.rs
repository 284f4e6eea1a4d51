//! Command-line parsing for the `dbm` fitter.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! modeling/math code. Arguments are mapped to plain config structs in `app`.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::aggregate::DEFAULT_BLOCK_SIZE;
use crate::domain::SimStrategy;
use crate::fit::{MIN_N_BUFFER, max_param_count};

/// Default location of the results table.
pub const DEFAULT_CACHE_PATH: &str = "dbm_fits/dbm_results.csv";

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dbm", version, about = "Decision-bound model fitting for category-learning experiments")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Enable debug logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fit all (subject, day) groups missing from the cache and print a summary.
    Fit(FitArgs),
    /// Print the summary of an existing results cache without fitting.
    Show(ShowArgs),
    /// Per-block accuracy of a trial CSV.
    Blocks(BlocksArgs),
    /// Write a synthetic trial CSV.
    Simulate(SimulateArgs),
}

/// Where the input trials live and which columns carry the features.
#[derive(Debug, Args, Clone)]
pub struct TrialArgs {
    /// Trial CSV (columns: subject, day, cat, resp and the two feature columns).
    #[arg(long, env = "DBM_TRIALS", value_name = "CSV")]
    pub trials: PathBuf,

    /// Feature column used as x.
    #[arg(long = "x-col", default_value = "x")]
    pub x_col: String,

    /// Feature column used as y.
    #[arg(long = "y-col", default_value = "y")]
    pub y_col: String,
}

#[derive(Debug, Args, Clone)]
pub struct FitArgs {
    #[command(flatten)]
    pub input: TrialArgs,

    /// Results cache CSV (created if missing).
    #[arg(long, env = "DBM_CACHE", default_value = DEFAULT_CACHE_PATH, value_name = "CSV")]
    pub cache: PathBuf,

    /// Minimum trials per group; smaller groups are reported, not fitted.
    #[arg(long, default_value_t = max_param_count() + MIN_N_BUFFER)]
    pub min_trials: usize,

    /// Nelder-Mead iteration budget per restart.
    #[arg(long, default_value_t = 2000)]
    pub max_iter: usize,

    /// Worker threads (0 = one per core).
    #[arg(long, env = "DBM_THREADS", default_value_t = 0)]
    pub threads: usize,

    /// Ignore the existing cache and refit every group.
    #[arg(long)]
    pub refit: bool,

    /// Export every candidate fit of the newly fitted groups to CSV.
    #[arg(long = "export-candidates", value_name = "CSV")]
    pub export_candidates: Option<PathBuf>,

    /// Dump the full selections of the newly fitted groups to JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct ShowArgs {
    /// Results cache CSV.
    #[arg(long, env = "DBM_CACHE", default_value = DEFAULT_CACHE_PATH, value_name = "CSV")]
    pub cache: PathBuf,
}

#[derive(Debug, Args, Clone)]
pub struct BlocksArgs {
    #[command(flatten)]
    pub input: TrialArgs,

    /// Trials per block.
    #[arg(long, default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: usize,

    /// Write block accuracies to CSV instead of only printing them.
    #[arg(long, value_name = "CSV")]
    pub export: Option<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Output trial CSV.
    #[arg(long, value_name = "CSV")]
    pub out: PathBuf,

    #[arg(long, default_value_t = 4)]
    pub subjects: u32,

    #[arg(long, default_value_t = 5)]
    pub days: u32,

    /// Trials per subject per day.
    #[arg(long = "trials", default_value_t = 100)]
    pub trials_per_day: usize,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Std-dev of perceptual noise (feature units).
    #[arg(long, default_value_t = 5.0)]
    pub noise: f64,

    /// Which bound the simulated observers use.
    #[arg(long, value_enum, default_value_t = SimStrategy::Mixed)]
    pub strategy: SimStrategy,
}
