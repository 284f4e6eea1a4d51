//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - sets up logging
//! - dispatches to the fit pipeline, reports, block accuracy and the simulator

use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::cli::{BlocksArgs, Cli, Command, FitArgs, ShowArgs, SimulateArgs};
use crate::domain::{FitConfig, SimConfig};
use crate::error::AppError;

pub mod pipeline;

/// Entry point for the `dbm` binary.
pub fn run() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Command::Fit(args) => handle_fit(args),
        Command::Show(args) => handle_show(args),
        Command::Blocks(args) => handle_blocks(args),
        Command::Simulate(args) => handle_simulate(args),
    }
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with_writer(std::io::stderr)
        .init();
}

fn handle_fit(args: FitArgs) -> Result<(), AppError> {
    let config = fit_config_from_args(&args);
    let run = pipeline::run_fit(&config)?;
    println!("{}", crate::report::format_run_summary(&run));
    Ok(())
}

fn handle_show(args: ShowArgs) -> Result<(), AppError> {
    if !args.cache.exists() {
        return Err(AppError::new(3, format!("No results cache at '{}'.", args.cache.display())));
    }
    let cache = crate::io::cache::read_cache(&args.cache)?;
    println!("{}", crate::report::format_cache_summary(&cache));
    Ok(())
}

fn handle_blocks(args: BlocksArgs) -> Result<(), AppError> {
    let columns = crate::io::ingest::TrialColumns {
        x: args.input.x_col.clone(),
        y: args.input.y_col.clone(),
    };
    let ingest = crate::io::ingest::load_trials(&args.input.trials, &columns)?;
    let trials = ingest.clean_trials();

    let blocks = crate::aggregate::block_accuracy(&trials, args.block_size)?;
    let days = crate::aggregate::day_accuracy(&trials);
    println!("{}", crate::report::format_blocks(&blocks, &days));

    if let Some(path) = &args.export {
        crate::io::export::write_blocks_csv(path, &blocks)?;
        tracing::info!(path = %path.display(), blocks = blocks.len(), "block accuracy written");
    }
    Ok(())
}

fn handle_simulate(args: SimulateArgs) -> Result<(), AppError> {
    let config = sim_config_from_args(&args);
    let trials = crate::data::simulate_trials(&config)?;
    crate::data::write_trials_csv(&config.out_path, &trials)?;
    tracing::info!(
        path = %config.out_path.display(),
        trials = trials.len(),
        strategy = ?config.strategy,
        "synthetic trials written"
    );
    Ok(())
}

pub fn fit_config_from_args(args: &FitArgs) -> FitConfig {
    FitConfig {
        trials_path: args.input.trials.clone(),
        cache_path: args.cache.clone(),
        x_column: args.input.x_col.clone(),
        y_column: args.input.y_col.clone(),
        min_trials: args.min_trials,
        max_iter: args.max_iter,
        threads: args.threads,
        refit: args.refit,
        export_candidates: args.export_candidates.clone(),
        export_json: args.json.clone(),
    }
}

pub fn sim_config_from_args(args: &SimulateArgs) -> SimConfig {
    SimConfig {
        out_path: args.out.clone(),
        subjects: args.subjects,
        days: args.days,
        trials_per_day: args.trials_per_day,
        seed: args.seed,
        noise: args.noise,
        strategy: args.strategy,
    }
}
