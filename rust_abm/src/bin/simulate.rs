use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use firm_abm::config::Config;
use firm_abm::state;

/// Run the firm-sector simulation and print one JSON record per period.
#[derive(Parser, Debug)]
#[command(name = "simulate", version)]
struct Args {
    /// Number of periods to simulate.
    #[arg(long, default_value_t = 120)]
    periods: u64,
    /// Seed of the simulation's random source.
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// JSON parameter file; unnamed parameters keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading parameters from {}", path.display()))?,
        None => Config::default(),
    };

    let records = state::run(config, args.seed, args.periods).context("simulation aborted")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for record in &records {
        serde_json::to_writer(&mut out, record)?;
        writeln!(out)?;
    }
    Ok(())
}
