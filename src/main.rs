//! Stronghold Siege - Entry Point
//!
//! Loads the configuration, tower layouts and a seed world into the
//! in-memory services, resumes every contest and keeps the schedule running
//! until interrupted.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::runtime::Runtime;

use stronghold_siege::core::clock::SystemClock;
use stronghold_siege::core::config::SiegeConfig;
use stronghold_siege::core::error::Result;
use stronghold_siege::layout::{load_layouts, TowerLayouts};
use stronghold_siege::services::memory::MemoryServices;
use stronghold_siege::siege::TaskScheduler;
use stronghold_siege::Coordinator;

/// Stronghold siege scheduler
#[derive(Parser, Debug)]
#[command(name = "stronghold_siege")]
#[command(about = "Run the siege cycle of every stronghold")]
struct Args {
    /// Siege configuration (TOML); defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tower layouts (TOML)
    #[arg(long, default_value = "data/tower_layouts.toml")]
    layouts: PathBuf,

    /// Seed world: strongholds, garrisons and factions (TOML)
    #[arg(long, default_value = "data/strongholds.toml")]
    strongholds: PathBuf,

    /// Print the status snapshot and exit instead of running
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    // Initialize tracing for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("stronghold_siege=info")),
        )
        .init();

    let args = Args::parse();
    tracing::info!("Stronghold Siege starting...");

    let config = match &args.config {
        Some(path) => SiegeConfig::load(path)?,
        None => SiegeConfig::default(),
    };
    let layouts = if args.layouts.exists() {
        load_layouts(&args.layouts)?
    } else {
        tracing::warn!(path = %args.layouts.display(), "No tower layouts found; battles will have no towers");
        TowerLayouts::new()
    };
    let seed = std::fs::read_to_string(&args.strongholds)?;
    let memory = MemoryServices::from_seed_toml(&seed)?;

    // Timers and their callbacks run on the shared worker pool
    let rt = Runtime::new()?;
    let scheduler = TaskScheduler::new(rt.handle().clone());
    let services = memory.services(Arc::new(SystemClock));

    let coordinator = Coordinator::new(services, config, layouts, scheduler)?;
    coordinator.start()?;

    println!("{}", serde_json::to_string_pretty(&coordinator.status()?)?);

    if !args.once {
        tracing::info!("Running; press Ctrl-C to stop");
        rt.block_on(tokio::signal::ctrl_c())?;
    }

    coordinator.shutdown();
    Ok(())
}
