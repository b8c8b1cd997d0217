use anyhow::{Context, Result};
use clap::Parser;
use std::time::Instant;
use tracing::{info, warn};

mod config;
mod league;
mod sim;
mod snapshot;

use config::SimConfig;
use snapshot::SeasonSnapshot;

fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = SimConfig::parse();
    config.validate()?;

    let raw = std::fs::read_to_string(&config.snapshot)
        .with_context(|| format!("failed to read snapshot {}", config.snapshot.display()))?;
    let season: SeasonSnapshot =
        serde_json::from_str(&raw).context("failed to parse the season snapshot")?;
    if season.season != config.current_season {
        warn!(
            "snapshot holds season {} but the run is configured for {}",
            season.season, config.current_season
        );
    }
    info!(
        season = season.season,
        teams = season.teams.len(),
        games = season.games.len(),
        "season snapshot loaded"
    );

    let started = Instant::now();
    let accumulator = sim::run(&season, &config)?;
    info!(
        "simulated {} seasons in {:.1?}",
        accumulator.trials(),
        started.elapsed()
    );

    let output = sim::estimator::estimate(&season, &accumulator, &config);
    let json = serde_json::to_string_pretty(&output).context("failed to encode records")?;
    std::fs::write(&config.output, json)
        .with_context(|| format!("failed to write {}", config.output.display()))?;
    info!(
        records = output.chances.len(),
        conditional_records = output.chances_by_game.len(),
        "probability records written to {}",
        config.output.display()
    );

    Ok(())
}
