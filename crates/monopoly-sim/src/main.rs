//! Self-play driver for the Monopoly rule engine.
//!
//! Plays `SIM_GAMES` games between random masked agents and prints one JSON
//! summary per game.

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod runner;

use config::SimConfig;

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = SimConfig::from_env()?;
    info!(?config, "Starting simulation...");

    let mut finished = 0;
    for game in 0..config.games {
        let summary = runner::run_game(&config, config.seed.wrapping_add(game))?;
        if !summary.truncated {
            finished += 1;
        }
        println!("{}", serde_json::to_string(&summary)?);
    }

    info!(games = config.games, finished, "simulation complete");
    Ok(())
}
