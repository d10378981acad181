use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use windgrid::{
    engine::Variable,
    scenario::{Scenario, ScenarioLoader},
    snapshot::{DashboardSnapshot, SnapshotWriter},
    sources::{SlipstreamData, WindTurbinesData},
    web::{self, WebServerConfig},
    wind::{Compass, WindConditions},
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Wind turbine wake and placement calculator")]
struct Cli {
    /// Path to the scenario YAML file
    #[arg(long, global = true, default_value = "scenarios/harbor_town.yaml")]
    scenario: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Calculate the dashboard once and print a summary
    Run {
        /// Override the wind direction (N, NO, O, SO, S, SW, W, NW)
        #[arg(long)]
        wind: Option<Compass>,

        /// Override the wind speed in km/h
        #[arg(long)]
        speed: Option<f64>,

        /// Scatter this many small turbines on empty tiles first
        #[arg(long, default_value_t = 0)]
        scatter_small: usize,

        /// Scatter this many big turbines on empty tiles first
        #[arg(long, default_value_t = 0)]
        scatter_big: usize,

        /// Write a dashboard snapshot into this directory
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
    /// Serve the dashboard API
    Serve {
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        #[arg(long, default_value_t = 8080)]
        port: u16,

        /// Directory for periodic snapshots (uses the scenario interval)
        #[arg(long)]
        snapshot_dir: Option<PathBuf>,
    },
}

/// `RUST_LOG` wins over the scenario's configured level.
fn log_directive(rust_log: Option<String>, scenario_level: &str) -> String {
    rust_log
        .filter(|directive| !directive.trim().is_empty())
        .unwrap_or_else(|| scenario_level.to_string())
}

/// The subscriber needs the scenario's level, so the scenario is read first and its
/// load is logged once the subscriber is in place.
fn init_tracing(scenario: &Scenario, path: &Path) {
    let directive = log_directive(std::env::var("RUST_LOG").ok(), &scenario.logging.level);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(directive))
        .init();
    info!(
        scenario = %scenario.name,
        path = %path.display(),
        width = scenario.map.width,
        height = scenario.map.height,
        "scenario loaded"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let scenario = ScenarioLoader::new(".").load(&cli.scenario)?;
    init_tracing(&scenario, &cli.scenario);

    match cli.command {
        Some(Command::Serve {
            host,
            port,
            snapshot_dir,
        }) => {
            println!("Serving '{}' at http://{host}:{port} (Ctrl+C to stop)", scenario.name);
            web::run(WebServerConfig {
                scenario,
                snapshot_dir,
                host,
                port,
            })
            .await
        }
        Some(Command::Run {
            wind,
            speed,
            scatter_small,
            scatter_big,
            snapshot_dir,
        }) => run_once(&scenario, wind, speed, (scatter_small, scatter_big), snapshot_dir),
        None => run_once(&scenario, None, None, (0, 0), None),
    }
}

fn run_once(
    scenario: &Scenario,
    wind: Option<Compass>,
    speed: Option<f64>,
    (scatter_small, scatter_big): (usize, usize),
    snapshot_dir: Option<PathBuf>,
) -> Result<()> {
    let mut map = scenario.build_city();
    let mut manager = scenario.data_manager()?;

    let codes = scenario.config().tile_codes()?;
    map.scatter(scenario.seed, scatter_small, codes.turbines.small);
    map.scatter(scenario.seed.wrapping_add(1), scatter_big, codes.turbines.big);

    let current = *manager.wind();
    manager.set_wind(WindConditions::new(
        wind.unwrap_or(current.compass),
        speed.unwrap_or(current.speed_kmh),
    ));
    manager.calculate(&map)?;

    let wind = manager.wind();
    println!(
        "City '{}': {}x{} tiles, wind {} at {:.1} km/h",
        scenario.name,
        map.width(),
        map.height(),
        wind.compass,
        wind.speed_kmh
    );
    if let Some(slipstream) = manager.source::<SlipstreamData>() {
        println!(
            "  wake: lifespan index {}, fleet output {:.0} kW",
            slipstream.lifespan_index(),
            slipstream.power_kw()
        );
    }
    if let Some(turbines) = manager.source::<WindTurbinesData>() {
        println!("  placement: distances index {}", turbines.distances_index());
    }
    if let Some(Variable::Float(gain)) = manager.get("energy-gain") {
        println!("  energy gain without wake losses: {gain:.0} kW");
    }
    for goal in manager.goals().iter().filter(|goal| !goal.condition) {
        println!(
            "  open goal {} ({:.0}% there)",
            goal.id,
            goal.progress * 100.0
        );
    }

    if let Some(dir) = snapshot_dir {
        let path = SnapshotWriter::new(dir, 1).write(&DashboardSnapshot::capture(&manager, &map))?;
        println!("  snapshot: {}", path.display());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_level_applies_without_rust_log() {
        assert_eq!(log_directive(None, "debug"), "debug");
        assert_eq!(log_directive(Some("  ".into()), "warn"), "warn");
        assert_eq!(
            log_directive(Some("windgrid=trace".into()), "info"),
            "windgrid=trace"
        );
    }

    #[test]
    fn run_is_the_default_command() {
        let cli = Cli::parse_from(["windgrid"]);
        assert!(cli.command.is_none());
        assert_eq!(cli.scenario, PathBuf::from("scenarios/harbor_town.yaml"));

        let cli = Cli::parse_from(["windgrid", "run", "--wind", "SO", "--speed", "54"]);
        match cli.command {
            Some(Command::Run { wind, speed, .. }) => {
                assert_eq!(wind, Some(Compass::SO));
                assert_eq!(speed, Some(54.0));
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
