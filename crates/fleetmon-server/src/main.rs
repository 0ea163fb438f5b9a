use anyhow::Result;
use chrono::Utc;
use fleetmon_server::config::FleetmonConfig;
use fleetmon_server::seed::{self, DEFAULT_SEED_COUNT, DEFAULT_SEED_HOST};
use fleetmon_server::state::AppState;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "config/fleetmon.toml";

#[allow(clippy::print_stderr)]
fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  fleetmon-server [config.toml]                              Run collector and evaluator");
    eprintln!("  fleetmon-server collect-once <config.toml>                 Run a single collection sweep");
    eprintln!("  fleetmon-server evaluate-once <config.toml>                Run a single evaluation pass");
    eprintln!("  fleetmon-server seed-machines <config.toml> [host] [count] Create node-01..node-NN machines");
    eprintln!("  fleetmon-server seed-demo <config.toml>                    Insert demo samples and evaluate");
    eprintln!("  fleetmon-server incidents <config.toml> [hours]            List recent incidents as JSON");
}

fn require_config<'a>(args: &'a [String], command: &str) -> Result<&'a str> {
    args.get(2).map(|s| s.as_str()).ok_or_else(|| {
        print_usage();
        anyhow::anyhow!("{command} requires a <config.toml> argument")
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    fleetmon_common::id::init(1, 1);

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("fleetmon=info".parse()?))
        .init();

    let args: Vec<String> = std::env::args().collect();

    match args.get(1).map(|s| s.as_str()) {
        Some("--help") | Some("-h") => {
            print_usage();
            Ok(())
        }
        Some("collect-once") => run_collect_once(require_config(&args, "collect-once")?).await,
        Some("evaluate-once") => run_evaluate_once(require_config(&args, "evaluate-once")?).await,
        Some("seed-machines") => {
            let config_path = require_config(&args, "seed-machines")?;
            let host = args.get(3).map(|s| s.as_str()).unwrap_or(DEFAULT_SEED_HOST);
            let count = match args.get(4) {
                Some(raw) => raw
                    .parse::<u32>()
                    .map_err(|e| anyhow::anyhow!("Invalid machine count '{raw}': {e}"))?,
                None => DEFAULT_SEED_COUNT,
            };
            run_seed_machines(config_path, host, count)
        }
        Some("seed-demo") => run_seed_demo(require_config(&args, "seed-demo")?).await,
        Some("incidents") => {
            let config_path = require_config(&args, "incidents")?;
            let hours = match args.get(3) {
                Some(raw) => raw
                    .parse::<i64>()
                    .map_err(|e| anyhow::anyhow!("Invalid hours '{raw}': {e}"))?,
                None => 24,
            };
            run_incidents(config_path, hours)
        }
        Some(path) if !path.starts_with('-') => run_server(path).await,
        Some(other) => {
            print_usage();
            anyhow::bail!("Unknown option '{other}'")
        }
        None => run_server(DEFAULT_CONFIG_PATH).await,
    }
}

async fn run_server(config_path: &str) -> Result<()> {
    let config = FleetmonConfig::load(config_path)?;
    tracing::info!(config = config_path, data_dir = %config.data_dir, "Loaded configuration");
    let state = AppState::build(config)?;

    let cancel = CancellationToken::new();
    let mut handles = Vec::new();

    if state.config.collector.enabled {
        let collector = state.collector.clone();
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { collector.run(token).await }));
    } else {
        tracing::info!("Collector disabled");
    }

    if state.config.evaluator.enabled {
        let evaluator = state.evaluator.clone();
        let token = cancel.clone();
        handles.push(tokio::spawn(async move { evaluator.run(token).await }));
    } else {
        tracing::info!("Evaluator disabled");
    }

    signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received, draining schedulers");
    cancel.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Scheduler task panicked");
        }
    }

    tracing::info!("fleetmon-server stopped");
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_collect_once(config_path: &str) -> Result<()> {
    let state = AppState::build(FleetmonConfig::load(config_path)?)?;
    let report = state.collector.run_sweep().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[allow(clippy::print_stdout)]
async fn run_evaluate_once(config_path: &str) -> Result<()> {
    let state = AppState::build(FleetmonConfig::load(config_path)?)?;
    let report = state.evaluator.run_pass().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn run_seed_machines(config_path: &str, host: &str, count: u32) -> Result<()> {
    let state = AppState::build(FleetmonConfig::load(config_path)?)?;
    let summary = seed::seed_machines(state.storage.as_ref(), host, count)?;
    tracing::info!(
        created = summary.created,
        existing = summary.existing,
        host,
        "Machine seeding complete"
    );
    Ok(())
}

async fn run_seed_demo(config_path: &str) -> Result<()> {
    let state = AppState::build(FleetmonConfig::load(config_path)?)?;
    let demo = seed::seed_demo(state.storage.as_ref(), state.storage.as_ref(), Utc::now())?;
    if demo.seeded.is_empty() {
        anyhow::bail!("No demo machines found; run seed-machines first");
    }
    tracing::info!(
        machines = demo.seeded.len(),
        samples = demo.samples,
        "Demo samples inserted"
    );

    let report = state.evaluator.run_pass().await?;
    tracing::info!(
        opened = report.opened,
        touched = report.touched,
        resolved = report.resolved,
        "Demo incidents evaluated"
    );
    Ok(())
}

#[allow(clippy::print_stdout)]
fn run_incidents(config_path: &str, hours: i64) -> Result<()> {
    let state = AppState::build(FleetmonConfig::load(config_path)?)?;
    let entries = seed::recent_incidents(state.storage.as_ref(), Utc::now(), hours)?;
    println!("{}", serde_json::to_string_pretty(&entries)?);
    Ok(())
}
