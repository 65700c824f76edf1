// src/main.rs - Furnace simulator entry point
use std::fs::File;
use std::io::LineWriter;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use furnace_sim::{
    horizon_for_minutes, load_config, load_config_or_default, ConfigError, MemoryPlatform,
    Orchestrator, TelemetryClient, DEFAULT_CONFIG_PATH, DEFAULT_RUN_MINUTES,
};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Simulate furnace assets and deliver their telemetry.
#[derive(Debug, Parser)]
#[command(name = "furnace-sim", version)]
struct Cli {
    /// Asset model whose assets are simulated
    model_id: String,

    /// Simulated run length, in minutes
    #[arg(default_value_t = DEFAULT_RUN_MINUTES)]
    run_minutes: u64,

    /// Configuration file [default: furnace.toml, built-in defaults if absent]
    #[arg(long)]
    config: Option<PathBuf>,

    /// Mirror every delivered write to this file as JSON lines ("-" for stdout)
    #[arg(long)]
    output: Option<PathBuf>,

    /// Seed for every random draw
    #[arg(long)]
    seed: Option<u64>,

    /// Real seconds per simulated second
    #[arg(long)]
    factor: Option<f64>,

    /// Fail when the simulation falls behind the wall clock
    #[arg(long)]
    strict: bool,

    /// Run as fast as possible instead of pacing to the wall clock
    #[arg(long, conflicts_with_all = ["factor", "strict"])]
    unthrottled: bool,
}

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    // Missing model id: clap prints usage and exits non-zero
    let cli = Cli::parse();

    tracing::info!("Starting furnace simulator");
    tracing::info!("Version: {}", env!("CARGO_PKG_VERSION"));
    let loaded = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)
        }
        None => load_config_or_default(DEFAULT_CONFIG_PATH),
    };
    let mut config = loaded.map_err(|e| {
        tracing::error!("Failed to load config: {}", e);
        Box::new(e) as BoxError
    })?;

    if let Some(seed) = cli.seed {
        config.seed = Some(seed);
    }
    if let Some(factor) = cli.factor {
        config.clock.factor = factor;
    }
    if cli.strict {
        config.clock.strict = true;
    }
    if cli.unthrottled {
        config.clock.realtime = false;
    }
    config.validate().map_err(|e| {
        tracing::error!("Invalid configuration: {}", e);
        Box::new(e) as BoxError
    })?;

    if cli.model_id.trim().is_empty() {
        tracing::error!("Usage: furnace-sim <MODEL_ID> [RUN_MINUTES]");
        return Err(ConfigError::Invalid("model id must not be empty".into()).into());
    }
    if cli.run_minutes == 0 {
        tracing::error!("Run length must be at least one minute");
        return Err(ConfigError::Invalid("run length must be at least one minute".into()).into());
    }

    let mut platform = MemoryPlatform::from_fleet(&config.fleet).without_history();
    match cli.output.as_deref() {
        Some(path) if path.as_os_str() == "-" => {
            platform = platform.with_recorder(Box::new(std::io::stdout()));
        }
        Some(path) => {
            let file = File::create(path)?;
            tracing::info!("Writing telemetry to {}", path.display());
            platform = platform.with_recorder(Box::new(LineWriter::new(file)));
        }
        None => {}
    }
    let platform = Arc::new(platform);

    let client = Arc::new(TelemetryClient::new(
        platform.clone(),
        platform.clone(),
        platform.clone(),
        &config.limits,
        &config.retry,
    ));
    let orchestrator = Orchestrator::new(client, &config);

    let report = orchestrator
        .run(&cli.model_id, horizon_for_minutes(cli.run_minutes))
        .await
        .map_err(|e| {
            tracing::error!("Simulation failed: {}", e);
            Box::new(e) as BoxError
        })?;

    tracing::info!(
        "Simulated {} furnaces for {:.0}s: {} events, {} writes, {} failed furnaces",
        report.assets_started.len(),
        report.clock.final_time_secs,
        report.clock.events_dispatched,
        platform.write_count(),
        report.clock.failures.len()
    );
    tracing::info!("Run report: {}", serde_json::to_string(&report)?);

    Ok(())
}
