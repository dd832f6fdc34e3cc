//! Bingo engine server
//!
//! Opens the draw store, runs the scheduling sweeps and serves the HTTP API.

use bingo_settlement::{api::ApiServer, DrawEngine, DrawScheduler, EngineConfig};
use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "bingo-engine")]
#[command(about = "Bingo draw progression and prize settlement engine", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(long)]
    config: Option<String>,

    /// Use the development preset (fast ticks, store cleared on start)
    #[arg(long, conflicts_with = "config")]
    dev: bool,

    /// Override the data directory
    #[arg(long)]
    data_dir: Option<String>,

    /// Override the API host
    #[arg(long)]
    host: Option<String>,

    /// Override the API port
    #[arg(long)]
    port: Option<u16>,

    /// Do not run the auto-start and settlement sweeps
    #[arg(long)]
    no_scheduler: bool,
}

fn load_config(args: &Args) -> Result<EngineConfig, Box<dyn std::error::Error>> {
    let mut config = match (&args.config, args.dev) {
        (Some(path), _) => EngineConfig::from_toml_file(path)?,
        (None, true) => EngineConfig::development(),
        (None, false) => EngineConfig::default(),
    };

    if let Some(dir) = &args.data_dir {
        config.storage.data_directory = dir.clone();
    }
    if let Some(host) = &args.host {
        config.api.host = host.clone();
    }
    if let Some(port) = args.port {
        config.api.port = port;
    }
    if args.no_scheduler {
        config.scheduler.enabled = false;
    }

    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(&args)?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.monitoring.log_filter.clone().into()),
        )
        .init();

    tracing::info!("Starting bingo engine");
    tracing::info!("   Data directory: {}", config.storage.data_directory);
    tracing::info!("   Auto tick interval: {}ms", config.draws.auto_tick_interval_ms);

    let engine = DrawEngine::open(config.clone())?;

    let scheduler = if config.scheduler.enabled {
        Some(DrawScheduler::spawn(engine.clone(), &config.scheduler))
    } else {
        tracing::warn!("Scheduler disabled; draws start and settle only on request");
        None
    };

    let result = ApiServer::new(config.api.clone(), engine.clone()).run().await;

    if let Some(scheduler) = scheduler {
        scheduler.stop();
    }
    engine.shutdown();
    tracing::info!("Bingo engine stopped");

    result
}
