//! Emissionwatch CLI
//!
//! Carbon-emission monitoring agent: stream loop, HTTP query surface, and
//! one-shot prediction utilities.

use clap::{Parser, Subcommand};
use emissionwatch::{
    alert::{AlertDispatcher, MemoryDispatcher},
    config::Config,
    features::normalize,
    generator::SyntheticSensor,
    model::{EmissionModel, Predictor},
    monitor::Monitor,
    sensor_log::SensorLog,
    server::{self, ServerConfig},
    VERSION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "emissionwatch")]
#[command(version = VERSION)]
#[command(about = "Carbon-emission monitoring agent", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the stream loop and the HTTP query server
    Run {
        /// HTTP port (overrides config)
        #[arg(long)]
        port: Option<u16>,

        /// Sampling period in seconds (overrides config)
        #[arg(long)]
        period: Option<u64>,

        /// Path to the model artifact (overrides config)
        #[arg(long)]
        model: Option<PathBuf>,

        /// Path to the sensor CSV log (overrides config)
        #[arg(long)]
        log: Option<PathBuf>,

        /// Record alerts in memory instead of sending SMS
        #[arg(long)]
        dry_run: bool,
    },

    /// Predict once from the latest logged sample and print the result
    Predict,

    /// Show the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            port,
            period,
            model,
            log,
            dry_run,
        } => cmd_run(port, period, model, log, dry_run).await,
        Commands::Predict => cmd_predict(),
        Commands::Config => cmd_config(),
    }
}

async fn cmd_run(
    port: Option<u16>,
    period: Option<u64>,
    model_path: Option<PathBuf>,
    log_path: Option<PathBuf>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.http_port = port;
    }
    if let Some(secs) = period {
        config.sample_period = std::time::Duration::from_secs(secs);
    }
    if let Some(path) = model_path {
        config.model_path = path;
    }
    if let Some(path) = log_path {
        config.log_path = path;
    }
    config.ensure_directories()?;

    // No model, no service: fail fast before any task starts.
    let model = EmissionModel::load(&config.model_path).map_err(|e| {
        anyhow::anyhow!(
            "cannot start without a model artifact ({}): {e}",
            config.model_path.display()
        )
    })?;
    let predictor: Arc<dyn Predictor + Send + Sync> = Arc::new(model);

    let dispatcher = Arc::new(if dry_run {
        tracing::info!("dry run: alerts will be recorded, not sent");
        AlertDispatcher::Memory(MemoryDispatcher::new())
    } else {
        AlertDispatcher::from_env()
    });

    let log = SensorLog::new(config.log_path.clone());

    let monitor = Monitor::new(
        Box::new(SyntheticSensor::new()),
        Arc::clone(&predictor),
        Arc::clone(&dispatcher),
        log.clone(),
        &config,
    );

    let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);
    let monitor_task = tokio::spawn(monitor.run(stop_rx));

    let (addr, server_shutdown) = server::run(ServerConfig {
        port: config.http_port,
        log,
        predictor,
        dispatcher,
        display_threshold: config.display_threshold,
    })
    .await?;
    tracing::info!("emissionwatch v{VERSION} running on http://{addr}");

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");

    let _ = stop_tx.send(true);
    let _ = server_shutdown.send(());
    let _ = monitor_task.await;

    Ok(())
}

fn cmd_predict() -> anyhow::Result<()> {
    let config = Config::load()?;
    let model = EmissionModel::load(&config.model_path)
        .map_err(|e| anyhow::anyhow!("model load failed: {e}"))?;

    let log = SensorLog::new(config.log_path.clone());
    match log.latest()? {
        Some(sample) => {
            let prediction = model.predict(&normalize(&sample))?;
            println!("Latest sample: {}", sample.timestamp.format("%Y-%m-%d %H:%M:%S"));
            println!("Predicted emission: {prediction:.2}");
            if prediction > config.display_threshold {
                println!(
                    "Above display threshold {} - mitigation suggested.",
                    config.display_threshold
                );
            }
        }
        None => {
            println!("No data in {} yet.", config.log_path.display());
            println!("Run 'emissionwatch run' to start collecting.");
        }
    }
    Ok(())
}

fn cmd_config() -> anyhow::Result<()> {
    let config = Config::load()?;

    println!("Configuration");
    println!("=============");
    println!();
    println!("Config file: {:?}", Config::config_path());
    println!();
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}
