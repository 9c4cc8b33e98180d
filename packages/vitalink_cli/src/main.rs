//! `vitalink` binary: run the wearable-side producer or the collector.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use vitalink::collector::CollectorServer;
use vitalink::config::{CollectorConfig, ProducerConfig, StoreConfig};
use vitalink::devices::{
    Actuator, LogActuator, SimulatedImu, SimulatedOximeter, SysfsBuzzer,
};
use vitalink::producer::{ProducerLoop, TelemetryLink};
use vitalink::sinks::{CsvFileLog, KeyedHistory, LocalJsonStore, RealtimeMirror, RestStore, SinkSet};

#[derive(Parser)]
#[command(name = "vitalink", version, about = "Wearable vital-sign telemetry pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sample sensors and stream records to a collector
    Producer {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Collector address (host:port)
        #[arg(long)]
        collector: Option<String>,
        /// Milliseconds between cycles
        #[arg(long)]
        period_ms: Option<u64>,
        /// Stop after this many cycles
        #[arg(long)]
        cycles: Option<u64>,
        /// Drive a buzzer on this sysfs GPIO pin
        #[arg(long)]
        buzzer_pin: Option<u32>,
        /// Seed for the simulated sensors
        #[arg(long)]
        seed: Option<u64>,
        /// Inject a simulated fall at this cycle
        #[arg(long)]
        fall_at: Option<u64>,
    },
    /// Accept producer connections and persist their records
    Collector {
        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Listen address (host:port)
        #[arg(long)]
        listen: Option<String>,
        /// CSV log path
        #[arg(long)]
        csv: Option<PathBuf>,
        /// Mirror into this local directory instead of the configured store
        #[arg(long)]
        store_dir: Option<PathBuf>,
    },
    /// Print a default config file
    DefaultConfig {
        #[arg(value_parser = ["producer", "collector"])]
        side: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Producer {
            config,
            collector,
            period_ms,
            cycles,
            buzzer_pin,
            seed,
            fall_at,
        } => {
            let mut config = match config {
                Some(path) => ProducerConfig::from_file(path)?,
                None => ProducerConfig::default(),
            };
            if let Some(addr) = collector {
                config.collector_addr = addr;
            }
            if let Some(ms) = period_ms {
                config.period_ms = ms;
            }
            if cycles.is_some() {
                config.max_cycles = cycles;
            }
            if buzzer_pin.is_some() {
                config.buzzer_pin = buzzer_pin;
            }
            if seed.is_some() {
                config.simulation_seed = seed;
            }
            config.validate()?;
            run_producer(config, fall_at).await
        }
        Commands::Collector {
            config,
            listen,
            csv,
            store_dir,
        } => {
            let mut config = match config {
                Some(path) => CollectorConfig::from_file(path)?,
                None => CollectorConfig::default(),
            };
            if let Some(addr) = listen {
                config.listen_addr = addr;
            }
            if let Some(path) = csv {
                config.csv_path = path;
            }
            if let Some(dir) = store_dir {
                config.store = StoreConfig::Local { dir };
            }
            config.validate()?;
            run_collector(config).await
        }
        Commands::DefaultConfig { side } => {
            let text = if side == "producer" {
                serde_json::to_string_pretty(&ProducerConfig::default())?
            } else {
                serde_json::to_string_pretty(&CollectorConfig::default())?
            };
            println!("{}", text);
            Ok(())
        }
    }
}

async fn run_producer(config: ProducerConfig, fall_at: Option<u64>) -> anyhow::Result<()> {
    // Connect before touching the buzzer so no exit path leaves the pin exported.
    let link = match TelemetryLink::connect_until(
        &config.collector_addr,
        config.connect_timeout(),
        interrupted(),
    )
    .await?
    {
        Some(link) => link,
        None => return Ok(()),
    };

    let actuator: Box<dyn Actuator> = match config.buzzer_pin {
        Some(pin) => Box::new(
            SysfsBuzzer::open(pin)
                .await
                .with_context(|| format!("cannot open buzzer on GPIO {}", pin))?,
        ),
        None => Box::new(LogActuator::new()),
    };

    let mut imu = SimulatedImu::new(config.simulation_seed);
    if let Some(cycle) = fall_at {
        imu = imu.with_fall_at(cycle);
    }
    let oximeter = SimulatedOximeter::new(config.simulation_seed);
    let producer = ProducerLoop::new(&config, Box::new(oximeter), Box::new(imu), actuator);

    let summary = producer.run_until(link, interrupted()).await?;
    log::info!(
        "Producer stopped ({:?}) after {} cycles, {} alerts",
        summary.stop,
        summary.cycles,
        summary.alerts
    );
    Ok(())
}

async fn run_collector(config: CollectorConfig) -> anyhow::Result<()> {
    let log = Arc::new(CsvFileLog::open(&config.csv_path)?);
    log::info!("Durable log at {}", log.path().display());

    let (mirror, history): (Arc<dyn RealtimeMirror>, Arc<dyn KeyedHistory>) = match &config.store {
        StoreConfig::Local { dir } => {
            let store = Arc::new(LocalJsonStore::open(dir).await?);
            (store.clone(), store)
        }
        StoreConfig::Rest {
            base_url,
            auth_token,
            timeout_ms,
        } => {
            let store = Arc::new(RestStore::new(
                base_url,
                auth_token.clone(),
                std::time::Duration::from_millis(*timeout_ms),
            )?);
            log::info!("Mirroring to {}", base_url);
            (store.clone(), store)
        }
    };

    let server = CollectorServer::bind(&config.listen_addr, SinkSet::new(log, mirror, history)).await?;
    let stats = server.serve_until(interrupted()).await?;
    log::info!(
        "Collector stopped: {} connections, {} records, {} skipped, {} sink failures",
        stats.connections,
        stats.records,
        stats.skipped,
        stats.sink_failures
    );
    Ok(())
}

async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
