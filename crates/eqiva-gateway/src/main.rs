//! Eqiva Gateway - MQTT bridge for eQ-3 radiator thermostats.
//!
//! Run with: `cargo run -p eqiva-gateway`

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::info;

use eqiva_core::{BleTransport, Thermostat};
use eqiva_gateway::{Config, Gateway, mqtt};

/// Eqiva Gateway - MQTT bridge for eQ-3 radiator thermostats.
#[derive(Parser, Debug)]
#[command(name = "eqiva-gateway")]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// MQTT broker URL (overrides config).
    #[arg(short, long, global = true)]
    broker: Option<String>,

    /// Topic root (overrides config).
    #[arg(long, global = true)]
    device_name: Option<String>,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the MQTT gateway in the foreground (default behavior).
    Run,

    /// Scan for thermostats and print `{"devices": [...]}`.
    Scan {
        /// Scan duration in seconds (overrides config).
        #[arg(short, long)]
        duration: Option<u64>,
    },

    /// Send one request to a thermostat and print the JSON result.
    Send {
        /// Thermostat address, e.g. 00:1A:22:0C:3B:7F.
        #[arg(long)]
        mac: String,

        /// Command name (status, mode, temp, get_timer, ...).
        #[arg(long)]
        cmd: String,

        /// Command parameters as JSON.
        #[arg(long)]
        params: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(format!("eqiva_gateway={level}").parse()?)
                .add_directive(format!("eqiva_core={level}").parse()?),
        )
        .init();

    // Load configuration
    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    // Override config with CLI args
    if let Some(broker) = args.broker {
        config.mqtt.broker = broker;
    }
    if let Some(device_name) = args.device_name {
        config.mqtt.device_name = device_name;
    }
    if let Some(Command::Scan {
        duration: Some(secs),
    }) = &args.command
    {
        config.thermostat.scan_seconds = *secs;
    }
    config.validate()?;

    let transport = BleTransport::new()
        .await
        .context("Failed to open Bluetooth adapter")?;
    let session = config.thermostat.session_config()?;
    let gateway = Gateway::new(
        Thermostat::new(transport, session),
        config.thermostat.scan_duration(),
    );

    match args.command {
        Some(Command::Run) | None => run_gateway(&config, gateway).await,
        Some(Command::Scan { .. }) => {
            println!("{}", gateway.scan().await);
            Ok(())
        }
        Some(Command::Send { mac, cmd, params }) => {
            let params: Value = match params {
                Some(raw) => serde_json::from_str(&raw).context("--params is not valid JSON")?,
                None => Value::Null,
            };
            let request = serde_json::json!({ "mac": mac, "cmd": cmd, "params": params });
            let response = gateway.handle_request(request.to_string().as_bytes()).await;
            println!("{}", serde_json::to_string_pretty(&response)?);
            Ok(())
        }
    }
}

async fn run_gateway(config: &Config, gateway: Gateway<BleTransport>) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        }
        signal.cancel();
    });

    info!(
        "Starting gateway on {} with topic root '{}'",
        config.mqtt.broker, config.mqtt.device_name
    );
    mqtt::run(&config.mqtt, Arc::new(gateway), shutdown).await?;
    Ok(())
}
