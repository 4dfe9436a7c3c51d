//! WeMo Watch - headless watcher for WeMo devices.
//!
//! Discovers devices on the local network, subscribes to their events and
//! logs every device found, lost or switched until interrupted.

mod config;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use wemo_core::{fuzzy_match, DeviceEvent, Environment, EventEmitter};

use crate::config::WatchConfig;

/// WeMo Watch - log WeMo device discovery and state changes.
#[derive(Parser, Debug)]
#[command(name = "wemo-watch")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (YAML).
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace).
    #[arg(short, long, default_value = "info", env = "WEMO_LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// IP address devices should send events to (overrides config file).
    #[arg(short = 'a', long, env = "WEMO_ADVERTISE_IP")]
    advertise_ip: Option<std::net::IpAddr>,

    /// Only report devices whose name fuzzy-matches NAME.
    #[arg(short = 'm', long = "match", value_name = "NAME", env = "WEMO_MATCH")]
    name_filter: Option<String>,

    /// Print each device's services and actions when it is found.
    #[arg(short, long)]
    explain: bool,
}

/// Logs device events for devices passing the name filter.
struct WatchEmitter {
    filter: Option<String>,
}

impl WatchEmitter {
    fn accepts(&self, name: &str) -> bool {
        self.filter
            .as_deref()
            .map_or(true, |pattern| fuzzy_match(pattern, name))
    }
}

impl EventEmitter for WatchEmitter {
    fn emit(&self, event: DeviceEvent) {
        match event {
            DeviceEvent::Found {
                name, kind, host, ..
            } if self.accepts(&name) => {
                log::info!("Found {} ({}) at {}", name, kind, host);
            }
            DeviceEvent::Gone { name, reason, .. } if self.accepts(&name) => {
                log::warn!("Lost {}: {}", name, reason);
            }
            DeviceEvent::StateChanged { name, state, .. } if self.accepts(&name) => {
                log::info!("{} is now {}", name, state);
            }
            _ => {}
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    env_logger::Builder::new()
        .filter_level(args.log_level)
        .format_timestamp_millis()
        .init();

    log::info!("WeMo Watch v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config =
        WatchConfig::load(args.config.as_deref()).context("Failed to load configuration")?;

    // Apply CLI overrides
    if let Some(ip) = args.advertise_ip {
        config.environment.advertise_ip = Some(ip);
    }
    if let Some(filter) = args.name_filter {
        config.name_filter = Some(filter);
    }
    if args.explain {
        config.explain = true;
    }

    log::info!(
        "Configuration: kinds={:?}, callback_ports={}-{}, advertise_ip={}",
        config.environment.device_kinds,
        config.environment.callback_port_range.0,
        config.environment.callback_port_range.1,
        config
            .environment
            .advertise_ip
            .map_or_else(|| "auto".to_string(), |ip| ip.to_string())
    );

    let explain = config.explain;
    let filter = config.name_filter.clone();
    let emitter = Arc::new(WatchEmitter {
        filter: filter.clone(),
    });

    let env = Environment::builder(config.environment)
        .emitter(emitter)
        .on_discovered(move |device| {
            let wanted = filter
                .as_deref()
                .map_or(true, |pattern| fuzzy_match(pattern, device.name()));
            if explain && wanted {
                log::info!("{} services:\n{}", device.name(), device.explain());
            }
        })
        .build()
        .context(
            "Failed to set up the environment. If local IP detection failed, \
             specify --advertise-ip or set WEMO_ADVERTISE_IP to an address the \
             devices can reach.",
        )?;

    env.start().await.context("Failed to start discovery")?;
    log::info!(
        "Listening for events on {}",
        env.registry().callback_url()
    );

    // Wait for shutdown signal
    shutdown_signal().await;

    log::info!("Shutdown signal received, cleaning up...");
    env.stop().await;

    log::info!("Shutdown complete");
    Ok(())
}

/// Waits for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            log::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                log::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
