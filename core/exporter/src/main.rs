//! realtime-exporter entrypoint.
//!
//! Polls the realtime service's join/leave log, folds new records into the
//! aggregation engine, checkpoints engine state, and serves the current
//! metrics in Prometheus text format.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use realtime_core::{load_config, ExporterConfig, SnapshotStore, EXPORTER_VERSION};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod poller;
mod server;
mod state;

use state::SharedState;

#[derive(Parser, Debug)]
#[command(name = "realtime-exporter")]
#[command(about = "Prometheus exporter for realtime metrics")]
#[command(version)]
struct Cli {
    /// TOML config file; CLI flags override its values
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Path to the directory containing log files
    #[arg(long, value_name = "DIR")]
    logs_path: Option<PathBuf>,

    /// Time in seconds between log checks
    #[arg(long, value_name = "SECS")]
    polling_time: Option<u64>,

    /// Path to file for saving/loading state (optional)
    #[arg(long, value_name = "PATH")]
    savestate_file: Option<PathBuf>,

    /// Port to serve metrics on
    #[arg(long)]
    port: Option<u16>,

    /// Address to bind the metrics server to
    #[arg(long, value_name = "ADDR")]
    bind_address: Option<String>,
}

impl Cli {
    fn apply_to(self, mut config: ExporterConfig) -> ExporterConfig {
        if let Some(logs_path) = self.logs_path {
            config.logs_path = logs_path;
        }
        if let Some(polling_time) = self.polling_time {
            config.polling_time_secs = polling_time;
        }
        if let Some(savestate_file) = self.savestate_file {
            config.savestate_file = Some(savestate_file);
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        if let Some(bind_address) = self.bind_address {
            config.bind_address = bind_address;
        }
        config
    }
}

fn main() {
    init_logging();
    let cli = Cli::parse();

    let file_config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            error!(error = %err, "Failed to load exporter config");
            std::process::exit(1);
        }
    };
    let config = cli.apply_to(file_config);

    let store = config.savestate_file.clone().map(SnapshotStore::new);
    let shared_state = Arc::new(SharedState::restore(store));

    let address = config.listen_address();
    let listener = match server::bind(&address) {
        Ok(listener) => listener,
        Err(err) => {
            error!(error = %err, address = %address, "Failed to bind metrics server");
            std::process::exit(1);
        }
    };
    server::spawn(listener, Arc::clone(&shared_state));
    info!(
        version = EXPORTER_VERSION,
        address = %address,
        "Starting Prometheus exporter"
    );

    poller::run(&shared_state, &config);
}

fn init_logging() {
    let debug_enabled = env::var("REALTIME_EXPORTER_DEBUG_LOG")
        .map(|value| matches!(value.as_str(), "1" | "true" | "TRUE" | "yes" | "YES"))
        .unwrap_or(false);
    let filter = if debug_enabled {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
