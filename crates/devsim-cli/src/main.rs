//! Launcher for the device simulation service.

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devsim_core::config::ServiceConfig;

/// Device simulation service.
#[derive(Parser, Debug)]
#[command(name = "devsim")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the REST server.
    Serve {
        /// Host to bind to. Overrides DEVSIM_BIND.
        #[arg(long)]
        host: Option<IpAddr>,
        /// Port to bind to. Overrides DEVSIM_BIND.
        #[arg(short, long)]
        port: Option<u16>,
        /// Directory holding the database. Overrides DEVSIM_DATA_DIR.
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = ServiceConfig::from_env();

    init_tracing(args.verbose, config.log_json);

    match args.command {
        Command::Serve {
            host,
            port,
            data_dir,
        } => {
            config.bind = SocketAddr::new(
                host.unwrap_or(config.bind.ip()),
                port.unwrap_or(config.bind.port()),
            );
            if let Some(dir) = data_dir {
                config.data_dir = dir;
            }
            tracing::info!(bind = %config.bind, data_dir = %config.data_dir.display(), "Starting server");
            devsim_api::run(config).await.context("server failed")
        }
    }
}

fn init_tracing(verbose: bool, json: bool) {
    let default_directive = if verbose { "devsim=debug" } else { "devsim=info" };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_directive));

    if json {
        // For production/container environments
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .compact()
            .init();
    }
}
