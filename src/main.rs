//! Destination relay service.
//!
//! ```text
//!   Client (bearer JWT)
//!        │
//!        ▼
//!  ┌────────────┐   ┌──────────┐   ┌──────────────────────────────────────┐
//!  │ http server│──▶│ routing  │──▶│ DestinationClient                    │
//!  │ + JWT      │   │ tenant → │   │ token → resolve → token → build →    │
//!  └────────────┘   │ dest.    │   │ execute (via connectivity proxy)     │
//!        ▲          └──────────┘   └──────────────────┬───────────────────┘
//!        │                                            │
//!        └────────── HTML result / error ◀────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use destination_relay::config::watcher::ConfigWatcher;
use destination_relay::config::{load_config, load_from_env};
use destination_relay::http::HttpServer;
use destination_relay::lifecycle::{shutdown_signal, Shutdown};
use destination_relay::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "destination-relay", version, about = "Multi-tenant destination relay")]
struct Args {
    /// TOML configuration file; defaults plus environment when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => load_from_env()?,
    };

    init_logging(&config.observability)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        local = config.mode().is_local(),
        bind_address = %config.listener.bind_address,
        tenants = config.tenants.len(),
        "destination-relay starting"
    );

    if config.observability.metrics_enabled {
        metrics::init_metrics(config.observability.metrics_address.parse()?)?;
    }

    // The watcher must outlive the server.
    let (config_updates, _watcher) = match &args.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => (tokio::sync::mpsc::unbounded_channel().1, None),
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config)?;
    let mut server_task = tokio::spawn(server.run(listener, config_updates, shutdown.subscribe()));

    let result = tokio::select! {
        res = &mut server_task => res,
        _ = shutdown_signal() => {
            shutdown.trigger();
            server_task.await
        }
    };
    result??;
    tracing::info!("Shutdown complete");
    Ok(())
}
