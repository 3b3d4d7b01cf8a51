//! loadlab: controlled fault/load-injection service.
//!
//! # Architecture Overview
//! ```text
//!                    ┌──────────────────────────────────────────────┐
//!                    │                   LOADLAB                     │
//!                    │                                               │
//!   Client Request   │  ┌──────────┐   ┌───────────────┐            │
//!   ─────────────────┼─▶│  http    │──▶│ instrumentation│            │
//!                    │  │  server  │   │    pipeline    │            │
//!                    │  └──────────┘   └───────┬────────┘            │
//!                    │                         ▼                     │
//!                    │                  ┌──────────────┐             │
//!                    │                  │    probes    │             │
//!                    │                  └──┬───────┬───┘             │
//!                    │            ┌────────┘       └───────┐         │
//!                    │            ▼                        ▼         │
//!                    │     ┌────────────┐          ┌─────────────┐   │
//!                    │     │  fan-out   │          │   bounded   │   │
//!                    │     │orchestrator│          │resource pool│   │
//!                    │     └─────┬──────┘          └─────────────┘   │
//!                    │           ▼                                   │
//!                    │    ┌─────────────┐                            │
//!                    │    │ downstream  │───────────────────────────▶│ Downstream
//!                    │    │   client    │                            │ Service
//!                    │    └─────────────┘                            │
//!                    │                                               │
//!                    │  ┌─────────────────────────────────────────┐ │
//!                    │  │         Cross-Cutting Concerns           │ │
//!                    │  │  ┌────────┐ ┌─────────┐ ┌─────────────┐ │ │
//!                    │  │  │ config │ │ metrics │ │  lifecycle  │ │ │
//!                    │  │  │        │ │ registry│ │   shutdown  │ │ │
//!                    │  │  └────────┘ └─────────┘ └─────────────┘ │ │
//!                    │  └─────────────────────────────────────────┘ │
//!                    └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use loadlab::config::{load_config, ServiceConfig};
use loadlab::http::HttpServer;
use loadlab::lifecycle::Shutdown;
use loadlab::observability::logging::init_logging;

#[derive(Debug, Parser)]
#[command(name = "loadlab", about = "Controlled fault/load-injection service")]
struct Args {
    /// Path to a TOML config file. Defaults are used when omitted.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the configured bind address.
    #[arg(long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        pool_capacity = config.pool.capacity,
        downstream_url = %config.downstream.base_url,
        "configuration loaded"
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "listening for connections");

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        shutdown.listen_for_ctrl_c().await;
    });

    let server = HttpServer::new(config);
    server.run(listener, server_shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
