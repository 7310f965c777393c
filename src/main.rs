//! Path rewrite gateway.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request           ┌──────────────────────────────────────────────┐
//!     ─────────────────────────┼─▶ http server ──▶ normalize ──▶ rewrite table │
//!                              │                                   │          │
//!                              │                 ┌─────────────────┴──┐       │
//!                              │                 ▼                    ▼       │
//!     Client Response          │          JSON resolution      forward to     │
//!     ◀────────────────────────┼───────── (no upstream)        upstream ──────┼──▶ Upstream
//!                              │                                              │
//!                              │  config + watcher │ admin API │ metrics      │
//!                              └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use rewrite_router::config::{load_config, ConfigWatcher, RewriterConfig};
use rewrite_router::lifecycle::signals::shutdown_signal;
use rewrite_router::observability::{logging, metrics};
use rewrite_router::{HttpServer, Shutdown};

#[derive(Parser, Debug)]
#[command(name = "rewrite-router", version, about = "Path rewrite gateway")]
struct Args {
    /// Path to the TOML configuration file. Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Reload the rewrite table when the configuration file changes.
    #[arg(short, long, requires = "config")]
    watch: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => RewriterConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "rewrite-router starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        rules = config.effective_rules().len(),
        builtin = config.rewrites.is_empty(),
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    // The sender half stays alive for the whole run so the reload task never sees a closed channel.
    let (_updates_tx, mut updates) = mpsc::unbounded_channel();
    let _watcher = match (&args.config, args.watch) {
        (Some(path), true) => {
            let (watcher, rx) = ConfigWatcher::new(path);
            updates = rx;
            Some(watcher.run()?)
        }
        _ => None,
    };

    let server = HttpServer::new(config)?;
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    let server_task = tokio::spawn(server.run(listener, updates, server_shutdown));

    shutdown_signal().await;
    shutdown.trigger();

    server_task.await??;
    tracing::info!("Shutdown complete");
    Ok(())
}
