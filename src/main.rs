//! caddyfile-sync
//!
//! Watches a Docker engine (containers, and services and configs when swarm
//! mode is active), turns their labels into a Caddyfile and pushes it to a
//! running Caddy whenever it changes.
//!
//! # Architecture Overview
//!
//! ```text
//!                ┌────────────────────────────────────────────────────────┐
//!                │                    CADDYFILE-SYNC                      │
//!                │                                                        │
//!  Docker        │  ┌───────────┐   ┌──────────┐   ┌──────────────────┐   │
//!  Engine ───────┼─▶│ discovery │──▶│  labels  │──▶│    directive     │   │
//!  (API, events) │  │ + targets │   │  parser  │   │ merge + writer   │   │
//!                │  └─────┬─────┘   └──────────┘   └────────┬─────────┘   │
//!                │        │ events                          │ document    │
//!                │        ▼                                 ▼             │
//!                │  ┌──────────────────────────────────────────────────┐  │
//!                │  │      reconcile (controller actor + generator)    │  │
//!                │  └─────────────────────────┬────────────────────────┘  │
//!                │                            │ changed?                  │
//!                │                            ▼                           │
//!                │                     ┌─────────────┐                    │
//!                │                     │    apply    │────────────────────┼──▶ Caddy
//!                │                     └─────────────┘                    │    admin API
//!                │                                                        │
//!                │  Cross-cutting: config, availability, observability,   │
//!                │  lifecycle, resilience                                 │
//!                └────────────────────────────────────────────────────────┘
//! ```

use std::io::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::sync::mpsc;

use caddyfile_sync::config::watcher::SeedWatcher;
use caddyfile_sync::config::{load_settings, Cli};
use caddyfile_sync::directive::EMPTY_DOCUMENT;
use caddyfile_sync::discovery::{DockerClient, Orchestrator};
use caddyfile_sync::lifecycle::{signals, Shutdown};
use caddyfile_sync::observability::{logging, metrics};
use caddyfile_sync::reconcile::{
    ActiveDocument, Applier, CaddyAdminApplier, EventSubscription, Generator, MemoryApplier,
    ReconcileController,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let settings = load_settings(&cli, |name| std::env::var(name).ok())?;

    logging::init(Some(&settings.observability.log_level));
    tracing::info!("caddyfile-sync v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        label_prefix = %settings.label_prefix,
        caddyfile_path = ?settings.caddyfile_path,
        ignore_swarm_error = settings.ignore_swarm_error,
        proxy_service_tasks = settings.proxy_service_tasks,
        validate_network = settings.validate_network,
        process_caddyfile = settings.process_caddyfile,
        polling_interval_ms = settings.timing.polling_interval.as_millis() as u64,
        "Configuration loaded"
    );

    if settings.observability.metrics_enabled {
        match settings.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %settings.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let docker = DockerClient::connect(&settings.docker.host).await?;
    tracing::info!(host = %settings.docker.host, "Connected to Docker engine");
    let orchestrator: Arc<dyn Orchestrator> = Arc::new(docker);

    let mut generator = Generator::new(orchestrator.clone(), &settings);

    if cli.once {
        let generation = generator.generate().await?;
        for line in generation.log.lines() {
            tracing::info!("{}", line);
        }
        let mut stdout = std::io::stdout().lock();
        if generation.document.is_empty() {
            writeln!(stdout, "{}", EMPTY_DOCUMENT)?;
        } else {
            stdout.write_all(&generation.document)?;
        }
        return Ok(());
    }

    let active = Arc::new(ActiveDocument::new());
    let applier: Arc<dyn Applier> = if settings.caddy.admin_url.is_empty() {
        tracing::warn!("No Caddy admin URL set, documents are kept in memory only");
        Arc::new(MemoryApplier::new(active.clone()))
    } else {
        Arc::new(CaddyAdminApplier::new(
            &settings.caddy.admin_url,
            Duration::from_secs(settings.caddy.timeout_secs),
            active.clone(),
        )?)
    };

    let shutdown = Arc::new(Shutdown::new());
    let (trigger_tx, trigger_rx) = mpsc::unbounded_channel();

    let _seed_watcher = match &settings.caddyfile_path {
        Some(path) => match SeedWatcher::new(path, trigger_tx.clone()).run() {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                tracing::warn!(error = %e, "Seed watcher unavailable, relying on polling");
                None
            }
        },
        None => None,
    };

    let mut events = EventSubscription::new(orchestrator.clone(), trigger_tx.clone());
    if settings.resubscribe_events {
        events = events.with_resubscribe(settings.timing.resubscribe_max_delay);
    }
    let events_task = tokio::spawn(events.run(shutdown.subscribe()));

    let controller = ReconcileController::new(generator, applier, &settings);
    let controller_task = tokio::spawn(controller.run(trigger_rx, shutdown.subscribe()));

    signals::handle_signals(shutdown.clone(), trigger_tx).await?;

    let _ = events_task.await;
    let _ = controller_task.await;

    tracing::info!(activations = active.version(), "Shutdown complete");
    Ok(())
}
