//! cellroute route-emitter
//!
//! This service:
//! - Syncs the routing table from the desired/actual state store
//! - Applies LRP events between syncs
//! - Emits registry messages for every change

use std::sync::Arc;

use anyhow::Result;
use cellroute_route_emitter::{
    sync, Config, EmitterMetrics, HttpStateSource, LogEmitter, StateSource, Watcher,
};
use cellroute_routing_table::RoutingTable;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing (prefer RUST_LOG, fallback to ROUTE_EMITTER_LOG_LEVEL)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting cellroute route-emitter");
    info!(
        state_url = %config.state_url,
        sync_interval_secs = config.sync_interval.as_secs(),
        event_poll_interval_ms = config.event_poll_interval.as_millis() as u64,
        event_fetch_limit = config.event_fetch_limit,
        cursor_file = ?config.cursor_file,
        emit_interval_secs = config.emit_interval.map(|d| d.as_secs()),
        "Configuration loaded"
    );

    let source: Arc<dyn StateSource> = Arc::new(HttpStateSource::from_config(&config)?);
    let table = Arc::new(RoutingTable::new());
    let metrics = Arc::new(EmitterMetrics::new());
    let watcher = Arc::new(Watcher::new(
        Arc::clone(&table),
        Arc::new(LogEmitter::new()),
        Arc::clone(&metrics),
    ));

    // The feed position is fixed before the first sync so every later
    // event is either in the sync's listings or applied on top of them.
    let cursor = sync::initial_cursor(&config, source.as_ref()).await?;

    tokio::spawn(sync::run_sync_loop(
        config.sync_interval,
        Arc::clone(&source),
        Arc::clone(&watcher),
    ));

    if let Some(interval) = config.emit_interval {
        tokio::spawn(sync::run_emit_loop(interval, Arc::clone(&watcher)));
    }

    tokio::select! {
        _ = sync::run_event_loop(&config, source, watcher, cursor) => {}
        result = tokio::signal::ctrl_c() => {
            result?;
            let stats = metrics.snapshot();
            info!(
                routes_registered = stats.routes_registered,
                routes_unregistered = stats.routes_unregistered,
                routes_synced = stats.routes_synced,
                routes_total = stats.routes_total,
                syncs = stats.syncs,
                address_collisions = table.address_collisions(),
                "Shutting down"
            );
        }
    }

    Ok(())
}
