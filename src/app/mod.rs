// Application wiring: startup, the long-running poller, graceful shutdown.

pub mod cli;

pub use cli::{parse_cli_args, CliArgs};

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{load_exchange_descriptors, Config};
use crate::db::{InfluxSink, PostgresStore};
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::{build_adapters, ExchangeClient};
use crate::outlier::OutlierDetector;
use crate::poller::PollerService;
use crate::resolver::SymbolResolver;
use crate::vwap::VwapService;

/// Wait for SIGINT/SIGTERM.
pub async fn wait_for_shutdown_signal() -> ConfluenceResult<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .map_err(|e| ConfluenceError::internal(format!("SIGTERM handler: {e}")))?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("received SIGINT shutdown signal");
        }
        _ = sigterm.recv() => {
            info!("received SIGTERM shutdown signal");
        }
    }
    Ok(())
}

/// One-shot symbol discovery: fetch every exchange's tradable symbols and
/// print them as TSV for seeding and mapping review.
pub async fn discover(config: Config) -> ConfluenceResult<()> {
    let descriptors = load_exchange_descriptors(&config.poller.exchanges_file)?;
    let adapters = build_adapters(descriptors)?;

    for adapter in &adapters {
        match adapter.fetch_symbols().await {
            Ok(symbols) => {
                info!(
                    exchange = adapter.id(),
                    count = symbols.len(),
                    "symbols discovered"
                );
                for s in &symbols {
                    println!(
                        "{}\t{}\t{}\t{}",
                        s.exchange_id, s.symbol, s.base_symbol, s.quote_symbol
                    );
                }
            }
            Err(e) => warn!(exchange = adapter.id(), error = %e, "symbol discovery failed"),
        }
    }
    Ok(())
}

/// Run the aggregator until a shutdown signal arrives.
pub async fn run(config: Config) -> ConfluenceResult<()> {
    if !config.server.service_mode.runs_poller() {
        warn!(
            "SERVICE_MODE=api: the query surface is served by the API process; nothing to run here"
        );
        return Ok(());
    }

    // Startup-fatal dependencies first: config was already validated, now the
    // stores.
    let store = Arc::new(PostgresStore::connect(&config.postgres).await?);

    let sink = Arc::new(InfluxSink::new(config.influx.clone(), config.sink.clone()));
    sink.ping().await?;
    info!(url = %config.influx.url, "connected to influx");

    let descriptors = load_exchange_descriptors(&config.poller.exchanges_file)?;
    let adapters = build_adapters(descriptors)?;

    let resolver = SymbolResolver::new(store.pool().clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let refresh_task = resolver.start_background_refresh(shutdown_rx.clone());
    let sink_task = Arc::clone(&sink).spawn_worker(shutdown_rx.clone(), config.poller.shutdown_grace());

    let weights = PollerService::weight_table(&adapters);
    let vwap = VwapService::new(&config.vwap, weights);
    let detector = OutlierDetector::new(
        config.outlier.clone(),
        Arc::clone(&resolver),
        Arc::clone(&store),
    );

    let poller = Arc::new(PollerService::new(
        adapters,
        Arc::clone(&resolver),
        vwap,
        detector,
        Arc::clone(&sink),
        config.poller.clone(),
    ));

    let poller_task = {
        let poller = Arc::clone(&poller);
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { poller.run(shutdown).await })
    };

    wait_for_shutdown_signal().await?;

    // Cancellation order: stop the scheduler, then let the sink drain within
    // its grace period, then the cache refresher.
    info!("shutting down");
    let _ = shutdown_tx.send(true);

    if let Err(e) = poller_task.await {
        warn!(error = %e, "poller task join failed");
    }
    if let Err(e) = sink_task.await {
        warn!(error = %e, "sink worker join failed");
    }
    refresh_task.abort();
    let _ = refresh_task.await;

    info!("shutdown complete");
    Ok(())
}
