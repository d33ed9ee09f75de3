// Poller
// Cadence scheduler: fans one fetch task out per eligible adapter each tick,
// joins them under the per-call deadline, and pushes the merged batch through
// resolver, sinks, VWAP and outlier detection. Ticks never overlap; an
// overrunning tick is skipped.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use dashmap::DashMap;
use rust_decimal::Decimal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::config::PollerConfig;
use crate::db::InfluxSink;
use crate::error::ConfluenceError;
use crate::exchanges::{ExchangeClient, HealthEvent};
use crate::outlier::{OutlierDetector, PriceWindow};
use crate::resolver::SymbolResolver;
use crate::types::CanonicalTicker;
use crate::vwap::VwapService;

/// End-of-cycle accounting, logged and returned for inspection.
#[derive(Debug, Default, Clone)]
pub struct CycleSummary {
    pub tick: u64,
    pub polled: usize,
    pub failed: usize,
    pub skipped_unhealthy: usize,
    pub skipped_rate_limited: usize,
    pub tickers: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub vwap_results: usize,
    pub outliers_flagged: usize,
    pub duration_ms: u64,
}

struct FetchOutcome {
    exchange_id: String,
    elapsed_ms: f64,
    result: Result<Vec<CanonicalTicker>, ConfluenceError>,
}

pub struct PollerService {
    adapters: Vec<Arc<dyn ExchangeClient>>,
    resolver: Arc<SymbolResolver>,
    vwap: VwapService,
    detector: OutlierDetector,
    sink: Arc<InfluxSink>,
    config: PollerConfig,
    /// Rate-limit bookkeeping: last call instant per exchange.
    last_call: DashMap<String, Instant>,
}

impl PollerService {
    pub fn new(
        adapters: Vec<Arc<dyn ExchangeClient>>,
        resolver: Arc<SymbolResolver>,
        vwap: VwapService,
        detector: OutlierDetector,
        sink: Arc<InfluxSink>,
        config: PollerConfig,
    ) -> Self {
        Self {
            adapters,
            resolver,
            vwap,
            detector,
            sink,
            config,
            last_call: DashMap::new(),
        }
    }

    /// Static weight table for the VWAP service, taken from the adapters.
    pub fn weight_table(adapters: &[Arc<dyn ExchangeClient>]) -> HashMap<String, Decimal> {
        adapters
            .iter()
            .map(|a| (a.id().to_string(), a.weight()))
            .collect()
    }

    /// Drive the cadence until shutdown flips. The first tick fires
    /// immediately.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            exchanges = self.adapters.len(),
            interval_secs = self.config.interval_secs,
            "polling service started"
        );

        let mut interval = tokio::time::interval(self.config.interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        let mut window = PriceWindow::new();
        let mut tick: u64 = 0;
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    tick += 1;
                    // Racing the cycle against shutdown cancels in-flight
                    // fetch tasks: dropping the cycle future aborts its
                    // JoinSet.
                    tokio::select! {
                        _ = self.poll_once(tick, &mut window) => {}
                        _ = shutdown.changed() => {
                            if *shutdown.borrow() {
                                break;
                            }
                        }
                    }
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("polling service stopped");
    }

    /// One full cycle: fan-out, join, resolve, persist, aggregate, detect.
    pub async fn poll_once(&self, tick: u64, window: &mut PriceWindow) -> CycleSummary {
        let started = Instant::now();
        let now = Utc::now();
        let mut summary = CycleSummary {
            tick,
            ..Default::default()
        };

        let mut join_set: JoinSet<FetchOutcome> = JoinSet::new();
        for adapter in &self.adapters {
            if !adapter.is_healthy() && tick % self.config.unhealthy_retry_every != 0 {
                summary.skipped_unhealthy += 1;
                continue;
            }
            if let Some(last) = self.last_call.get(adapter.id()) {
                if last.elapsed() < adapter.min_call_interval() {
                    summary.skipped_rate_limited += 1;
                    debug!(exchange = adapter.id(), "skipped: rate limit spacing");
                    continue;
                }
            }
            self.last_call
                .insert(adapter.id().to_string(), Instant::now());
            summary.polled += 1;

            let adapter = Arc::clone(adapter);
            let deadline = self.config.request_deadline();
            join_set.spawn(async move {
                let call_started = Instant::now();
                let result =
                    match tokio::time::timeout(deadline, adapter.fetch_all_tickers()).await {
                        Ok(result) => result,
                        Err(_) => {
                            // The adapter never saw the cancellation; count it.
                            adapter.record_failure();
                            Err(ConfluenceError::deadline(
                                adapter.id(),
                                deadline.as_millis() as u64,
                            ))
                        }
                    };
                FetchOutcome {
                    exchange_id: adapter.id().to_string(),
                    elapsed_ms: call_started.elapsed().as_secs_f64() * 1000.0,
                    result,
                }
            });
        }

        let mut all_tickers: Vec<CanonicalTicker> = Vec::new();
        let mut health_events: Vec<HealthEvent> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "fetch task panicked");
                    continue;
                }
            };
            match outcome.result {
                Ok(tickers) => {
                    health_events.push(HealthEvent {
                        exchange_id: outcome.exchange_id.clone(),
                        timestamp: now,
                        response_time_ms: outcome.elapsed_ms,
                        success: true,
                        error_message: None,
                        http_status_code: Some(200),
                        symbols_fetched: tickers.len(),
                    });
                    all_tickers.extend(tickers);
                }
                Err(e) => {
                    summary.failed += 1;
                    let status = match &e {
                        ConfluenceError::ExchangeStatus { status, .. } => Some(*status),
                        _ => None,
                    };
                    warn!(
                        exchange = %outcome.exchange_id,
                        error = %e,
                        category = e.category(),
                        "exchange fetch failed"
                    );
                    health_events.push(HealthEvent {
                        exchange_id: outcome.exchange_id,
                        timestamp: now,
                        response_time_ms: outcome.elapsed_ms,
                        success: false,
                        error_message: Some(e.to_string()),
                        http_status_code: status,
                        symbols_fetched: 0,
                    });
                }
            }
        }

        summary.tickers = all_tickers.len();

        // Resolve token ids in place; unresolved rows keep the 0 sentinel.
        for ticker in &mut all_tickers {
            self.resolver.resolve_ticker(ticker).await;
            if ticker.is_resolved() {
                summary.resolved += 1;
                window.record(ticker);
            } else {
                summary.unresolved += 1;
            }
        }

        // Raw rows first: within an exchange, tick N is fully enqueued before
        // tick N+1 produces anything.
        self.sink.write_tickers(&all_tickers);

        let vwap_results = self.vwap.compute(&all_tickers, now);
        summary.vwap_results = vwap_results.len();
        self.sink.write_vwap(&vwap_results);

        match self.detector.scan(window, now).await {
            Ok(outliers) => summary.outliers_flagged = outliers.len(),
            Err(e) => warn!(error = %e, "outlier scan failed"),
        }

        self.sink.write_health(&health_events);

        summary.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            tick,
            polled = summary.polled,
            failed = summary.failed,
            skipped_unhealthy = summary.skipped_unhealthy,
            skipped_rate_limited = summary.skipped_rate_limited,
            tickers = summary.tickers,
            resolved = summary.resolved,
            unresolved = summary.unresolved,
            vwap = summary.vwap_results,
            outliers = summary.outliers_flagged,
            duration_ms = summary.duration_ms,
            "poll cycle completed"
        );
        summary
    }
}
