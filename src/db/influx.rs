// InfluxDB batched sink.
//
// The poller enqueues points into a bounded queue; a single worker drains and
// writes per-bucket batches. Overflow drops the oldest points with a logged
// warning, and write failures are logged and superseded by the next cycle.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::stream;
use influxdb2::models::DataPoint;
use influxdb2::Client;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::{InfluxConfig, SinkConfig};
use crate::db::datapoints::{health_datapoint, ticker_datapoint, vwap_datapoint};
use crate::error::{ConfluenceError, ConfluenceResult};
use crate::exchanges::HealthEvent;
use crate::types::{CanonicalTicker, VwapResult};

/// Time-series family a point belongs to; each maps to its own bucket whose
/// retention enforces the family TTL (tickers 1d, VWAP 30d, health 7d).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Series {
    Ticker,
    Vwap,
    Health,
}

/// Bounded drop-oldest queue between the poller and the sink worker.
pub struct SinkQueue {
    capacity: usize,
    items: Mutex<VecDeque<(Series, DataPoint)>>,
    notify: Notify,
    dropped_total: AtomicU64,
}

impl SinkQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: Mutex::new(VecDeque::with_capacity(capacity.min(16_384))),
            notify: Notify::new(),
            dropped_total: AtomicU64::new(0),
        }
    }

    pub fn push_many(&self, series: Series, points: Vec<DataPoint>) -> usize {
        let pushed = points.len();
        let mut dropped = 0usize;
        {
            let mut items = self.items.lock().expect("sink queue lock poisoned");
            for point in points {
                if items.len() >= self.capacity {
                    items.pop_front();
                    dropped += 1;
                }
                items.push_back((series, point));
            }
        }
        if dropped > 0 {
            self.dropped_total
                .fetch_add(dropped as u64, Ordering::Relaxed);
            warn!(
                dropped,
                capacity = self.capacity,
                "sink queue overflow; oldest points discarded"
            );
        }
        self.notify.notify_one();
        pushed
    }

    fn pop_batch(&self, max: usize) -> Vec<(Series, DataPoint)> {
        let mut items = self.items.lock().expect("sink queue lock poisoned");
        let take = items.len().min(max);
        items.drain(..take).collect()
    }

    fn is_empty(&self) -> bool {
        self.items.lock().expect("sink queue lock poisoned").is_empty()
    }

    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }
}

pub struct InfluxSink {
    client: Client,
    config: InfluxConfig,
    sink_config: SinkConfig,
    queue: Arc<SinkQueue>,
}

impl InfluxSink {
    pub fn new(config: InfluxConfig, sink_config: SinkConfig) -> Self {
        let client = Client::new(&config.url, &config.org, &config.token);
        let queue = Arc::new(SinkQueue::new(sink_config.queue_capacity));
        Self {
            client,
            config,
            sink_config,
            queue,
        }
    }

    /// Round-trip connectivity probe used at startup.
    pub async fn ping(&self) -> ConfluenceResult<()> {
        self.client
            .health()
            .await
            .map_err(|e| ConfluenceError::database_connection(format!("influx: {e}")))?;
        Ok(())
    }

    /// Enqueue raw ticker rows; rows with unresolved ids are kept.
    pub fn write_tickers(&self, tickers: &[CanonicalTicker]) -> usize {
        let points: Vec<DataPoint> = tickers
            .iter()
            .filter_map(|t| match ticker_datapoint(t) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!(error = %e, symbol = %t.raw_symbol, "ticker point build failed");
                    None
                }
            })
            .collect();
        self.queue.push_many(Series::Ticker, points)
    }

    pub fn write_vwap(&self, results: &[VwapResult]) -> usize {
        let points: Vec<DataPoint> = results
            .iter()
            .filter_map(|r| match vwap_datapoint(r) {
                Ok(point) => Some(point),
                Err(e) => {
                    warn!(error = %e, base = r.base_token_id, "vwap point build failed");
                    None
                }
            })
            .collect();
        self.queue.push_many(Series::Vwap, points)
    }

    pub fn write_health(&self, events: &[HealthEvent]) -> usize {
        let points: Vec<DataPoint> = events
            .iter()
            .filter_map(|e| match health_datapoint(e) {
                Ok(point) => Some(point),
                Err(err) => {
                    warn!(error = %err, exchange = %e.exchange_id, "health point build failed");
                    None
                }
            })
            .collect();
        self.queue.push_many(Series::Health, points)
    }

    pub fn queue(&self) -> Arc<SinkQueue> {
        Arc::clone(&self.queue)
    }

    fn bucket_for(&self, series: Series) -> &str {
        match series {
            Series::Ticker => &self.config.ticker_bucket,
            Series::Vwap => &self.config.vwap_bucket,
            Series::Health => &self.config.health_bucket,
        }
    }

    async fn flush_available(&self) {
        loop {
            let batch = self.queue.pop_batch(self.sink_config.batch_size);
            if batch.is_empty() {
                return;
            }

            let mut by_series: [Vec<DataPoint>; 3] = [Vec::new(), Vec::new(), Vec::new()];
            for (series, point) in batch {
                let slot = match series {
                    Series::Ticker => 0,
                    Series::Vwap => 1,
                    Series::Health => 2,
                };
                by_series[slot].push(point);
            }

            for (series, points) in [Series::Ticker, Series::Vwap, Series::Health]
                .into_iter()
                .zip(by_series)
            {
                if points.is_empty() {
                    continue;
                }
                let count = points.len();
                let bucket = self.bucket_for(series);
                match self.client.write(bucket, stream::iter(points)).await {
                    Ok(()) => debug!(bucket, count, "sink batch written"),
                    // No in-memory retry: the next cadence supersedes.
                    Err(e) => warn!(bucket, count, error = %e, "sink batch write failed"),
                }
            }
        }
    }

    /// Spawn the drain worker. On shutdown it flushes what remains within the
    /// grace period and exits.
    pub fn spawn_worker(
        self: Arc<Self>,
        mut shutdown: watch::Receiver<bool>,
        grace: Duration,
    ) -> JoinHandle<()> {
        let flush_interval = self.sink_config.flush_interval();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = self.queue.notify.notified() => {}
                    _ = tokio::time::sleep(flush_interval) => {}
                    _ = shutdown.changed() => {
                        if *shutdown.borrow() {
                            break;
                        }
                    }
                }
                self.flush_available().await;
            }

            // Drain within the grace period.
            let deadline = tokio::time::Instant::now() + grace;
            while !self.queue.is_empty() && tokio::time::Instant::now() < deadline {
                self.flush_available().await;
            }
            if !self.queue.is_empty() {
                warn!("sink queue not fully drained before shutdown grace elapsed");
            }
            info!(
                dropped_total = self.queue.dropped_total(),
                "sink worker stopped"
            );
        })
    }
}
