// Adapter health tracking.
// Three consecutive errors flip an adapter unhealthy; the next success flips
// it back and resets the counter.

use std::sync::Mutex;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Consecutive failures before an adapter is considered unhealthy.
pub const UNHEALTHY_AFTER: u32 = 3;

/// Smoothing factor for the response-time running average.
const RESPONSE_EWMA_ALPHA: f64 = 0.2;

/// Point-in-time health of one adapter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeHealth {
    pub is_healthy: bool,
    pub last_successful_poll: Option<DateTime<Utc>>,
    pub consecutive_errors: u32,
    pub average_response_ms: f64,
}

impl Default for ExchangeHealth {
    fn default() -> Self {
        Self {
            is_healthy: true,
            last_successful_poll: None,
            consecutive_errors: 0,
            average_response_ms: 0.0,
        }
    }
}

/// Mutex-guarded health state; mutated only by the owning adapter and the
/// poller.
#[derive(Debug, Default)]
pub struct HealthTracker {
    state: Mutex<ExchangeHealth>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&self, response_time: Duration) {
        let ms = response_time.as_secs_f64() * 1000.0;
        let mut state = self.state.lock().expect("health lock poisoned");
        state.is_healthy = true;
        state.consecutive_errors = 0;
        state.last_successful_poll = Some(Utc::now());
        state.average_response_ms = if state.average_response_ms == 0.0 {
            ms
        } else {
            RESPONSE_EWMA_ALPHA * ms + (1.0 - RESPONSE_EWMA_ALPHA) * state.average_response_ms
        };
    }

    pub fn record_failure(&self) {
        let mut state = self.state.lock().expect("health lock poisoned");
        state.consecutive_errors += 1;
        if state.consecutive_errors >= UNHEALTHY_AFTER {
            state.is_healthy = false;
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.state.lock().expect("health lock poisoned").is_healthy
    }

    pub fn snapshot(&self) -> ExchangeHealth {
        self.state.lock().expect("health lock poisoned").clone()
    }
}

/// One poll attempt against one exchange, persisted to the `exchange_health`
/// measurement.
#[derive(Debug, Clone)]
pub struct HealthEvent {
    pub exchange_id: String,
    pub timestamp: DateTime<Utc>,
    pub response_time_ms: f64,
    pub success: bool,
    pub error_message: Option<String>,
    pub http_status_code: Option<u16>,
    pub symbols_fetched: usize,
}
