use chrono::{DateTime, Utc};
use serde::Serialize;
use std::{
    collections::BTreeMap,
    fmt::Display,
    sync::{Arc, Mutex, MutexGuard},
    time::{Duration, Instant},
};

/// Weight of the latest sample in the response time average.
const SMOOTHING: f64 = 0.1;

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OperationCounts {
    pub succeeded: u64,
    pub failed: u64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamError {
    pub operation: String,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Counters for the calls made to the GraphQL API, served on `/status`.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamMetrics {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub requests_per_second: f64,
    pub avg_response_time_ms: f64,
    pub operations: BTreeMap<String, OperationCounts>,
    pub last_error: Option<UpstreamError>,
}

#[derive(Debug)]
struct RateWindow {
    started: Instant,
    requests: u64,
}

#[derive(Clone)]
pub struct MetricsCollector {
    metrics: Arc<Mutex<UpstreamMetrics>>,
    window: Arc<Mutex<RateWindow>>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(UpstreamMetrics::default())),
            window: Arc::new(Mutex::new(RateWindow {
                started: Instant::now(),
                requests: 0,
            })),
        }
    }

    /// Start timing one GraphQL operation.
    pub fn track(&self, operation: &str) -> RequestTracker {
        RequestTracker {
            operation: operation.to_string(),
            started: Instant::now(),
            collector: self.clone(),
        }
    }

    pub fn get_metrics(&self) -> UpstreamMetrics {
        lock(&self.metrics).clone()
    }

    fn record(&self, operation: String, elapsed: Duration, error: Option<String>) {
        let mut metrics = lock(&self.metrics);
        metrics.total_requests += 1;

        let counts = metrics.operations.entry(operation.clone()).or_default();
        match error {
            None => {
                counts.succeeded += 1;
                metrics.successful_requests += 1;
            }
            Some(message) => {
                counts.failed += 1;
                metrics.failed_requests += 1;
                metrics.last_error = Some(UpstreamError {
                    operation,
                    message,
                    at: Utc::now(),
                });
            }
        }

        let sample_ms = elapsed.as_secs_f64() * 1000.0;
        metrics.avg_response_time_ms = if metrics.total_requests == 1 {
            sample_ms
        } else {
            metrics.avg_response_time_ms * (1.0 - SMOOTHING) + sample_ms * SMOOTHING
        };

        let mut window = lock(&self.window);
        let span = window.started.elapsed();
        if span >= Duration::from_secs(1) {
            let requests = metrics.total_requests - window.requests;
            metrics.requests_per_second = requests as f64 / span.as_secs_f64();
            *window = RateWindow {
                started: Instant::now(),
                requests: metrics.total_requests,
            };
        }
    }
}

/// Times one operation. Consumed by reporting its outcome.
pub struct RequestTracker {
    operation: String,
    started: Instant,
    collector: MetricsCollector,
}

impl RequestTracker {
    pub fn succeeded(self) {
        self.collector
            .record(self.operation, self.started.elapsed(), None);
    }

    pub fn failed(self, error: &impl Display) {
        self.collector
            .record(self.operation, self.started.elapsed(), Some(error.to_string()));
    }
}
