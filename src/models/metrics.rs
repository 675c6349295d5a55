use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::models::catalog::{Catalog, EndpointId};
use crate::utils::hardware::HostInfo;

/// Monotonic counter shared by every virtual user.
#[derive(Debug, Default)]
pub struct Counter {
    name: String,
    value: AtomicU64,
}

impl Counter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: AtomicU64::new(0),
        }
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Append-only series of samples (milliseconds or bytes).
#[derive(Debug, Default)]
pub struct Trend {
    name: String,
    samples: Mutex<Vec<f64>>,
}

impl Trend {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            samples: Mutex::new(Vec::new()),
        }
    }

    pub fn add(&self, value: f64) {
        // A poisoned lock only means another VU panicked mid-push; the
        // vector itself is still valid.
        let mut samples = self.samples.lock().unwrap_or_else(|e| e.into_inner());
        samples.push(value);
    }

    pub fn samples(&self) -> Vec<f64> {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self) -> usize {
        self.samples.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stats(&self) -> TrendStats {
        TrendStats::from_samples(&self.samples())
    }
}

/// Pass/fail tally for one named check.
#[derive(Debug)]
pub struct CheckTally {
    name: String,
    passes: AtomicU64,
    fails: AtomicU64,
}

impl CheckTally {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            passes: AtomicU64::new(0),
            fails: AtomicU64::new(0),
        }
    }

    pub fn record(&self, passed: bool) {
        if passed {
            self.passes.fetch_add(1, Ordering::Relaxed);
        } else {
            self.fails.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn passes(&self) -> u64 {
        self.passes.load(Ordering::Relaxed)
    }

    pub fn fails(&self) -> u64 {
        self.fails.load(Ordering::Relaxed)
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Aggregates owned by one catalog entry.
#[derive(Debug)]
pub struct EndpointMetrics {
    pub name: String,
    pub latency: Trend,
    pub size: Trend,
    /// Requests that produced no response at all.
    pub transport_errors: Counter,
    pub status_check: CheckTally,
    pub latency_check: CheckTally,
}

/// Every aggregate of one run. Built from the catalog so that
/// `endpoints[id.0]` always belongs to descriptor `id`.
#[derive(Debug)]
pub struct Metrics {
    endpoints: Vec<EndpointMetrics>,
    pub status_2xx: Counter,
    pub status_4xx: Counter,
    pub status_5xx: Counter,
    pub status_other: Counter,
    pub failed_requests: Counter,
    pub transport_errors: Counter,
    pub iterations: Counter,
}

impl Metrics {
    pub fn for_catalog(catalog: &Catalog, latency_threshold_ms: u64) -> Self {
        let endpoints = catalog
            .list()
            .iter()
            .map(|d| EndpointMetrics {
                name: d.name.clone(),
                latency: Trend::new(format!("{}_duration", d.name)),
                size: Trend::new(format!("{}_size", d.name)),
                transport_errors: Counter::new(format!("{}_transport_errors", d.name)),
                status_check: CheckTally::new(format!("{} - status {}", d.name, d.expected_status)),
                latency_check: CheckTally::new(format!(
                    "{} - duration < {}ms",
                    d.name, latency_threshold_ms
                )),
            })
            .collect();

        Self {
            endpoints,
            status_2xx: Counter::new("status_2xx"),
            status_4xx: Counter::new("status_4xx"),
            status_5xx: Counter::new("status_5xx"),
            status_other: Counter::new("status_other"),
            failed_requests: Counter::new("failed_requests"),
            transport_errors: Counter::new("transport_errors"),
            iterations: Counter::new("iterations"),
        }
    }

    pub fn endpoint(&self, id: EndpointId) -> &EndpointMetrics {
        &self.endpoints[id.0]
    }

    pub fn endpoints(&self) -> &[EndpointMetrics] {
        &self.endpoints
    }

    pub fn status_counter(&self, class: StatusClass) -> &Counter {
        match class {
            StatusClass::Success => &self.status_2xx,
            StatusClass::ClientError => &self.status_4xx,
            StatusClass::ServerError => &self.status_5xx,
            StatusClass::Other => &self.status_other,
        }
    }

    pub fn total_checks(&self) -> (u64, u64) {
        self.endpoints.iter().fold((0, 0), |(passes, fails), e| {
            (
                passes + e.status_check.passes() + e.latency_check.passes(),
                fails + e.status_check.fails() + e.latency_check.fails(),
            )
        })
    }
}

/// Status-code bucket. Anything outside 2xx/4xx/5xx lands in `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusClass {
    Success,
    ClientError,
    ServerError,
    Other,
}

impl StatusClass {
    pub fn of(status: u16) -> Self {
        match status {
            200..=299 => StatusClass::Success,
            400..=499 => StatusClass::ClientError,
            500..=599 => StatusClass::ServerError,
            _ => StatusClass::Other,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct TrendStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub median: f64,
    pub p95: f64,
}

impl TrendStats {
    pub fn from_samples(samples: &[f64]) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        let mut sorted = samples.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let sum: f64 = sorted.iter().sum();

        Self {
            count: sorted.len(),
            min: sorted[0],
            max: sorted[sorted.len() - 1],
            avg: sum / sorted.len() as f64,
            median: calculate_median(&sorted),
            p95: percentile(&sorted, 95.0),
        }
    }
}

/// Median of already sorted data.
fn calculate_median(sorted: &[f64]) -> f64 {
    let len = sorted.len();
    if len == 0 {
        return 0.0;
    }
    if len % 2 == 0 {
        (sorted[len / 2 - 1] + sorted[len / 2]) / 2.0
    } else {
        sorted[len / 2]
    }
}

/// Nearest-rank percentile of already sorted data.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

#[derive(Debug, Clone, Serialize)]
pub struct EndpointSummary {
    pub name: String,
    pub latency_ms: TrendStats,
    pub size_bytes: TrendStats,
    pub transport_errors: u64,
    pub status_check_passes: u64,
    pub status_check_fails: u64,
    pub latency_check_passes: u64,
    pub latency_check_fails: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub timestamp: String,
    pub target_url: String,
    pub duration_secs: f64,
    pub peak_vus: u64,
    pub iterations: u64,
    pub total_requests: u64,
    pub throughput: f64,

    pub status_2xx: u64,
    pub status_4xx: u64,
    pub status_5xx: u64,
    pub status_other: u64,
    pub failed_requests: u64,
    pub transport_errors: u64,

    pub checks_passed: u64,
    pub checks_failed: u64,

    pub endpoints: Vec<EndpointSummary>,
    pub host: HostInfo,
}

impl RunSummary {
    pub fn checks_ok(&self) -> bool {
        self.checks_failed == 0
    }
}

impl EndpointMetrics {
    pub fn summarize(&self) -> EndpointSummary {
        EndpointSummary {
            name: self.name.clone(),
            latency_ms: self.latency.stats(),
            size_bytes: self.size.stats(),
            transport_errors: self.transport_errors.get(),
            status_check_passes: self.status_check.passes(),
            status_check_fails: self.status_check.fails(),
            latency_check_passes: self.latency_check.passes(),
            latency_check_fails: self.latency_check.fails(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_status_ranges() {
        assert_eq!(StatusClass::of(200), StatusClass::Success);
        assert_eq!(StatusClass::of(204), StatusClass::Success);
        assert_eq!(StatusClass::of(404), StatusClass::ClientError);
        assert_eq!(StatusClass::of(503), StatusClass::ServerError);
        assert_eq!(StatusClass::of(101), StatusClass::Other);
        assert_eq!(StatusClass::of(302), StatusClass::Other);
        assert_eq!(StatusClass::of(600), StatusClass::Other);
    }

    #[test]
    fn trend_stats() {
        let stats = TrendStats::from_samples(&[40.0, 10.0, 30.0, 20.0]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.min, 10.0);
        assert_eq!(stats.max, 40.0);
        assert_eq!(stats.avg, 25.0);
        assert_eq!(stats.median, 25.0);
        assert_eq!(stats.p95, 40.0);

        assert_eq!(TrendStats::from_samples(&[]), TrendStats::default());
    }

    #[test]
    fn names_follow_metric_convention() {
        let catalog = Catalog::standard();
        let metrics = Metrics::for_catalog(&catalog, 1000);
        let first = metrics.endpoint(EndpointId(0));
        assert_eq!(first.latency.name(), "fetch_instruments_duration");
        assert_eq!(first.size.name(), "fetch_instruments_size");
        assert_eq!(first.status_check.name(), "fetch_instruments - status 200");
        assert_eq!(first.latency_check.name(), "fetch_instruments - duration < 1000ms");
        assert_eq!(metrics.endpoints().len(), catalog.len());
    }

    #[test]
    fn check_tallies_add_up() {
        let catalog = Catalog::standard();
        let metrics = Metrics::for_catalog(&catalog, 1000);
        metrics.endpoint(EndpointId(1)).status_check.record(true);
        metrics.endpoint(EndpointId(1)).latency_check.record(false);
        metrics.endpoint(EndpointId(5)).status_check.record(false);
        assert_eq!(metrics.total_checks(), (1, 2));
    }
}
