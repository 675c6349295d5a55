//! One virtual-user iteration over the endpoint catalog.
//!
//! The harness visits every descriptor in declaration order, one request at
//! a time, turns each outcome into metric updates and check results, and
//! then pauses for the think time. Nothing that happens to a single request
//! stops the iteration.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, trace};

use crate::client::{HttpReply, HttpTransport, RequestError};
use crate::models::catalog::{Catalog, EndpointDescriptor, EndpointId};
use crate::models::dsl_model::{MetricProfile, RunParameters};
use crate::models::metrics::{Metrics, StatusClass};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessOptions {
    pub request_timeout: Duration,
    pub think_time: Duration,
    pub latency_threshold: Duration,
    pub profile: MetricProfile,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(2),
            think_time: Duration::from_secs(1),
            latency_threshold: Duration::from_millis(1000),
            profile: MetricProfile::Full,
        }
    }
}

/// Result of one request, as recorded.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestOutcome {
    pub endpoint: EndpointId,
    pub url: String,
    pub latency_ms: f64,
    pub result: Result<HttpReply, RequestError>,
    pub status_ok: bool,
    pub latency_ok: bool,
}

impl RequestOutcome {
    pub fn status(&self) -> Option<u16> {
        self.result.as_ref().ok().map(|r| r.status)
    }
}

#[derive(Debug, Clone, Default)]
pub struct IterationReport {
    pub outcomes: Vec<RequestOutcome>,
}

impl IterationReport {
    pub fn failures(&self) -> usize {
        self.outcomes.iter().filter(|o| !o.status_ok).count()
    }
}

pub struct Harness {
    catalog: Arc<Catalog>,
    params: Arc<RunParameters>,
    transport: Arc<dyn HttpTransport>,
    metrics: Arc<Metrics>,
    options: HarnessOptions,
}

impl Harness {
    pub fn new(
        catalog: Arc<Catalog>,
        params: RunParameters,
        transport: Arc<dyn HttpTransport>,
        options: HarnessOptions,
    ) -> Self {
        let metrics = Arc::new(Metrics::for_catalog(
            &catalog,
            options.latency_threshold.as_millis() as u64,
        ));
        Self {
            catalog,
            params: Arc::new(params),
            transport,
            metrics,
            options,
        }
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        Arc::clone(&self.metrics)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn params(&self) -> &RunParameters {
        &self.params
    }

    /// Calls every endpoint once, in order, then sleeps for the think time.
    pub async fn run_iteration(&self) -> IterationReport {
        let mut report = IterationReport {
            outcomes: Vec::with_capacity(self.catalog.len()),
        };

        for (id, descriptor) in self.catalog.iter() {
            let outcome = self.call(id, descriptor).await;
            self.record(descriptor, &outcome);
            report.outcomes.push(outcome);
        }

        self.metrics.iterations.add(1);
        debug!(
            requests = report.outcomes.len(),
            failures = report.failures(),
            "iteration complete"
        );

        if !self.options.think_time.is_zero() {
            sleep(self.options.think_time).await;
        }
        report
    }

    async fn call(&self, id: EndpointId, descriptor: &EndpointDescriptor) -> RequestOutcome {
        let url = descriptor.resolve(&self.params);

        let start = Instant::now();
        let result = match timeout(
            self.options.request_timeout,
            self.transport.get(&url, &self.params.token),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RequestError::Timeout),
        };
        let latency = start.elapsed();
        let latency_ms = latency.as_secs_f64() * 1000.0;

        let status_ok = matches!(&result, Ok(reply) if reply.status == descriptor.expected_status);
        // A request that produced no response fails the duration check too,
        // however quickly it failed.
        let latency_ok = result.is_ok() && latency < self.options.latency_threshold;

        RequestOutcome {
            endpoint: id,
            url,
            latency_ms,
            result,
            status_ok,
            latency_ok,
        }
    }

    fn record(&self, descriptor: &EndpointDescriptor, outcome: &RequestOutcome) {
        let profile = self.options.profile;
        let endpoint = self.metrics.endpoint(outcome.endpoint);

        match &outcome.result {
            Ok(reply) => {
                if profile.tracks_latency() {
                    endpoint.latency.add(outcome.latency_ms);
                }
                if profile.tracks_size() {
                    endpoint.size.add(reply.body_len as f64);
                }
                if profile.tracks_status() {
                    self.metrics.status_counter(StatusClass::of(reply.status)).add(1);
                }
                trace!(
                    endpoint = %descriptor.name,
                    status = reply.status,
                    latency_ms = outcome.latency_ms,
                    bytes = reply.body_len,
                    "response"
                );
            }
            Err(e) => {
                endpoint.transport_errors.add(1);
                self.metrics.transport_errors.add(1);
                debug!(
                    endpoint = %descriptor.name,
                    url = %outcome.url,
                    kind = e.kind(),
                    error = %e,
                    latency_ms = outcome.latency_ms,
                    "request failed"
                );
            }
        }

        if profile.tracks_status() && !outcome.status_ok {
            self.metrics.failed_requests.add(1);
        }

        endpoint.status_check.record(outcome.status_ok);
        endpoint.latency_check.record(outcome.latency_ok);
    }
}
