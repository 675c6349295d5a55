pub mod ramp;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, timeout_at, Instant, MissedTickBehavior};
use tracing::{info, warn};

use crate::client::{HttpTransport, HyperTransport};
use crate::error::LoadError;
use crate::harness::{Harness, HarnessOptions};
use crate::models::catalog::Catalog;
use crate::models::dsl_model::{RunParameters, RunRequest, Stage};
use crate::models::metrics::RunSummary;
use crate::utils::hardware::get_hardware_info;

const TICK: Duration = Duration::from_millis(100);

/// Everything needed to execute one load test.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub params: RunParameters,
    pub stages: Vec<Stage>,
    pub options: HarnessOptions,
    /// How long running iterations may take to finish once the last stage
    /// ends, before their virtual users are aborted.
    pub graceful_stop: Duration,
}

impl RunPlan {
    pub fn from_request(request: RunRequest) -> Result<Self, LoadError> {
        if request.stages.is_empty() {
            return Err(LoadError::Config("at least one stage is required".into()));
        }
        match ramp::total_duration(&request.stages) {
            None => return Err(LoadError::Config("total stage duration overflows".into())),
            Some(total) if total.is_zero() => {
                return Err(LoadError::Config("stages have zero total duration".into()))
            }
            Some(_) => {}
        }

        let defaults = HarnessOptions::default();
        let options = HarnessOptions {
            request_timeout: request
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.request_timeout),
            think_time: request
                .think_time_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.think_time),
            latency_threshold: request
                .threshold_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.latency_threshold),
            profile: request.metrics,
        };
        let graceful_stop = options
            .request_timeout
            .checked_add(options.think_time)
            .ok_or_else(|| LoadError::Config("timeout plus think time overflows".into()))?;

        Ok(Self {
            params: request.params,
            stages: request.stages,
            options,
            graceful_stop,
        })
    }

    /// Logs configuration that will make every request fail.
    pub fn warn_on_weak_config(&self) {
        if self.params.base_url.is_empty() {
            warn!("base URL is empty; every request will fail to resolve");
        }
        if self.params.token.is_empty() {
            warn!("bearer token is empty; expect 401 responses across the catalog");
        }
    }
}

/// A spawned iteration loop. Dropping it aborts the task, so a cancelled
/// run never leaves virtual users behind.
struct VirtualUser {
    running: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

impl VirtualUser {
    fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}

impl Drop for VirtualUser {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Runs the standard catalog against the real network.
pub async fn run_load_test(plan: RunPlan) -> RunSummary {
    let transport: Arc<dyn HttpTransport> = Arc::new(HyperTransport::new());
    run_catalog(Arc::new(Catalog::standard()), transport, plan).await
}

pub async fn run_catalog(
    catalog: Arc<Catalog>,
    transport: Arc<dyn HttpTransport>,
    plan: RunPlan,
) -> RunSummary {
    plan.warn_on_weak_config();
    let harness = Arc::new(Harness::new(catalog, plan.params.clone(), transport, plan.options));

    info!(
        endpoints = harness.catalog().len(),
        stages = plan.stages.len(),
        duration_secs = ramp::total_duration(&plan.stages)
            .unwrap_or(Duration::MAX)
            .as_secs_f64(),
        "starting load test"
    );

    let start = Instant::now();
    let mut active: Vec<VirtualUser> = Vec::new();
    let mut retired: Vec<VirtualUser> = Vec::new();
    let mut peak_vus = 0u64;
    let mut last_target = None;

    let mut ticker = interval(TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        ticker.tick().await;
        let Some(target) = ramp::target_vus(&plan.stages, start.elapsed()) else {
            break;
        };
        let target = target as usize;

        while active.len() < target {
            active.push(spawn_virtual_user(Arc::clone(&harness)));
        }
        while active.len() > target {
            if let Some(vu) = active.pop() {
                vu.stop();
                retired.push(vu);
            }
        }

        peak_vus = peak_vus.max(active.len() as u64);
        if last_target != Some(target) {
            info!(vus = target, elapsed_ms = start.elapsed().as_millis() as u64, "virtual users");
            last_target = Some(target);
        }
    }

    let elapsed = start.elapsed();
    for vu in &active {
        vu.stop();
    }
    retired.extend(active);

    let deadline = Instant::now().checked_add(plan.graceful_stop);
    let mut aborted = 0;
    for mut vu in retired {
        let finished = match deadline {
            Some(deadline) => timeout_at(deadline, &mut vu.handle).await.is_ok(),
            None => {
                let _ = (&mut vu.handle).await;
                true
            }
        };
        if !finished {
            aborted += 1;
        }
        // Dropping `vu` aborts whatever is still running.
    }
    if aborted > 0 {
        warn!(aborted, "virtual users did not finish their iteration in time");
    }

    summarize(&harness, elapsed, peak_vus)
}

fn spawn_virtual_user(harness: Arc<Harness>) -> VirtualUser {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let handle = task::spawn(async move {
        while flag.load(Ordering::Relaxed) {
            harness.run_iteration().await;
        }
    });

    VirtualUser { running, handle }
}

fn summarize(harness: &Harness, elapsed: Duration, peak_vus: u64) -> RunSummary {
    let metrics = harness.metrics();
    let (checks_passed, checks_failed) = metrics.total_checks();
    let endpoints: Vec<_> = metrics.endpoints().iter().map(|e| e.summarize()).collect();

    let total_requests: u64 = endpoints
        .iter()
        .map(|e| e.status_check_passes + e.status_check_fails)
        .sum();
    let duration_secs = elapsed.as_secs_f64();
    let throughput = if duration_secs > 0.0 {
        total_requests as f64 / duration_secs
    } else {
        0.0
    };

    RunSummary {
        timestamp: Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
        target_url: harness.params().base_url.clone(),
        duration_secs,
        peak_vus,
        iterations: metrics.iterations.get(),
        total_requests,
        throughput,
        status_2xx: metrics.status_2xx.get(),
        status_4xx: metrics.status_4xx.get(),
        status_5xx: metrics.status_5xx.get(),
        status_other: metrics.status_other.get(),
        failed_requests: metrics.failed_requests.get(),
        transport_errors: metrics.transport_errors.get(),
        checks_passed,
        checks_failed,
        endpoints,
        host: get_hardware_info(),
    }
}
