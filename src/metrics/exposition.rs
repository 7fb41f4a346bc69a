//! Prometheus metrics for the workflows this crate runs
//!
//! Kept on a private `Registry` rather than the process-global one so that
//! tests and multiple API servers in one process do not collide.

use crate::error::{Error, Result};
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::time::Duration;

const NAMESPACE: &str = "ocs_capacity";

pub struct WorkflowMetrics {
    registry: Registry,
    expansions_started: IntCounter,
    expansions_succeeded: IntCounter,
    expansions_failed: IntCounterVec,
    poll_duration: Histogram,
    installs_total: IntCounterVec,
}

impl WorkflowMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let expansions_started = IntCounter::with_opts(
            Opts::new("expansions_started_total", "Capacity expansions started")
                .namespace(NAMESPACE),
        )
        .map_err(metrics_error)?;
        let expansions_succeeded = IntCounter::with_opts(
            Opts::new(
                "expansions_succeeded_total",
                "Capacity expansions that passed verification",
            )
            .namespace(NAMESPACE),
        )
        .map_err(metrics_error)?;
        let expansions_failed = IntCounterVec::new(
            Opts::new("expansions_failed_total", "Capacity expansions that failed")
                .namespace(NAMESPACE),
            &["reason"],
        )
        .map_err(metrics_error)?;
        let poll_duration = Histogram::with_opts(
            HistogramOpts::new(
                "expansion_poll_duration_seconds",
                "Time spent waiting for the StorageCluster to become Ready",
            )
            .namespace(NAMESPACE)
            .buckets(vec![5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 900.0]),
        )
        .map_err(metrics_error)?;
        let installs_total = IntCounterVec::new(
            Opts::new("installs_total", "StorageCluster installs by result").namespace(NAMESPACE),
            &["result"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(expansions_started.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(expansions_succeeded.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(expansions_failed.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(poll_duration.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(installs_total.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            registry,
            expansions_started,
            expansions_succeeded,
            expansions_failed,
            poll_duration,
            installs_total,
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn expansion_started(&self) {
        self.expansions_started.inc();
    }

    pub fn expansion_succeeded(&self) {
        self.expansions_succeeded.inc();
    }

    pub fn expansion_failed(&self, reason: &str) {
        self.expansions_failed.with_label_values(&[reason]).inc();
    }

    pub fn observe_poll(&self, waited: Duration) {
        self.poll_duration.observe(waited.as_secs_f64());
    }

    pub fn install_finished(&self, ok: bool) {
        let result = if ok { "success" } else { "failure" };
        self.installs_total.with_label_values(&[result]).inc();
    }

    /// Render every registered metric in the text exposition format
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| Error::Internal(e.to_string()))
    }
}

fn metrics_error(e: prometheus::Error) -> Error {
    Error::Internal(format!("metrics registry: {}", e))
}
