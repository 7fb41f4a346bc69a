//! Metrics
//!
//! - [`prometheus`]: instant-query client for the cluster's Prometheus
//! - [`poller`]: fixed-interval poller publishing the latest result
//! - [`queries`]: queries the views use
//! - [`overview`]: dashboard card built from four pollers
//! - [`exposition`]: this process's own counters, served at `/metrics`

pub mod exposition;
pub mod overview;
pub mod poller;
pub mod prometheus;
pub mod queries;

pub use exposition::WorkflowMetrics;
pub use overview::{OverviewWatch, StorageOverview};
pub use poller::{MetricsPoller, MetricsState, DEFAULT_METRICS_INTERVAL, MIN_METRICS_INTERVAL};
pub use self::prometheus::{parse_response, PrometheusClient, DEFAULT_PROMETHEUS_URL};
