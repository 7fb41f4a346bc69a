//! Storage overview
//!
//! The dashboard card: used and total raw capacity, Ceph health and the
//! number of OSDs up. Each figure has its own poller; the overview is read
//! from the latest state of all four.

use super::poller::{MetricsPoller, MetricsState};
use super::queries;
use crate::crd::CephHealth;
use crate::domain::ports::MetricsSourceRef;
use crate::storage::capacity::{humanize_binary_bytes, NOT_AVAILABLE};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Receivers for the four overview queries
#[derive(Clone)]
pub struct OverviewWatch {
    pub used: watch::Receiver<MetricsState>,
    pub total: watch::Receiver<MetricsState>,
    pub health: watch::Receiver<MetricsState>,
    pub osds_up: watch::Receiver<MetricsState>,
}

impl OverviewWatch {
    /// One poller per overview query, all on the same interval
    pub fn pollers(source: MetricsSourceRef, interval: Duration) -> (Vec<MetricsPoller>, Self) {
        let (used_poller, used) =
            MetricsPoller::new(source.clone(), queries::CEPH_CAPACITY_USED, interval);
        let (total_poller, total) =
            MetricsPoller::new(source.clone(), queries::CEPH_CAPACITY_TOTAL, interval);
        let (health_poller, health) =
            MetricsPoller::new(source.clone(), queries::CEPH_HEALTH_STATUS, interval);
        let (osds_poller, osds_up) = MetricsPoller::new(source, queries::CEPH_OSDS_UP, interval);

        let pollers = vec![used_poller, total_poller, health_poller, osds_poller];
        let watch = Self {
            used,
            total,
            health,
            osds_up,
        };
        (pollers, watch)
    }

    /// Spawn the pollers; the returned handles finish once `cancel` fires
    pub fn spawn(
        source: MetricsSourceRef,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> (Vec<JoinHandle<()>>, Self) {
        let (pollers, watch) = Self::pollers(source, interval);
        let handles = pollers
            .into_iter()
            .map(|p| p.spawn(cancel.clone()))
            .collect();
        (handles, watch)
    }

    pub fn overview(&self) -> StorageOverview {
        StorageOverview::from_states(
            &self.used.borrow(),
            &self.total.borrow(),
            &self.health.borrow(),
            &self.osds_up.borrow(),
        )
    }
}

/// Map the `ceph_health_status` gauge to a health value
pub fn health_from_status(value: f64) -> CephHealth {
    match value as i64 {
        0 => CephHealth::Ok,
        1 => CephHealth::Warn,
        2 => CephHealth::Err,
        _ => CephHealth::Unknown,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageOverview {
    pub used_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    /// Humanized used capacity, or "Not available"
    pub used: String,
    pub total: String,
    /// Unknown until the health query has returned a sample
    pub health: CephHealth,
    pub osds_up: Option<u64>,
    /// Errors of the last poll of each failing query
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl StorageOverview {
    pub fn from_states(
        used: &MetricsState,
        total: &MetricsState,
        health: &MetricsState,
        osds_up: &MetricsState,
    ) -> Self {
        let humanize = |v: Option<f64>| match v {
            Some(bytes) => humanize_binary_bytes(bytes),
            None => NOT_AVAILABLE.to_string(),
        };
        let used_bytes = used.value();
        let total_bytes = total.value();
        let errors = [used, total, health, osds_up]
            .iter()
            .filter_map(|s| s.error.clone())
            .collect();

        Self {
            used_bytes,
            total_bytes,
            used: humanize(used_bytes),
            total: humanize(total_bytes),
            health: health.value().map_or(CephHealth::Unknown, health_from_status),
            osds_up: osds_up.value().filter(|v| *v >= 0.0).map(|v| v as u64),
            errors,
        }
    }
}
