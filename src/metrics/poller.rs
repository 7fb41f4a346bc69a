//! Fixed-interval metrics poller
//!
//! Runs one query on a timer and publishes the latest state on a watch
//! channel. A failed query keeps the last good samples and records the
//! error; the next tick tries again. Stops when its token is cancelled.

use crate::domain::ports::{MetricSample, MetricsSourceRef};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_METRICS_INTERVAL: Duration = Duration::from_secs(30);

/// Shortest interval the poller accepts
pub const MIN_METRICS_INTERVAL: Duration = Duration::from_secs(5);

/// Latest published result of the query
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsState {
    /// Samples of the last successful query
    pub samples: Option<Vec<MetricSample>>,
    /// Error of the last query, cleared on success
    pub error: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub polls: u64,
}

impl MetricsState {
    /// First sample value, if any
    pub fn value(&self) -> Option<f64> {
        self.samples.as_ref()?.first().map(|s| s.value)
    }
}

pub struct MetricsPoller {
    source: MetricsSourceRef,
    query: String,
    interval: Duration,
    tx: watch::Sender<MetricsState>,
}

impl MetricsPoller {
    /// Intervals below [`MIN_METRICS_INTERVAL`] are raised to it
    pub fn new(
        source: MetricsSourceRef,
        query: impl Into<String>,
        interval: Duration,
    ) -> (Self, watch::Receiver<MetricsState>) {
        let (tx, rx) = watch::channel(MetricsState::default());
        let poller = Self {
            source,
            query: query.into(),
            interval: interval.max(MIN_METRICS_INTERVAL),
            tx,
        };
        (poller, rx)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run one query and publish the result
    pub async fn poll_once(&self) {
        let result = self.source.query(&self.query).await;
        self.tx.send_modify(|state| {
            state.polls += 1;
            state.updated_at = Some(Utc::now());
            match result {
                Ok(samples) => {
                    debug!("Query '{}' returned {} sample(s)", self.query, samples.len());
                    state.samples = Some(samples);
                    state.error = None;
                }
                Err(e) => {
                    warn!("Query '{}' failed: {}", self.query, e);
                    state.error = Some(e.to_string());
                }
            }
        });
    }

    /// Poll until `cancel` fires
    pub async fn run(self, cancel: CancellationToken) {
        info!("Polling '{}' every {:?}", self.query, self.interval);
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("Metrics poller for '{}' stopped", self.query);
                    break;
                }
                _ = ticker.tick() => self.poll_once().await,
            }
        }
    }

    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(cancel))
    }
}
