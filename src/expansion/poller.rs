//! Status Poller
//!
//! Re-reads a StorageCluster on a fixed interval until its phase reaches the
//! requested value, the operator reports `Error`, or the time budget runs
//! out. No backoff and no jitter: the interval is constant.

use crate::crd::{ClusterPhase, StorageCluster};
use crate::domain::ports::{ClusterApiRef, ResourceRef};
use crate::error::{Error, Result};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Interval between status reads
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(2);

pub struct StatusPoller {
    api: ClusterApiRef,
    interval: Duration,
}

impl StatusPoller {
    pub fn new(api: ClusterApiRef, interval: Duration) -> Self {
        Self { api, interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait until `target` reports `terminal`
    ///
    /// `Error` is terminal failure unless it is itself the awaited phase.
    /// Transient read errors are logged and the next attempt proceeds on
    /// schedule; anything else aborts the wait.
    pub async fn wait_for_phase(
        &self,
        target: &ResourceRef,
        terminal: ClusterPhase,
        timeout: Duration,
    ) -> Result<StorageCluster> {
        let started = Instant::now();
        let mut last_phase: Option<ClusterPhase> = None;

        info!(
            "Waiting up to {:?} for {} to reach phase {}",
            timeout, target, terminal
        );

        let outcome = tokio::time::timeout(
            timeout,
            self.poll_until(target, terminal, &mut last_phase),
        )
        .await;

        match outcome {
            Ok(result) => {
                if result.is_ok() {
                    info!(
                        "{} reached phase {} after {:?}",
                        target,
                        terminal,
                        started.elapsed()
                    );
                }
                result
            }
            Err(_) => {
                warn!(
                    "Timed out waiting for {} (last phase: {:?})",
                    target, last_phase
                );
                Err(Error::PollTimeout {
                    resource: target.to_string(),
                    last_phase,
                    waited: timeout,
                })
            }
        }
    }

    async fn poll_until(
        &self,
        target: &ResourceRef,
        terminal: ClusterPhase,
        last_phase: &mut Option<ClusterPhase>,
    ) -> Result<StorageCluster> {
        loop {
            match self
                .api
                .get_storage_cluster(&target.namespace, &target.name)
                .await
            {
                Ok(cluster) => {
                    let phase = cluster.phase();
                    if phase != *last_phase {
                        debug!("{} phase: {:?} -> {:?}", target, last_phase, phase);
                    }
                    if phase.is_some() {
                        *last_phase = phase;
                    }

                    match phase {
                        Some(p) if p == terminal => return Ok(cluster),
                        Some(ClusterPhase::Error) => {
                            return Err(Error::ReconcileFailed {
                                resource: target.to_string(),
                                phase: ClusterPhase::Error,
                            })
                        }
                        _ => {}
                    }
                }
                Err(e) if e.is_transient() => {
                    warn!("Transient error reading {}: {}", target, e);
                }
                Err(e) => return Err(e),
            }

            tokio::time::sleep(self.interval).await;
        }
    }
}
