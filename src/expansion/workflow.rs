//! Capacity Expansion Workflow
//!
//! One linear pass per user action:
//!
//! ```text
//! Reader ──▶ Builder ──▶ Submitter ──▶ Poller ──▶ Reader ──▶ Verifier
//! (before)                          (settle, Ready)  (after)
//! ```
//!
//! Right after the patch lands the operator may not have noticed it yet and
//! still report `Ready`. The workflow therefore first gives the cluster a
//! short settle window to move to `Progressing` and only then waits for
//! `Ready` again.

use super::builder::CapacityChangeRequest;
use super::poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
use super::reader::SnapshotReader;
use super::submitter::MutationSubmitter;
use super::verifier::{DaemonPodPattern, OutcomeVerifier, VerificationReport};
use crate::crd::ClusterPhase;
use crate::domain::ports::{ClusterApiRef, ResourceRef};
use crate::domain::snapshot::ExpansionSnapshot;
use crate::error::{Error, Result};
use crate::metrics::WorkflowMetrics;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Time allowed for the phase to leave `Ready` after the patch
pub const DEFAULT_SETTLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Time allowed for the cluster to come back to `Ready`
pub const DEFAULT_EXPANSION_TIMEOUT: Duration = Duration::from_secs(15 * 60);

#[derive(Debug, Clone)]
pub struct ExpansionConfig {
    pub poll_interval: Duration,
    pub settle_timeout: Duration,
    pub expansion_timeout: Duration,
    pub daemon_pattern: DaemonPodPattern,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            expansion_timeout: DEFAULT_EXPANSION_TIMEOUT,
            daemon_pattern: DaemonPodPattern::default(),
        }
    }
}

/// Everything one expansion produced
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionOutcome {
    pub target: String,
    pub request: CapacityChangeRequest,
    pub before: ExpansionSnapshot,
    pub after: ExpansionSnapshot,
    pub report: VerificationReport,
}

impl ExpansionOutcome {
    pub fn passed(&self) -> bool {
        self.report.passed()
    }
}

pub struct ExpansionWorkflow {
    reader: SnapshotReader,
    submitter: MutationSubmitter,
    poller: StatusPoller,
    verifier: OutcomeVerifier,
    config: ExpansionConfig,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl ExpansionWorkflow {
    pub fn new(api: ClusterApiRef, config: ExpansionConfig) -> Self {
        Self {
            reader: SnapshotReader::new(api.clone()),
            submitter: MutationSubmitter::new(api.clone()),
            poller: StatusPoller::new(api, config.poll_interval),
            verifier: OutcomeVerifier::new(config.daemon_pattern.clone()),
            config,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Add one device group to `target`, optionally switching storage class
    ///
    /// Returns `Ok` with a failing report when the cluster settled but the
    /// outcome is wrong; `Err` only when a step could not complete.
    pub async fn run(
        &self,
        target: &ResourceRef,
        storage_class: Option<&str>,
    ) -> Result<ExpansionOutcome> {
        if let Some(m) = &self.metrics {
            m.expansion_started();
        }

        let result = self.execute(target, storage_class).await;

        if let Some(m) = &self.metrics {
            match &result {
                Ok(outcome) if outcome.passed() => m.expansion_succeeded(),
                Ok(_) => m.expansion_failed("verification"),
                Err(e) => m.expansion_failed(e.code()),
            }
        }
        result
    }

    async fn execute(
        &self,
        target: &ResourceRef,
        storage_class: Option<&str>,
    ) -> Result<ExpansionOutcome> {
        let storage_class = storage_class.filter(|sc| !sc.is_empty());

        let (cluster, before) = self.reader.read(target, "before").await?;
        let request = CapacityChangeRequest::build(&cluster.spec, storage_class)?;
        info!(
            "Expanding {}: device set {} count {} -> {}{}",
            target,
            request.device_set_index,
            request.previous_count,
            request.new_count,
            request
                .storage_class_name
                .as_deref()
                .map(|sc| format!(", storage class -> {}", sc))
                .unwrap_or_default()
        );

        self.submitter.patch(target, &request.patch_ops()).await?;

        match self
            .poller
            .wait_for_phase(target, ClusterPhase::Progressing, self.config.settle_timeout)
            .await
        {
            Ok(_) => debug!("{} started reconciling", target),
            Err(Error::PollTimeout { .. }) => {
                debug!("{} did not leave Ready within the settle window", target)
            }
            Err(e) => return Err(e),
        }

        let started = Instant::now();
        let waited = self
            .poller
            .wait_for_phase(target, ClusterPhase::Ready, self.config.expansion_timeout)
            .await;
        if let Some(m) = &self.metrics {
            m.observe_poll(started.elapsed());
        }
        waited?;

        let after = self.reader.capture(target, "after").await?;
        let report = self.verifier.verify(&before, &after, storage_class);

        if report.passed() {
            info!("Expansion of {} verified", target);
        } else {
            for failure in report.failures() {
                warn!(
                    "Expansion of {}: {} failed: {}",
                    target, failure.property, failure.detail
                );
            }
        }

        Ok(ExpansionOutcome {
            target: target.to_string(),
            request,
            before,
            after,
            report,
        })
    }
}
