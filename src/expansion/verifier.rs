//! Outcome Verifier
//!
//! Compares the snapshots taken before and after an expansion and reports
//! each property separately. Verification never fails as an operation: a
//! broken property is a `Failed` entry in the report, not an `Err`.

use crate::crd::CephHealth;
use crate::domain::snapshot::ExpansionSnapshot;
use serde::{Deserialize, Serialize};

/// Name prefix of Ceph OSD daemon pods
pub const OSD_POD_PREFIX: &str = "rook-ceph-osd-";

/// Name prefix of the one-shot OSD prepare jobs; their suffix changes on every run
pub const OSD_PREPARE_POD_PREFIX: &str = "rook-ceph-osd-prepare-";

// =============================================================================
// Daemon Pod Pattern
// =============================================================================

/// Which pods count as storage daemons
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DaemonPodPattern {
    pub prefix: String,
    pub exclude_prefixes: Vec<String>,
}

impl Default for DaemonPodPattern {
    fn default() -> Self {
        Self {
            prefix: OSD_POD_PREFIX.to_string(),
            exclude_prefixes: vec![OSD_PREPARE_POD_PREFIX.to_string()],
        }
    }
}

impl DaemonPodPattern {
    pub fn matches(&self, pod_name: &str) -> bool {
        pod_name.starts_with(&self.prefix)
            && !self
                .exclude_prefixes
                .iter()
                .any(|p| pod_name.starts_with(p.as_str()))
    }
}

// =============================================================================
// Report
// =============================================================================

/// A checked property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Property {
    CapacityDelta,
    NewDaemonPods,
    NoUnexpectedRestarts,
    NodesReady,
    ClusterHealth,
    StorageClassApplied,
}

impl std::fmt::Display for Property {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Property::CapacityDelta => write!(f, "capacity increased by one device set"),
            Property::NewDaemonPods => write!(f, "new daemon pods created"),
            Property::NoUnexpectedRestarts => write!(f, "no unexpected pod restarts"),
            Property::NodesReady => write!(f, "all nodes ready"),
            Property::ClusterHealth => write!(f, "ceph cluster healthy"),
            Property::StorageClassApplied => write!(f, "selected storage class applied"),
        }
    }
}

/// Result of one property check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyResult {
    pub property: Property,
    pub passed: bool,
    pub detail: String,
    /// Pods or nodes that violate the property
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub offenders: Vec<String>,
}

impl PropertyResult {
    fn pass(property: Property, detail: String) -> Self {
        Self {
            property,
            passed: true,
            detail,
            offenders: Vec::new(),
        }
    }

    fn fail(property: Property, detail: String, offenders: Vec<String>) -> Self {
        Self {
            property,
            passed: false,
            detail,
            offenders,
        }
    }

    fn check(property: Property, passed: bool, detail: String, offenders: Vec<String>) -> Self {
        if passed {
            Self::pass(property, detail)
        } else {
            Self::fail(property, detail, offenders)
        }
    }
}

/// Per-property verification outcome
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationReport {
    pub results: Vec<PropertyResult>,
}

impl VerificationReport {
    /// True when every property passed
    pub fn passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn get(&self, property: Property) -> Option<&PropertyResult> {
        self.results.iter().find(|r| r.property == property)
    }

    pub fn failures(&self) -> impl Iterator<Item = &PropertyResult> {
        self.results.iter().filter(|r| !r.passed)
    }
}

// =============================================================================
// Verifier
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct OutcomeVerifier {
    pattern: DaemonPodPattern,
}

impl OutcomeVerifier {
    pub fn new(pattern: DaemonPodPattern) -> Self {
        Self { pattern }
    }

    /// Compare `before` and `after`
    ///
    /// `requested_class` is the storage class the operator picked, if any.
    pub fn verify(
        &self,
        before: &ExpansionSnapshot,
        after: &ExpansionSnapshot,
        requested_class: Option<&str>,
    ) -> VerificationReport {
        let delta = i64::from(after.device_set_count) - i64::from(before.device_set_count);

        let mut results = vec![
            Self::capacity_delta(delta),
            self.new_daemon_pods(before, after, delta),
            Self::no_unexpected_restarts(before, after),
            Self::nodes_ready(after),
            Self::cluster_health(after),
        ];
        if let Some(class) = requested_class {
            results.push(Self::storage_class_applied(after, class));
        }

        VerificationReport { results }
    }

    fn capacity_delta(delta: i64) -> PropertyResult {
        PropertyResult::check(
            Property::CapacityDelta,
            delta == 1,
            format!("device set count changed by {}", delta),
            Vec::new(),
        )
    }

    fn new_daemon_pods(
        &self,
        before: &ExpansionSnapshot,
        after: &ExpansionSnapshot,
        delta: i64,
    ) -> PropertyResult {
        let existing = before.pods.by_name();
        let new_pods: Vec<String> = after
            .pods
            .pods
            .iter()
            .filter(|p| self.pattern.matches(&p.name) && !existing.contains_key(p.name.as_str()))
            .map(|p| p.name.clone())
            .collect();

        let expected = i64::from(after.replica) * delta;
        let found = new_pods.len() as i64;
        let detail = format!("expected {} new daemon pod(s), found {}", expected, found);

        if found == expected {
            PropertyResult::pass(Property::NewDaemonPods, detail)
        } else {
            PropertyResult::fail(Property::NewDaemonPods, detail, new_pods)
        }
    }

    fn no_unexpected_restarts(
        before: &ExpansionSnapshot,
        after: &ExpansionSnapshot,
    ) -> PropertyResult {
        let previous = before.pods.by_name();
        let restarted: Vec<String> = after
            .pods
            .pods
            .iter()
            .filter_map(|pod| {
                let old = previous.get(pod.name.as_str())?;
                (pod.restart_count != old.restart_count).then(|| {
                    format!(
                        "{} ({} -> {})",
                        pod.name, old.restart_count, pod.restart_count
                    )
                })
            })
            .collect();

        PropertyResult::check(
            Property::NoUnexpectedRestarts,
            restarted.is_empty(),
            format!("{} pre-existing pod(s) restarted", restarted.len()),
            restarted,
        )
    }

    fn nodes_ready(after: &ExpansionSnapshot) -> PropertyResult {
        let not_ready: Vec<String> = after
            .nodes
            .iter()
            .filter(|n| !n.ready)
            .map(|n| n.name.clone())
            .collect();

        PropertyResult::check(
            Property::NodesReady,
            not_ready.is_empty(),
            format!(
                "{} of {} node(s) ready",
                after.nodes.len() - not_ready.len(),
                after.nodes.len()
            ),
            not_ready,
        )
    }

    fn cluster_health(after: &ExpansionSnapshot) -> PropertyResult {
        match after.ceph_health {
            Some(CephHealth::Err) => PropertyResult::fail(
                Property::ClusterHealth,
                "ceph reports HEALTH_ERR".to_string(),
                Vec::new(),
            ),
            Some(health) => {
                PropertyResult::pass(Property::ClusterHealth, format!("ceph reports {}", health))
            }
            None => PropertyResult::pass(
                Property::ClusterHealth,
                "ceph health not reported".to_string(),
            ),
        }
    }

    fn storage_class_applied(after: &ExpansionSnapshot, requested: &str) -> PropertyResult {
        let actual = after.storage_class.as_deref();
        PropertyResult::check(
            Property::StorageClassApplied,
            actual == Some(requested),
            format!(
                "requested {}, device set uses {}",
                requested,
                actual.unwrap_or("<none>")
            ),
            Vec::new(),
        )
    }
}
