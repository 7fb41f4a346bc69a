//! Point-in-time views of cluster state
//!
//! Snapshots are plain values taken before and after a mutation and compared
//! by the verifier. They are never persisted.

use crate::crd::{CephHealth, StorageCluster, DEFAULT_REPLICA};
use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Node, Pod};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Node label carried by control plane nodes
pub const CONTROL_PLANE_LABEL: &str = "node-role.kubernetes.io/control-plane";

/// Legacy control plane label
pub const MASTER_LABEL: &str = "node-role.kubernetes.io/master";

const ZONE_LABELS: [&str; 2] = [
    "topology.kubernetes.io/zone",
    "failure-domain.beta.kubernetes.io/zone",
];

// =============================================================================
// Pods
// =============================================================================

/// The parts of a pod the verifier compares
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodRecord {
    pub name: String,
    pub phase: String,
    /// Sum of restart counts across all containers
    pub restart_count: u32,
}

impl From<&Pod> for PodRecord {
    fn from(pod: &Pod) -> Self {
        let status = pod.status.as_ref();
        let restart_count = status
            .and_then(|s| s.container_statuses.as_ref())
            .map(|statuses| {
                statuses
                    .iter()
                    .map(|c| c.restart_count.max(0) as u32)
                    .sum()
            })
            .unwrap_or(0);

        Self {
            name: pod.metadata.name.clone().unwrap_or_default(),
            phase: status
                .and_then(|s| s.phase.clone())
                .unwrap_or_else(|| "Unknown".to_string()),
            restart_count,
        }
    }
}

/// A named, timestamped collection of pod records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSnapshot {
    pub label: String,
    pub taken_at: DateTime<Utc>,
    pub pods: Vec<PodRecord>,
}

impl PodSnapshot {
    pub fn new(label: impl Into<String>, pods: Vec<PodRecord>) -> Self {
        Self {
            label: label.into(),
            taken_at: Utc::now(),
            pods,
        }
    }

    /// Index pods by name
    pub fn by_name(&self) -> BTreeMap<&str, &PodRecord> {
        self.pods.iter().map(|p| (p.name.as_str(), p)).collect()
    }
}

// =============================================================================
// Nodes
// =============================================================================

/// The parts of a node that selection and verification look at
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeRecord {
    pub name: String,
    pub ready: bool,
    pub control_plane: bool,
    pub zone: Option<String>,
    pub labels: BTreeMap<String, String>,
    pub taint_keys: Vec<String>,
}

/// Check if a node has the Ready condition set to True.
pub fn is_node_ready(node: &Node) -> bool {
    node.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conds| {
            conds
                .iter()
                .any(|c| c.type_ == "Ready" && c.status == "True")
        })
        .unwrap_or(false)
}

/// Check if a node is a control plane node based on labels.
pub fn is_control_plane_node(node: &Node) -> bool {
    node.metadata
        .labels
        .as_ref()
        .map(|l| l.contains_key(CONTROL_PLANE_LABEL) || l.contains_key(MASTER_LABEL))
        .unwrap_or(false)
}

impl From<&Node> for NodeRecord {
    fn from(node: &Node) -> Self {
        let labels = node.metadata.labels.clone().unwrap_or_default();
        let zone = ZONE_LABELS
            .iter()
            .find_map(|key| labels.get(*key).cloned());
        let taint_keys = node
            .spec
            .as_ref()
            .and_then(|s| s.taints.as_ref())
            .map(|taints| taints.iter().map(|t| t.key.clone()).collect())
            .unwrap_or_default();

        Self {
            name: node.metadata.name.clone().unwrap_or_default(),
            ready: is_node_ready(node),
            control_plane: is_control_plane_node(node),
            zone,
            labels,
            taint_keys,
        }
    }
}

// =============================================================================
// Expansion Snapshot
// =============================================================================

/// Everything captured around one capacity expansion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpansionSnapshot {
    /// Count of device set 0
    pub device_set_count: u32,
    /// Replica factor of device set 0
    pub replica: u32,
    /// Storage class of device set 0
    pub storage_class: Option<String>,
    pub pods: PodSnapshot,
    pub nodes: Vec<NodeRecord>,
    pub ceph_health: Option<CephHealth>,
}

impl ExpansionSnapshot {
    /// Build a snapshot from already fetched resources
    pub fn from_resources(
        label: &str,
        cluster: &StorageCluster,
        pods: &[Pod],
        nodes: &[Node],
        ceph_health: Option<CephHealth>,
    ) -> Self {
        let device_set = cluster.first_device_set();
        Self {
            device_set_count: device_set.map(|d| d.count).unwrap_or(0),
            replica: device_set.map(|d| d.replica).unwrap_or(DEFAULT_REPLICA),
            storage_class: device_set.and_then(|d| d.storage_class().map(str::to_string)),
            pods: PodSnapshot::new(label, pods.iter().map(PodRecord::from).collect()),
            nodes: nodes.iter().map(NodeRecord::from).collect(),
            ceph_health,
        }
    }
}
