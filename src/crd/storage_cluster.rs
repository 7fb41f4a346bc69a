//! StorageCluster CRD
//!
//! Desired and observed state of the Ceph storage cluster as reconciled by the
//! storage operator. Only the fields this crate reads or writes are modelled;
//! everything else round-trips untouched through JSON Patch.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Replication factor of every device set
pub const DEFAULT_REPLICA: u32 = 3;

// =============================================================================
// StorageCluster CRD
// =============================================================================

/// StorageCluster describes a Ceph cluster built from replicated device sets.
#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ocs.openshift.io",
    version = "v1",
    kind = "StorageCluster",
    plural = "storageclusters",
    status = "StorageClusterStatus",
    printcolumn = r#"{"name": "Phase", "type": "string", "jsonPath": ".status.phase"}"#,
    printcolumn = r#"{"name": "Age", "type": "date", "jsonPath": ".metadata.creationTimestamp"}"#,
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterSpec {
    /// Whether the operator labels nodes itself
    #[serde(default)]
    pub manage_nodes: bool,

    /// Replicated device groups providing raw capacity
    #[serde(default)]
    pub storage_device_sets: Vec<StorageDeviceSet>,
}

// =============================================================================
// Sub-Types
// =============================================================================

/// A named group of replicated devices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageDeviceSet {
    pub name: String,

    /// Number of replicated device groups
    pub count: u32,

    /// Replication factor
    #[serde(default = "default_replica")]
    pub replica: u32,

    /// PVC template for each device
    #[serde(rename = "dataPVCTemplate")]
    pub data_pvc_template: DataPvcTemplate,

    #[serde(default)]
    pub portable: bool,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, serde_json::Value>")]
    pub resources: serde_json::Map<String, serde_json::Value>,

    #[serde(default)]
    #[schemars(with = "BTreeMap<String, serde_json::Value>")]
    pub placement: serde_json::Map<String, serde_json::Value>,
}

/// PVC template wrapper (`dataPVCTemplate`)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DataPvcTemplate {
    #[serde(default)]
    pub spec: PvcTemplateSpec,
}

/// Subset of a PersistentVolumeClaim spec
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PvcTemplateSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_class_name: Option<String>,

    #[serde(default)]
    pub access_modes: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_mode: Option<String>,

    #[serde(default)]
    pub resources: PvcResources,
}

/// Requested resources of the PVC template
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PvcResources {
    #[serde(default)]
    pub requests: BTreeMap<String, String>,
}

// =============================================================================
// Status
// =============================================================================

/// Observed state of the StorageCluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<ClusterPhase>,

    #[serde(default)]
    pub conditions: Vec<StorageClusterCondition>,
}

/// Coarse reconciliation phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum ClusterPhase {
    Progressing,
    Ready,
    Error,
    Deleting,
    Ignored,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for ClusterPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClusterPhase::Progressing => write!(f, "Progressing"),
            ClusterPhase::Ready => write!(f, "Ready"),
            ClusterPhase::Error => write!(f, "Error"),
            ClusterPhase::Deleting => write!(f, "Deleting"),
            ClusterPhase::Ignored => write!(f, "Ignored"),
            ClusterPhase::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Status condition reported by the operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StorageClusterCondition {
    pub r#type: String,
    pub status: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_replica() -> u32 {
    DEFAULT_REPLICA
}

// =============================================================================
// Implementations
// =============================================================================

impl StorageDeviceSet {
    /// Requested size of each device (e.g. "2Ti")
    pub fn device_size(&self) -> Option<&str> {
        self.data_pvc_template
            .spec
            .resources
            .requests
            .get("storage")
            .map(String::as_str)
    }

    /// Storage class the devices are provisioned from
    pub fn storage_class(&self) -> Option<&str> {
        self.data_pvc_template.spec.storage_class_name.as_deref()
    }
}

impl StorageCluster {
    /// Get the name of this cluster
    pub fn name(&self) -> &str {
        self.metadata.name.as_deref().unwrap_or("unknown")
    }

    /// Get the namespace of this cluster
    pub fn namespace_or_default(&self) -> &str {
        self.metadata.namespace.as_deref().unwrap_or("default")
    }

    /// Observed phase, if the operator reported one
    pub fn phase(&self) -> Option<ClusterPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// The device set expanded by "add capacity"
    pub fn first_device_set(&self) -> Option<&StorageDeviceSet> {
        self.spec.storage_device_sets.first()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_operator_manifest() {
        let cluster: StorageCluster = serde_json::from_value(json!({
            "apiVersion": "ocs.openshift.io/v1",
            "kind": "StorageCluster",
            "metadata": {"name": "ocs-storagecluster", "namespace": "openshift-storage"},
            "spec": {
                "manageNodes": false,
                "storageDeviceSets": [{
                    "name": "ocs-deviceset",
                    "count": 2,
                    "replica": 3,
                    "portable": true,
                    "resources": {},
                    "placement": {},
                    "dataPVCTemplate": {"spec": {
                        "storageClassName": "gp2",
                        "accessModes": ["ReadWriteOnce"],
                        "volumeMode": "Block",
                        "resources": {"requests": {"storage": "2Ti"}}
                    }}
                }]
            },
            "status": {"phase": "Progressing"}
        }))
        .unwrap();

        let set = cluster.first_device_set().unwrap();
        assert_eq!(set.count, 2);
        assert_eq!(set.device_size(), Some("2Ti"));
        assert_eq!(set.storage_class(), Some("gp2"));
        assert_eq!(cluster.phase(), Some(ClusterPhase::Progressing));
        assert_eq!(cluster.name(), "ocs-storagecluster");
    }

    #[test]
    fn test_unknown_phase_and_default_replica() {
        let status: StorageClusterStatus =
            serde_json::from_value(json!({"phase": "Connecting"})).unwrap();
        assert_eq!(status.phase, Some(ClusterPhase::Unknown));

        let set: StorageDeviceSet = serde_json::from_value(json!({
            "name": "ds",
            "count": 1,
            "dataPVCTemplate": {"spec": {}}
        }))
        .unwrap();
        assert_eq!(set.replica, DEFAULT_REPLICA);
        assert_eq!(set.device_size(), None);
    }

    #[test]
    fn test_phase_display() {
        assert_eq!(ClusterPhase::Ready.to_string(), "Ready");
        assert_eq!(ClusterPhase::Progressing.to_string(), "Progressing");
    }
}
