//! Local Storage Operator CRDs
//!
//! - LocalVolumeDiscovery: enables disk auto-detection on selected nodes
//! - LocalVolumeSet: turns matching local disks into PVs of one storage class
//! - LocalVolumeDiscoveryResult: per-node list of disks found by discovery

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Namespace the local storage operator runs in
pub const LOCAL_STORAGE_NAMESPACE: &str = "local-storage";

/// Name of the singleton discovery resource
pub const DISCOVERY_CR_NAME: &str = "auto-discover-devices";

/// Node label used to pin local storage to hosts
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Label carrying the node name on each discovery result
pub const DEVICE_DISCOVERY_NODE_LABEL: &str = "device-discovery-node";

/// Device state of a disk that can be claimed
pub const AVAILABLE_DEVICE_STATE: &str = "Available";

// =============================================================================
// LocalVolumeDiscovery
// =============================================================================

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "local.storage.openshift.io",
    version = "v1alpha1",
    kind = "LocalVolumeDiscovery",
    plural = "localvolumediscoveries",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolumeDiscoverySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,
}

// =============================================================================
// LocalVolumeDiscoveryResult
// =============================================================================

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "local.storage.openshift.io",
    version = "v1alpha1",
    kind = "LocalVolumeDiscoveryResult",
    plural = "localvolumediscoveryresults",
    status = "DiscoveryResultStatus",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResultSpec {
    #[serde(default)]
    pub node_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryResultStatus {
    #[serde(default)]
    pub discovered_devices: Vec<DiscoveredDevice>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveredDevice {
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub size: DeviceSize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DeviceStatus>,
}

/// Device size: plain bytes, or a quantity string such as `100Gi`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum DeviceSize {
    Bytes(u64),
    Quantity(String),
}

impl Default for DeviceSize {
    fn default() -> Self {
        DeviceSize::Bytes(0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DeviceStatus {
    #[serde(default)]
    pub state: String,
}

impl DiscoveredDevice {
    pub fn is_available(&self) -> bool {
        self.status
            .as_ref()
            .is_some_and(|s| s.state == AVAILABLE_DEVICE_STATE)
    }
}

impl LocalVolumeDiscoveryResult {
    pub fn devices(&self) -> &[DiscoveredDevice] {
        self.status
            .as_ref()
            .map(|s| s.discovered_devices.as_slice())
            .unwrap_or_default()
    }
}

// =============================================================================
// LocalVolumeSet
// =============================================================================

#[derive(CustomResource, Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "local.storage.openshift.io",
    version = "v1alpha1",
    kind = "LocalVolumeSet",
    plural = "localvolumesets",
    namespaced
)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolumeSetSpec {
    pub storage_class_name: String,

    pub volume_mode: VolumeMode,

    pub device_inclusion_spec: DeviceInclusionSpec,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<NodeSelector>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_device_count: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum VolumeMode {
    #[default]
    Block,
    Filesystem,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeviceInclusionSpec {
    pub device_types: Vec<DeviceType>,

    pub device_mechanical_properties: Vec<DeviceMechanicalProperty>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_size: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_size: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Disk,
    Part,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum DeviceMechanicalProperty {
    Rotational,
    NonRotational,
}

// =============================================================================
// Node selector
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelector {
    pub node_selector_terms: Vec<NodeSelectorTerm>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectorTerm {
    pub match_expressions: Vec<MatchExpression>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MatchExpression {
    pub key: String,
    pub operator: String,
    pub values: Vec<String>,
}

impl NodeSelector {
    /// Selector matching exactly the given hostnames
    pub fn for_hostnames(names: &[String]) -> Self {
        Self {
            node_selector_terms: vec![NodeSelectorTerm {
                match_expressions: vec![MatchExpression {
                    key: HOSTNAME_LABEL.to_string(),
                    operator: "In".to_string(),
                    values: names.to_vec(),
                }],
            }],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hostname_selector_serialization() {
        let selector = NodeSelector::for_hostnames(&["a".into(), "b".into()]);
        let value = serde_json::to_value(&selector).unwrap();
        assert_eq!(
            value["nodeSelectorTerms"][0]["matchExpressions"][0]["key"],
            "kubernetes.io/hostname"
        );
        assert_eq!(
            value["nodeSelectorTerms"][0]["matchExpressions"][0]["values"][1],
            "b"
        );
    }

    #[test]
    fn test_discovery_result_sizes() {
        let result: LocalVolumeDiscoveryResult = serde_json::from_value(serde_json::json!({
            "apiVersion": "local.storage.openshift.io/v1alpha1",
            "kind": "LocalVolumeDiscoveryResult",
            "metadata": {"name": "discovery-result-worker-0", "namespace": "local-storage"},
            "spec": {"nodeName": "worker-0"},
            "status": {"discoveredDevices": [
                {"path": "/dev/sdb", "size": 107374182400u64, "status": {"state": "Available"}},
                {"path": "/dev/sdc", "size": "10Gi", "status": {"state": "NotAvailable"}},
                {"path": "/dev/sdd"}
            ]}
        }))
        .unwrap();

        let devices = result.devices();
        assert_eq!(result.spec.node_name, "worker-0");
        assert_eq!(devices[0].size, DeviceSize::Bytes(107374182400));
        assert!(devices[0].is_available());
        assert_eq!(devices[1].size, DeviceSize::Quantity("10Gi".into()));
        assert!(!devices[1].is_available());
        assert!(!devices[2].is_available());
    }

    #[test]
    fn test_device_type_wire_names() {
        assert_eq!(serde_json::to_value(DeviceType::Disk).unwrap(), "disk");
        assert_eq!(
            serde_json::to_value(DeviceMechanicalProperty::NonRotational).unwrap(),
            "NonRotational"
        );
    }
}
