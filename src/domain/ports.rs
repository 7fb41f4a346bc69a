//! Domain Ports - Core trait definitions for the capacity manager
//!
//! These traits define the boundaries between the workflows and the external
//! systems they drive: the Kubernetes API server and the Prometheus backend.
//! Adapters implement these traits to provide concrete functionality.

use crate::crd::{
    CephCluster, LocalVolumeDiscovery, LocalVolumeDiscoveryResult, LocalVolumeSet, StorageCluster,
};
use crate::error::Result;
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::StorageClass;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// =============================================================================
// Resource Identity
// =============================================================================

/// Identifies a single namespaced resource
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceRef {
    pub kind: String,
    pub namespace: String,
    pub name: String,
}

impl ResourceRef {
    pub fn new(
        kind: impl Into<String>,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Reference to a StorageCluster
    pub fn storage_cluster(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self::new("StorageCluster", namespace, name)
    }
}

impl std::fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.kind, self.namespace, self.name)
    }
}

// =============================================================================
// JSON Patch
// =============================================================================

pub use json_patch::PatchOperation;
use json_patch::{AddOperation, ReplaceOperation};

/// `add` operation on a JSON pointer path
pub fn add_op(path: impl Into<String>, value: serde_json::Value) -> PatchOperation {
    PatchOperation::Add(AddOperation {
        path: path.into(),
        value,
    })
}

/// `replace` operation on a JSON pointer path
pub fn replace_op(path: impl Into<String>, value: serde_json::Value) -> PatchOperation {
    PatchOperation::Replace(ReplaceOperation {
        path: path.into(),
        value,
    })
}

/// Escape a map key for use as a JSON pointer segment (RFC 6901)
pub fn escape_pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

// =============================================================================
// Cluster API Port
// =============================================================================

/// Port for the Kubernetes API operations the workflows need
///
/// Every method issues exactly one request. Implementations map HTTP 404 to
/// `Error::ResourceNotFound` and surface everything else as `Error::Kube`.
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Get a StorageCluster
    async fn get_storage_cluster(&self, namespace: &str, name: &str) -> Result<StorageCluster>;

    /// List StorageClusters in a namespace
    async fn list_storage_clusters(&self, namespace: &str) -> Result<Vec<StorageCluster>>;

    /// Create a StorageCluster
    async fn create_storage_cluster(&self, cluster: &StorageCluster) -> Result<StorageCluster>;

    /// Apply JSON Patch operations to a StorageCluster
    async fn patch_storage_cluster(
        &self,
        namespace: &str,
        name: &str,
        ops: &[PatchOperation],
    ) -> Result<StorageCluster>;

    /// List pods in a namespace, optionally filtered by label selector
    async fn list_pods(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Pod>>;

    /// List cluster nodes, optionally filtered by label selector
    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>>;

    /// Apply JSON Patch operations to a node
    async fn patch_node(&self, name: &str, ops: &[PatchOperation]) -> Result<Node>;

    /// List storage classes
    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>>;

    /// List persistent volumes
    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>>;

    /// List CephClusters in a namespace
    async fn list_ceph_clusters(&self, namespace: &str) -> Result<Vec<CephCluster>>;

    /// Create a LocalVolumeSet
    async fn create_local_volume_set(&self, set: &LocalVolumeSet) -> Result<LocalVolumeSet>;

    /// Create a LocalVolumeDiscovery
    async fn create_local_volume_discovery(
        &self,
        discovery: &LocalVolumeDiscovery,
    ) -> Result<LocalVolumeDiscovery>;

    /// List discovery results in a namespace, optionally filtered by label selector
    async fn list_local_volume_discovery_results(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<LocalVolumeDiscoveryResult>>;

    /// Get a PersistentVolumeClaim
    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim>;

    /// Create a PersistentVolumeClaim
    async fn create_persistent_volume_claim(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim>;
}

// =============================================================================
// Metrics Port
// =============================================================================

/// One sample of an instant-vector query result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub labels: std::collections::BTreeMap<String, String>,
    pub timestamp: f64,
    pub value: f64,
}

/// Port for instant queries against the time-series backend
#[async_trait]
pub trait MetricsSource: Send + Sync {
    /// Run an instant query
    async fn query(&self, query: &str) -> Result<Vec<MetricSample>>;
}

// =============================================================================
// Type Aliases for Arc'd Traits
// =============================================================================

pub type ClusterApiRef = Arc<dyn ClusterApi>;
pub type MetricsSourceRef = Arc<dyn MetricsSource>;
