//! In-memory `ClusterApi` used by unit tests
//!
//! Stores resources as typed values, applies JSON Patch operations the same
//! way the API server would, and records every call so tests can assert on
//! exactly which requests a workflow issued.

use crate::crd::{
    CephCluster, CephClusterSpec, CephClusterStatus, CephHealth, CephStatus, ClusterPhase,
    DataPvcTemplate, DeviceSize, DeviceStatus, DiscoveredDevice, DiscoveryResultSpec,
    DiscoveryResultStatus, LocalVolumeDiscovery, LocalVolumeDiscoveryResult, LocalVolumeSet,
    PvcResources, PvcTemplateSpec, StorageCluster, StorageClusterSpec, StorageClusterStatus,
    StorageDeviceSet,
};
use crate::domain::ports::{ClusterApi, PatchOperation};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{
    ContainerStatus, Node, NodeCondition, NodeStatus, PersistentVolume, PersistentVolumeClaim,
    PersistentVolumeClaimSpec, PersistentVolumeSpec, PersistentVolumeStatus, Pod, PodStatus,
    VolumeResourceRequirements,
};
use k8s_openapi::api::storage::v1::StorageClass;
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use std::collections::{BTreeMap, VecDeque};
use std::sync::Mutex;

pub const NS: &str = "openshift-storage";
pub const CLUSTER: &str = "ocs-storagecluster";

// =============================================================================
// Fixtures
// =============================================================================

pub fn storage_cluster(count: u32, storage_class: Option<&str>) -> StorageCluster {
    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), "2Ti".to_string());

    let mut cluster = StorageCluster::new(
        CLUSTER,
        StorageClusterSpec {
            manage_nodes: false,
            storage_device_sets: vec![StorageDeviceSet {
                name: "ocs-deviceset".into(),
                count,
                replica: 3,
                data_pvc_template: DataPvcTemplate {
                    spec: PvcTemplateSpec {
                        storage_class_name: storage_class.map(str::to_string),
                        access_modes: vec!["ReadWriteOnce".into()],
                        volume_mode: Some("Block".into()),
                        resources: PvcResources { requests },
                    },
                },
                portable: true,
                resources: Default::default(),
                placement: Default::default(),
            }],
        },
    );
    cluster.metadata.namespace = Some(NS.to_string());
    cluster.metadata.uid = Some("uid-ocs".to_string());
    cluster.status = Some(StorageClusterStatus {
        phase: Some(ClusterPhase::Ready),
        conditions: vec![],
    });
    cluster
}

pub fn pod(name: &str, restarts: i32) -> Pod {
    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(NS.to_string()),
            ..Default::default()
        },
        status: Some(PodStatus {
            phase: Some("Running".into()),
            container_statuses: Some(vec![ContainerStatus {
                name: "main".into(),
                restart_count: restarts,
                ready: true,
                ..Default::default()
            }]),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn node(name: &str, ready: bool) -> Node {
    Node {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            labels: Some(BTreeMap::from([(
                "kubernetes.io/hostname".to_string(),
                name.to_string(),
            )])),
            ..Default::default()
        },
        spec: None,
        status: Some(NodeStatus {
            conditions: Some(vec![NodeCondition {
                type_: "Ready".into(),
                status: if ready { "True" } else { "False" }.into(),
                ..Default::default()
            }]),
            ..Default::default()
        }),
    }
}

pub fn storage_class(name: &str, provisioner: &str) -> StorageClass {
    StorageClass {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        provisioner: provisioner.to_string(),
        ..Default::default()
    }
}

pub fn persistent_volume(name: &str, class: &str, capacity: &str, phase: &str) -> PersistentVolume {
    PersistentVolume {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            ..Default::default()
        },
        spec: Some(PersistentVolumeSpec {
            storage_class_name: Some(class.to_string()),
            capacity: Some(BTreeMap::from([(
                "storage".to_string(),
                Quantity(capacity.to_string()),
            )])),
            ..Default::default()
        }),
        status: Some(PersistentVolumeStatus {
            phase: Some(phase.to_string()),
            ..Default::default()
        }),
    }
}

pub fn ceph_cluster(health: CephHealth) -> CephCluster {
    let mut cluster = CephCluster::new(
        "ocs-storagecluster-cephcluster",
        CephClusterSpec::default(),
    );
    cluster.metadata.namespace = Some(NS.to_string());
    cluster.status = Some(CephClusterStatus {
        ceph: Some(CephStatus {
            health: Some(health),
        }),
    });
    cluster
}

/// Local PV created by a LocalVolumeSet on `host`
pub fn local_persistent_volume(
    name: &str,
    class: &str,
    capacity: &str,
    host: &str,
) -> PersistentVolume {
    let mut pv = persistent_volume(name, class, capacity, "Available");
    pv.metadata.labels = Some(BTreeMap::from([(
        "kubernetes.io/hostname".to_string(),
        host.to_string(),
    )]));
    pv
}

/// Discovery result for `node`; each device is `(path, size, state)`
pub fn discovery_result(
    node: &str,
    devices: &[(&str, DeviceSize, &str)],
) -> LocalVolumeDiscoveryResult {
    let mut result = LocalVolumeDiscoveryResult::new(
        &format!("discovery-result-{}", node),
        DiscoveryResultSpec {
            node_name: node.to_string(),
        },
    );
    result.metadata.namespace = Some("local-storage".to_string());
    result.metadata.labels = Some(BTreeMap::from([(
        "device-discovery-node".to_string(),
        node.to_string(),
    )]));
    result.status = Some(DiscoveryResultStatus {
        discovered_devices: devices
            .iter()
            .map(|(path, size, state)| DiscoveredDevice {
                path: path.to_string(),
                size: size.clone(),
                status: Some(DeviceStatus {
                    state: state.to_string(),
                }),
            })
            .collect(),
    });
    result
}

pub fn persistent_volume_claim(name: &str, class: &str, size: &str) -> PersistentVolumeClaim {
    PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some("app".to_string()),
            uid: Some(format!("uid-{}", name)),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: Some(class.to_string()),
            access_modes: Some(vec!["ReadWriteOnce".to_string()]),
            volume_mode: Some("Filesystem".to_string()),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(size.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    }
}

/// `count` running OSD daemon pods with distinct names
pub fn daemon_pods(count: usize) -> Vec<Pod> {
    (0..count).map(|i| pod(&format!("rook-ceph-osd-{}-abc{}", i, i), 0)).collect()
}

fn not_found(kind: &str, name: &str) -> Error {
    Error::ResourceNotFound {
        kind: kind.to_string(),
        name: name.to_string(),
    }
}

/// Apply `ops` to a typed resource the way the API server would
pub fn apply_ops<T>(resource: &T, ops: &[PatchOperation]) -> Result<T>
where
    T: serde::Serialize + serde::de::DeserializeOwned,
{
    let mut doc = serde_json::to_value(resource)?;
    json_patch::patch(&mut doc, &json_patch::Patch(ops.to_vec()))
        .map_err(|e| Error::Internal(format!("patch failed: {}", e)))?;
    Ok(serde_json::from_value(doc)?)
}

// =============================================================================
// Fake Cluster
// =============================================================================

/// In-memory cluster state
#[derive(Default)]
pub struct FakeCluster {
    pub storage_clusters: Mutex<BTreeMap<(String, String), StorageCluster>>,
    /// Phases reported by successive `get_storage_cluster` calls; the last one sticks
    pub phase_script: Mutex<VecDeque<ClusterPhase>>,
    /// Errors returned (in order) by `get_storage_cluster` before the normal path
    pub get_errors: Mutex<VecDeque<Error>>,
    pub pods: Mutex<Vec<Pod>>,
    /// Pod set that replaces `pods` once a StorageCluster patch lands
    pub pods_after_patch: Mutex<Option<Vec<Pod>>>,
    pub nodes: Mutex<Vec<Node>>,
    pub storage_classes: Mutex<Vec<StorageClass>>,
    pub persistent_volumes: Mutex<Vec<PersistentVolume>>,
    pub ceph_clusters: Mutex<Vec<CephCluster>>,
    pub local_volume_sets: Mutex<Vec<LocalVolumeSet>>,
    pub discoveries: Mutex<Vec<LocalVolumeDiscovery>>,
    pub discovery_results: Mutex<Vec<LocalVolumeDiscoveryResult>>,
    pub pvcs: Mutex<Vec<PersistentVolumeClaim>>,
    pub calls: Mutex<Vec<String>>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_storage_cluster(self, cluster: StorageCluster) -> Self {
        let key = (
            cluster.namespace_or_default().to_string(),
            cluster.name().to_string(),
        );
        self.storage_clusters.lock().unwrap().insert(key, cluster);
        self
    }

    pub fn with_pods(self, pods: Vec<Pod>) -> Self {
        *self.pods.lock().unwrap() = pods;
        self
    }

    pub fn with_pods_after_patch(self, pods: Vec<Pod>) -> Self {
        *self.pods_after_patch.lock().unwrap() = Some(pods);
        self
    }

    pub fn with_nodes(self, nodes: Vec<Node>) -> Self {
        *self.nodes.lock().unwrap() = nodes;
        self
    }

    pub fn with_phases(self, phases: &[ClusterPhase]) -> Self {
        *self.phase_script.lock().unwrap() = phases.iter().copied().collect();
        self
    }

    pub fn with_storage_classes(self, classes: Vec<StorageClass>) -> Self {
        *self.storage_classes.lock().unwrap() = classes;
        self
    }

    pub fn with_persistent_volumes(self, pvs: Vec<PersistentVolume>) -> Self {
        *self.persistent_volumes.lock().unwrap() = pvs;
        self
    }

    pub fn with_ceph_cluster(self, cluster: CephCluster) -> Self {
        self.ceph_clusters.lock().unwrap().push(cluster);
        self
    }

    pub fn with_discovery_results(self, results: Vec<LocalVolumeDiscoveryResult>) -> Self {
        *self.discovery_results.lock().unwrap() = results;
        self
    }

    pub fn with_pvcs(self, pvcs: Vec<PersistentVolumeClaim>) -> Self {
        *self.pvcs.lock().unwrap() = pvcs;
        self
    }

    pub fn with_get_errors(self, errors: Vec<Error>) -> Self {
        *self.get_errors.lock().unwrap() = errors.into_iter().collect();
        self
    }

    /// Names of the calls issued so far, in order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, name: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == name).count()
    }

    pub fn stored_cluster(&self) -> StorageCluster {
        self.storage_clusters
            .lock()
            .unwrap()
            .get(&(NS.to_string(), CLUSTER.to_string()))
            .cloned()
            .expect("storage cluster present")
    }

    pub fn stored_node(&self, name: &str) -> Node {
        self.nodes
            .lock()
            .unwrap()
            .iter()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .cloned()
            .expect("node present")
    }

    fn record(&self, call: &str) {
        self.calls.lock().unwrap().push(call.to_string());
    }
}

#[async_trait]
impl ClusterApi for FakeCluster {
    async fn get_storage_cluster(&self, namespace: &str, name: &str) -> Result<StorageCluster> {
        self.record("get_storage_cluster");
        if let Some(err) = self.get_errors.lock().unwrap().pop_front() {
            return Err(err);
        }

        let mut clusters = self.storage_clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("StorageCluster", name))?;

        let mut script = self.phase_script.lock().unwrap();
        let next = if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().copied()
        };
        if let Some(phase) = next {
            cluster.status.get_or_insert_with(Default::default).phase = Some(phase);
        }
        Ok(cluster.clone())
    }

    async fn list_storage_clusters(&self, namespace: &str) -> Result<Vec<StorageCluster>> {
        self.record("list_storage_clusters");
        Ok(self
            .storage_clusters
            .lock()
            .unwrap()
            .iter()
            .filter(|((ns, _), _)| ns == namespace)
            .map(|(_, c)| c.clone())
            .collect())
    }

    async fn create_storage_cluster(&self, cluster: &StorageCluster) -> Result<StorageCluster> {
        self.record("create_storage_cluster");
        let key = (
            cluster.namespace_or_default().to_string(),
            cluster.name().to_string(),
        );
        let mut created = cluster.clone();
        created.metadata.uid = Some(format!("uid-{}", cluster.name()));
        self.storage_clusters
            .lock()
            .unwrap()
            .insert(key, created.clone());
        Ok(created)
    }

    async fn patch_storage_cluster(
        &self,
        namespace: &str,
        name: &str,
        ops: &[PatchOperation],
    ) -> Result<StorageCluster> {
        self.record("patch_storage_cluster");
        let mut clusters = self.storage_clusters.lock().unwrap();
        let cluster = clusters
            .get_mut(&(namespace.to_string(), name.to_string()))
            .ok_or_else(|| not_found("StorageCluster", name))?;
        let patched: StorageCluster = apply_ops(cluster, ops)?;
        *cluster = patched.clone();

        if let Some(pods) = self.pods_after_patch.lock().unwrap().take() {
            *self.pods.lock().unwrap() = pods;
        }
        Ok(patched)
    }

    async fn list_pods(&self, _namespace: &str, _label_selector: Option<&str>) -> Result<Vec<Pod>> {
        self.record("list_pods");
        Ok(self.pods.lock().unwrap().clone())
    }

    async fn list_nodes(&self, _label_selector: Option<&str>) -> Result<Vec<Node>> {
        self.record("list_nodes");
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn patch_node(&self, name: &str, ops: &[PatchOperation]) -> Result<Node> {
        self.record("patch_node");
        let mut nodes = self.nodes.lock().unwrap();
        let node = nodes
            .iter_mut()
            .find(|n| n.metadata.name.as_deref() == Some(name))
            .ok_or_else(|| not_found("Node", name))?;
        let patched: Node = apply_ops(node, ops)?;
        *node = patched.clone();
        Ok(patched)
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
        self.record("list_storage_classes");
        Ok(self.storage_classes.lock().unwrap().clone())
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>> {
        self.record("list_persistent_volumes");
        Ok(self.persistent_volumes.lock().unwrap().clone())
    }

    async fn list_ceph_clusters(&self, _namespace: &str) -> Result<Vec<CephCluster>> {
        self.record("list_ceph_clusters");
        Ok(self.ceph_clusters.lock().unwrap().clone())
    }

    async fn create_local_volume_set(&self, set: &LocalVolumeSet) -> Result<LocalVolumeSet> {
        self.record("create_local_volume_set");
        self.local_volume_sets.lock().unwrap().push(set.clone());
        Ok(set.clone())
    }

    async fn create_local_volume_discovery(
        &self,
        discovery: &LocalVolumeDiscovery,
    ) -> Result<LocalVolumeDiscovery> {
        self.record("create_local_volume_discovery");
        self.discoveries.lock().unwrap().push(discovery.clone());
        Ok(discovery.clone())
    }

    async fn list_local_volume_discovery_results(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<LocalVolumeDiscoveryResult>> {
        self.record("list_local_volume_discovery_results");
        // Only `key=value` selectors are understood here
        let wanted = label_selector.and_then(|s| s.split_once('='));
        Ok(self
            .discovery_results
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.metadata.namespace.as_deref() == Some(namespace))
            .filter(|r| match wanted {
                Some((key, value)) => r
                    .metadata
                    .labels
                    .as_ref()
                    .and_then(|l| l.get(key))
                    .is_some_and(|v| v == value),
                None => true,
            })
            .cloned()
            .collect())
    }

    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        self.record("get_persistent_volume_claim");
        self.pvcs
            .lock()
            .unwrap()
            .iter()
            .find(|p| {
                p.metadata.namespace.as_deref() == Some(namespace)
                    && p.metadata.name.as_deref() == Some(name)
            })
            .cloned()
            .ok_or_else(|| not_found("PersistentVolumeClaim", name))
    }

    async fn create_persistent_volume_claim(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        self.record("create_persistent_volume_claim");
        let mut pvcs = self.pvcs.lock().unwrap();
        if pvcs.iter().any(|p| {
            p.metadata.namespace == pvc.metadata.namespace && p.metadata.name == pvc.metadata.name
        }) {
            return Err(Error::Kube(kube::Error::Api(kube::error::ErrorResponse {
                status: "Failure".into(),
                message: "persistentvolumeclaims already exists".into(),
                reason: "AlreadyExists".into(),
                code: 409,
            })));
        }
        pvcs.push(pvc.clone());
        Ok(pvc.clone())
    }
}
