//! Install payloads
//!
//! Manifests created when the storage cluster is first set up: the
//! StorageCluster itself and, for clusters on local disks, the
//! LocalVolumeSet and LocalVolumeDiscovery resources.

use crate::crd::{
    DataPvcTemplate, DeviceInclusionSpec, DeviceMechanicalProperty, DeviceType,
    LocalVolumeDiscovery, LocalVolumeDiscoverySpec, LocalVolumeSet, LocalVolumeSetSpec,
    NodeSelector, PvcResources, PvcTemplateSpec, StorageCluster, StorageClusterSpec,
    StorageDeviceSet, VolumeMode, DEFAULT_REPLICA, DISCOVERY_CR_NAME, LOCAL_STORAGE_NAMESPACE,
};
use crate::error::{Error, Result};
use crate::storage::parse_quantity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const STORAGE_CLUSTER_NAME: &str = "ocs-storagecluster";
pub const STORAGE_NAMESPACE: &str = "openshift-storage";
pub const DEVICE_SET_NAME: &str = "ocs-deviceset";

/// `maxSize` value meaning "no upper bound"
pub const MAX_SIZE_ALL: &str = "All";

// =============================================================================
// StorageCluster
// =============================================================================

/// The initial StorageCluster: one device set of one replicated group
pub fn storage_cluster_request(storage_class: &str, storage_size: &str) -> Result<StorageCluster> {
    if storage_class.is_empty() {
        return Err(Error::Configuration("a storage class is required".into()));
    }
    parse_quantity(storage_size)?;

    let mut requests = BTreeMap::new();
    requests.insert("storage".to_string(), storage_size.to_string());

    let mut cluster = StorageCluster::new(
        STORAGE_CLUSTER_NAME,
        StorageClusterSpec {
            manage_nodes: false,
            storage_device_sets: vec![StorageDeviceSet {
                name: DEVICE_SET_NAME.to_string(),
                count: 1,
                replica: DEFAULT_REPLICA,
                data_pvc_template: DataPvcTemplate {
                    spec: PvcTemplateSpec {
                        storage_class_name: Some(storage_class.to_string()),
                        access_modes: vec!["ReadWriteOnce".to_string()],
                        volume_mode: Some("Block".to_string()),
                        resources: PvcResources { requests },
                    },
                },
                portable: true,
                resources: Default::default(),
                placement: Default::default(),
            }],
        },
    );
    cluster.metadata.namespace = Some(STORAGE_NAMESPACE.to_string());
    Ok(cluster)
}

// =============================================================================
// LocalVolumeSet
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiskType {
    #[default]
    Ssd,
    Hdd,
}

/// Input of the "create local volume set" form
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalVolumeSetForm {
    pub volume_set_name: String,
    /// Defaults to the volume set name
    #[serde(default)]
    pub storage_class_name: Option<String>,
    #[serde(default)]
    pub disk_type: DiskType,
    #[serde(default)]
    pub disk_mode: VolumeMode,
    #[serde(default)]
    pub max_disk_limit: Option<u32>,
    pub node_names: Vec<String>,
    #[serde(default)]
    pub min_disk_size: Option<String>,
    /// `All` or absent means unbounded
    #[serde(default)]
    pub max_disk_size: Option<String>,
}

pub fn local_volume_set_request(form: &LocalVolumeSetForm) -> Result<LocalVolumeSet> {
    if form.volume_set_name.is_empty() {
        return Err(Error::Configuration("volume set name is required".into()));
    }
    if form.node_names.is_empty() {
        return Err(Error::Configuration(
            "at least one node is required for a volume set".into(),
        ));
    }

    let storage_class_name = form
        .storage_class_name
        .clone()
        .filter(|sc| !sc.is_empty())
        .unwrap_or_else(|| form.volume_set_name.clone());

    let mechanical = match form.disk_type {
        DiskType::Hdd => DeviceMechanicalProperty::Rotational,
        DiskType::Ssd => DeviceMechanicalProperty::NonRotational,
    };

    let min_size = form
        .min_disk_size
        .clone()
        .filter(|s| !s.is_empty() && s != "0");
    let max_size = form
        .max_disk_size
        .clone()
        .filter(|s| !s.is_empty() && s != MAX_SIZE_ALL);
    for size in min_size.iter().chain(max_size.iter()) {
        parse_quantity(size)?;
    }

    let mut set = LocalVolumeSet::new(
        &form.volume_set_name,
        LocalVolumeSetSpec {
            storage_class_name,
            volume_mode: form.disk_mode,
            device_inclusion_spec: DeviceInclusionSpec {
                device_types: vec![DeviceType::Disk],
                device_mechanical_properties: vec![mechanical],
                min_size,
                max_size,
            },
            node_selector: Some(NodeSelector::for_hostnames(&form.node_names)),
            max_device_count: form.max_disk_limit,
        },
    );
    set.metadata.namespace = Some(LOCAL_STORAGE_NAMESPACE.to_string());
    Ok(set)
}

// =============================================================================
// LocalVolumeDiscovery
// =============================================================================

/// Enable disk discovery on `node_names`
pub fn discovery_request(node_names: &[String]) -> LocalVolumeDiscovery {
    let mut discovery = LocalVolumeDiscovery::new(
        DISCOVERY_CR_NAME,
        LocalVolumeDiscoverySpec {
            node_selector: Some(NodeSelector::for_hostnames(node_names)),
        },
    );
    discovery.metadata.namespace = Some(LOCAL_STORAGE_NAMESPACE.to_string());
    discovery
}
