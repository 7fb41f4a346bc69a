//! Storage classes offered for expansion, and local PV capacity

use super::capacity::{humanize_binary_bytes, parse_quantity, NOT_AVAILABLE};
use crate::domain::ports::ClusterApiRef;
use crate::error::Result;
use k8s_openapi::api::core::v1::PersistentVolume;
use k8s_openapi::api::storage::v1::StorageClass;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Provisioners that belong to the storage cluster itself; matched as substrings
/// so the namespaced CSI drivers (`openshift-storage.rbd.csi.ceph.com`) match too
pub const CEPH_PROVISIONERS: [&str; 3] =
    ["ceph.rook.io/block", "cephfs.csi.ceph.com", "rbd.csi.ceph.com"];

/// Provisioner of statically provisioned local volumes
pub const NO_PROVISIONER: &str = "kubernetes.io/no-provisioner";

const DEFAULT_CLASS_ANNOTATION: &str = "storageclass.kubernetes.io/is-default-class";

const PV_AVAILABLE: &str = "Available";

pub fn is_ceph_provisioned(sc: &StorageClass) -> bool {
    CEPH_PROVISIONERS
        .iter()
        .any(|p| sc.provisioner.contains(p))
}

pub fn is_no_provisioner(sc: &StorageClass) -> bool {
    sc.provisioner == NO_PROVISIONER
}

fn is_default_class(sc: &StorageClass) -> bool {
    sc.metadata
        .annotations
        .as_ref()
        .and_then(|a| a.get(DEFAULT_CLASS_ANNOTATION))
        .map(|v| v == "true")
        .unwrap_or(false)
}

/// PVs of `class` that are not yet bound
pub fn available_pvs<'a>(pvs: &'a [PersistentVolume], class: &str) -> Vec<&'a PersistentVolume> {
    pvs.iter()
        .filter(|pv| {
            pv.spec
                .as_ref()
                .and_then(|s| s.storage_class_name.as_deref())
                == Some(class)
                && pv.status.as_ref().and_then(|s| s.phase.as_deref()) == Some(PV_AVAILABLE)
        })
        .collect()
}

/// Total `storage` capacity of `pvs` in bytes
pub fn pvs_capacity(pvs: &[&PersistentVolume]) -> Result<u64> {
    pvs.iter()
        .filter_map(|pv| {
            pv.spec
                .as_ref()
                .and_then(|s| s.capacity.as_ref())
                .and_then(|c| c.get("storage"))
        })
        .map(|q| parse_quantity(&q.0))
        .sum()
}

/// One entry of the storage class dropdown
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageClassOption {
    pub name: String,
    pub provisioner: String,
    pub default: bool,
    /// Backed by pre-created local PVs
    pub local: bool,
    /// For local classes: free PV capacity, e.g. `300 GiB`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_capacity: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_pvs: Option<usize>,
}

/// Dropdown entries for `classes`, excluding the storage cluster's own classes
///
/// A local class whose PV capacities cannot be parsed is still offered, with
/// its capacity shown as [`NOT_AVAILABLE`].
pub fn expansion_options(
    classes: &[StorageClass],
    pvs: &[PersistentVolume],
) -> Vec<StorageClassOption> {
    classes
        .iter()
        .filter(|sc| !is_ceph_provisioned(sc))
        .map(|sc| {
            let name = sc.metadata.name.clone().unwrap_or_default();
            let local = is_no_provisioner(sc);
            let (available_capacity, free_count) = if local {
                let free = available_pvs(pvs, &name);
                let capacity = match pvs_capacity(&free) {
                    Ok(bytes) => humanize_binary_bytes(bytes as f64),
                    Err(e) => {
                        warn!("Capacity of storage class {} unavailable: {}", name, e);
                        NOT_AVAILABLE.to_string()
                    }
                };
                (Some(capacity), Some(free.len()))
            } else {
                (None, None)
            };

            StorageClassOption {
                provisioner: sc.provisioner.clone(),
                default: is_default_class(sc),
                local,
                available_capacity,
                available_pvs: free_count,
                name,
            }
        })
        .collect()
}

pub struct StorageClassSelector {
    api: ClusterApiRef,
}

impl StorageClassSelector {
    pub fn new(api: ClusterApiRef) -> Self {
        Self { api }
    }

    /// Storage classes eligible for expansion; PVs are only listed when a
    /// local class is among them
    pub async fn list(&self) -> Result<Vec<StorageClassOption>> {
        let classes = self.api.list_storage_classes().await?;
        let pvs = if classes.iter().any(is_no_provisioner) {
            self.api.list_persistent_volumes().await?
        } else {
            Vec::new()
        };
        let options = expansion_options(&classes, &pvs);
        debug!(
            "{} of {} storage class(es) eligible for expansion",
            options.len(),
            classes.len()
        );
        Ok(options)
    }
}
