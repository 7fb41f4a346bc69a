//! Capacity Request Builder
//!
//! Turns the current StorageCluster spec and the storage class picked by the
//! operator into a `CapacityChangeRequest`: one more replicated device group
//! on the first device set. Pure; nothing here talks to the cluster.

use crate::crd::StorageClusterSpec;
use crate::domain::ports::{add_op, replace_op, PatchOperation};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Index of the device set "add capacity" grows
pub const EXPANDED_DEVICE_SET: usize = 0;

/// A single pending capacity change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapacityChangeRequest {
    pub device_set_index: usize,
    pub previous_count: u32,
    pub new_count: u32,
    /// Set only when the chosen class differs from the configured one
    pub storage_class_name: Option<String>,
    /// Whether the template already carries a storage class field
    #[serde(skip)]
    storage_class_present: bool,
}

impl CapacityChangeRequest {
    /// Build the request for `spec`, optionally switching the storage class
    pub fn build(spec: &StorageClusterSpec, storage_class: Option<&str>) -> Result<Self> {
        let device_set = spec
            .storage_device_sets
            .get(EXPANDED_DEVICE_SET)
            .ok_or_else(|| Error::Configuration("no device set to expand".into()))?;

        let new_count = device_set
            .count
            .checked_add(1)
            .ok_or_else(|| Error::Configuration("device set count overflow".into()))?;

        let current_class = device_set.storage_class();
        let storage_class_name = storage_class
            .filter(|sc| !sc.is_empty() && Some(*sc) != current_class)
            .map(str::to_string);

        Ok(Self {
            device_set_index: EXPANDED_DEVICE_SET,
            previous_count: device_set.count,
            new_count,
            storage_class_name,
            storage_class_present: current_class.is_some(),
        })
    }

    /// The spec that results from applying this request to `spec`
    pub fn apply_to(&self, spec: &StorageClusterSpec) -> Result<StorageClusterSpec> {
        let mut expanded = spec.clone();
        let device_set = expanded
            .storage_device_sets
            .get_mut(self.device_set_index)
            .ok_or_else(|| Error::Configuration("no device set to expand".into()))?;

        device_set.count = self.new_count;
        if let Some(sc) = &self.storage_class_name {
            device_set.data_pvc_template.spec.storage_class_name = Some(sc.clone());
        }
        Ok(expanded)
    }

    /// JSON Patch operations that perform this request server-side
    pub fn patch_ops(&self) -> Vec<PatchOperation> {
        let base = format!("/spec/storageDeviceSets/{}", self.device_set_index);
        let mut ops = vec![replace_op(format!("{}/count", base), json!(self.new_count))];

        if let Some(sc) = &self.storage_class_name {
            let path = format!("{}/dataPVCTemplate/spec/storageClassName", base);
            ops.push(if self.storage_class_present {
                replace_op(path, json!(sc))
            } else {
                add_op(path, json!(sc))
            });
        }
        ops
    }

    /// Device groups added by this request
    pub fn delta(&self) -> u32 {
        self.new_count - self.previous_count
    }
}

/// Convenience: the expanded spec in one call
pub fn expand_spec(
    spec: &StorageClusterSpec,
    storage_class: Option<&str>,
) -> Result<StorageClusterSpec> {
    CapacityChangeRequest::build(spec, storage_class)?.apply_to(spec)
}
