//! PersistentVolumeClaim cloning
//!
//! A clone is a new claim in the source's namespace whose `dataSource` points
//! at the source claim; class, access modes and requested size are copied.

use super::capacity::{humanize_binary_bytes, parse_quantity};
use crate::domain::ports::{ClusterApiRef, MetricsSourceRef};
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::{
    PersistentVolumeClaim, PersistentVolumeClaimSpec, TypedLocalObjectReference,
    VolumeResourceRequirements,
};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
use kube::api::ObjectMeta;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Shown when the used-capacity query has no sample
pub const NO_DATA: &str = "No Data";

const PVC_KIND: &str = "PersistentVolumeClaim";

/// Bytes used on the volume bound to claim `name`
pub fn pvc_used_capacity_query(name: &str) -> String {
    format!(
        "kubelet_volume_stats_used_bytes{{persistentvolumeclaim='{}'}}",
        name
    )
}

/// Name suggested for a clone of `name`
pub fn default_clone_name(name: &str) -> String {
    format!("{}-clone", name)
}

/// Display label of an access mode
pub fn access_mode_label(mode: &str) -> &str {
    match mode {
        "ReadWriteOnce" => "Single User (RWO)",
        "ReadWriteMany" => "Shared Access (RWX)",
        "ReadOnlyMany" => "Read Only (ROX)",
        other => other,
    }
}

fn requested_storage(pvc: &PersistentVolumeClaim) -> Option<&str> {
    pvc.spec
        .as_ref()?
        .resources
        .as_ref()?
        .requests
        .as_ref()?
        .get("storage")
        .map(|q| q.0.as_str())
}

/// Clone request for `source`; `name` defaults to `<source>-clone`
pub fn pvc_clone_request(
    source: &PersistentVolumeClaim,
    name: Option<&str>,
) -> Result<PersistentVolumeClaim> {
    let source_name = source
        .metadata
        .name
        .as_deref()
        .ok_or_else(|| Error::Configuration("source claim has no name".into()))?;
    let spec = source
        .spec
        .as_ref()
        .ok_or_else(|| Error::Configuration(format!("claim {} has no spec", source_name)))?;
    let storage = requested_storage(source).ok_or_else(|| {
        Error::Configuration(format!("claim {} requests no storage", source_name))
    })?;

    let clone_name = name
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default_clone_name(source_name));
    if clone_name == source_name {
        return Err(Error::Configuration(
            "clone name must differ from the source claim".into(),
        ));
    }

    Ok(PersistentVolumeClaim {
        metadata: ObjectMeta {
            name: Some(clone_name),
            namespace: source.metadata.namespace.clone(),
            ..Default::default()
        },
        spec: Some(PersistentVolumeClaimSpec {
            storage_class_name: spec.storage_class_name.clone(),
            data_source: Some(TypedLocalObjectReference {
                api_group: Some(String::new()),
                kind: PVC_KIND.to_string(),
                name: source_name.to_string(),
            }),
            access_modes: spec.access_modes.clone(),
            resources: Some(VolumeResourceRequirements {
                requests: Some(BTreeMap::from([(
                    "storage".to_string(),
                    Quantity(storage.to_string()),
                )])),
                ..Default::default()
            }),
            ..Default::default()
        }),
        status: None,
    })
}

/// What the clone dialog shows about the source claim
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PvcCloneView {
    pub name: String,
    pub namespace: String,
    pub clone_name: String,
    pub storage_class: Option<String>,
    pub requested_capacity: Option<String>,
    /// Humanized bytes used, or "No Data"
    pub used_capacity: String,
    pub access_modes: Vec<String>,
    pub volume_mode: Option<String>,
}

impl PvcCloneView {
    pub fn build(pvc: &PersistentVolumeClaim, used_bytes: Option<f64>) -> Self {
        let name = pvc.metadata.name.clone().unwrap_or_default();
        let spec = pvc.spec.as_ref();
        let requested_capacity = requested_storage(pvc).map(|q| match parse_quantity(q) {
            Ok(bytes) => humanize_binary_bytes(bytes as f64),
            Err(_) => q.to_string(),
        });

        Self {
            clone_name: default_clone_name(&name),
            namespace: pvc.metadata.namespace.clone().unwrap_or_default(),
            storage_class: spec.and_then(|s| s.storage_class_name.clone()),
            requested_capacity,
            used_capacity: used_bytes.map_or_else(|| NO_DATA.to_string(), humanize_binary_bytes),
            access_modes: spec
                .and_then(|s| s.access_modes.as_ref())
                .map(|modes| modes.iter().map(|m| access_mode_label(m).to_string()).collect())
                .unwrap_or_default(),
            volume_mode: spec.and_then(|s| s.volume_mode.clone()),
            name,
        }
    }
}

pub struct PvcCloneService {
    api: ClusterApiRef,
    metrics: MetricsSourceRef,
}

impl PvcCloneService {
    pub fn new(api: ClusterApiRef, metrics: MetricsSourceRef) -> Self {
        Self { api, metrics }
    }

    /// Used-capacity failures degrade to "No Data"
    pub async fn view(&self, namespace: &str, name: &str) -> Result<PvcCloneView> {
        let pvc = self.api.get_persistent_volume_claim(namespace, name).await?;
        let used = match self.metrics.query(&pvc_used_capacity_query(name)).await {
            Ok(samples) => samples.first().map(|s| s.value),
            Err(e) => {
                warn!("Used capacity query for claim {} failed: {}", name, e);
                None
            }
        };
        Ok(PvcCloneView::build(&pvc, used))
    }

    pub async fn clone_claim(
        &self,
        namespace: &str,
        name: &str,
        clone_name: Option<&str>,
    ) -> Result<PersistentVolumeClaim> {
        let source = self.api.get_persistent_volume_claim(namespace, name).await?;
        let request = pvc_clone_request(&source, clone_name)?;
        let created = self.api.create_persistent_volume_claim(&request).await?;
        info!(
            "Cloned claim {}/{} as {}",
            namespace,
            name,
            created.metadata.name.as_deref().unwrap_or_default()
        );
        Ok(created)
    }
}
