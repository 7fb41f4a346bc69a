//! Mutation Submitter
//!
//! Sends one create or patch request per call and hands back the resource
//! as stored by the API server. Errors are returned as-is; there is no retry
//! at this layer.

use crate::crd::StorageCluster;
use crate::domain::ports::{ClusterApiRef, PatchOperation, ResourceRef};
use crate::error::{Error, Result};
use tracing::{info, warn};

pub struct MutationSubmitter {
    api: ClusterApiRef,
}

impl MutationSubmitter {
    pub fn new(api: ClusterApiRef) -> Self {
        Self { api }
    }

    /// Patch an existing StorageCluster
    pub async fn patch(
        &self,
        target: &ResourceRef,
        ops: &[PatchOperation],
    ) -> Result<StorageCluster> {
        if ops.is_empty() {
            return Err(Error::Configuration(format!(
                "empty patch for {}",
                target
            )));
        }

        info!("Submitting {} patch op(s) to {}", ops.len(), target);
        self.api
            .patch_storage_cluster(&target.namespace, &target.name, ops)
            .await
            .map_err(|e| {
                warn!("Patch of {} failed: {}", target, e);
                e
            })
    }

    /// Create a new StorageCluster
    pub async fn create(&self, cluster: &StorageCluster) -> Result<StorageCluster> {
        info!(
            "Creating StorageCluster {}/{}",
            cluster.namespace_or_default(),
            cluster.name()
        );
        self.api.create_storage_cluster(cluster).await.map_err(|e| {
            warn!("Create of StorageCluster {} failed: {}", cluster.name(), e);
            e
        })
    }
}
