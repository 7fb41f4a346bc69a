//! Install workflow
//!
//! Label (and optionally taint) the chosen nodes, then create the
//! StorageCluster. Node preparation happens first so the operator finds
//! labelled nodes on its first reconcile.

use super::request::{
    discovery_request, local_volume_set_request, storage_cluster_request, LocalVolumeSetForm,
};
use crate::crd::{LocalVolumeDiscovery, LocalVolumeSet, StorageCluster};
use crate::domain::ports::ClusterApiRef;
use crate::error::Result;
use crate::expansion::MutationSubmitter;
use crate::metrics::WorkflowMetrics;
use crate::nodes::{NodeSelectionOptions, NodeSelectionService};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallRequest {
    pub nodes: Vec<String>,
    pub storage_class: String,
    pub storage_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallOutcome {
    pub nodes: Vec<String>,
    pub storage_cluster: StorageCluster,
}

/// Resources created for a local volume set
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalStorageOutcome {
    pub discovery: LocalVolumeDiscovery,
    pub local_volume_set: LocalVolumeSet,
}

pub struct InstallWorkflow {
    api: ClusterApiRef,
    nodes: NodeSelectionService,
    submitter: MutationSubmitter,
    metrics: Option<Arc<WorkflowMetrics>>,
}

impl InstallWorkflow {
    pub fn new(api: ClusterApiRef, options: NodeSelectionOptions) -> Self {
        Self {
            nodes: NodeSelectionService::new(api.clone(), options),
            submitter: MutationSubmitter::new(api.clone()),
            api,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<WorkflowMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub async fn run(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        let result = self.execute(request).await;
        if let Some(m) = &self.metrics {
            m.install_finished(result.is_ok());
        }
        result
    }

    async fn execute(&self, request: &InstallRequest) -> Result<InstallOutcome> {
        // Validate the payload before touching any node
        let cluster = storage_cluster_request(&request.storage_class, &request.storage_size)?;

        let selected = self.nodes.select_and_apply(&request.nodes).await?;
        let names: Vec<String> = selected
            .iter()
            .filter_map(|n| n.metadata.name.clone())
            .collect();
        info!("Storage nodes prepared: {}", names.join(", "));

        let created = self.submitter.create(&cluster).await?;
        info!(
            "StorageCluster {}/{} created with storage class {}",
            created.namespace_or_default(),
            created.name(),
            request.storage_class
        );

        Ok(InstallOutcome {
            nodes: names,
            storage_cluster: created,
        })
    }

    /// Enable disk discovery on the form's nodes and create the volume set
    pub async fn create_local_storage(
        &self,
        form: &LocalVolumeSetForm,
    ) -> Result<LocalStorageOutcome> {
        let set = local_volume_set_request(form)?;
        let discovery = self
            .api
            .create_local_volume_discovery(&discovery_request(&form.node_names))
            .await?;
        let local_volume_set = self.api.create_local_volume_set(&set).await?;
        info!(
            "LocalVolumeSet {} created on {} node(s)",
            form.volume_set_name,
            form.node_names.len()
        );
        Ok(LocalStorageOutcome {
            discovery,
            local_volume_set,
        })
    }
}
