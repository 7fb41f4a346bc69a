//! Kubernetes API Adapter
//!
//! Implements the `ClusterApi` port on top of `kube::Api`. Each port method is
//! one request; a 404 becomes `Error::ResourceNotFound`, everything else is
//! surfaced as `Error::Kube` without retry.

use crate::crd::{
    CephCluster, LocalVolumeDiscovery, LocalVolumeDiscoveryResult, LocalVolumeSet, StorageCluster,
};
use crate::domain::ports::{ClusterApi, PatchOperation};
use crate::error::{Error, Result};
use async_trait::async_trait;
use k8s_openapi::api::core::v1::{Node, PersistentVolume, PersistentVolumeClaim, Pod};
use k8s_openapi::api::storage::v1::StorageClass;
use kube::api::{Api, ListParams, Patch, PatchParams, PostParams};
use kube::Client;
use tracing::debug;

fn json_patch_body(ops: &[PatchOperation]) -> Patch<()> {
    Patch::Json(json_patch::Patch(ops.to_vec()))
}

/// Map a kube error, turning 404 into `ResourceNotFound`
fn map_kube_error(kind: &str, name: &str, err: kube::Error) -> Error {
    match err {
        kube::Error::Api(resp) if resp.code == 404 => Error::ResourceNotFound {
            kind: kind.to_string(),
            name: name.to_string(),
        },
        other => Error::Kube(other),
    }
}

fn list_params(label_selector: Option<&str>) -> ListParams {
    match label_selector {
        Some(selector) => ListParams::default().labels(selector),
        None => ListParams::default(),
    }
}

/// `ClusterApi` backed by a live Kubernetes client
#[derive(Clone)]
pub struct KubeClusterApi {
    client: Client,
}

impl KubeClusterApi {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Connect using the ambient kubeconfig or in-cluster service account
    pub async fn connect() -> Result<Self> {
        let client = Client::try_default().await?;
        Ok(Self::new(client))
    }
}

#[async_trait]
impl ClusterApi for KubeClusterApi {
    async fn get_storage_cluster(&self, namespace: &str, name: &str) -> Result<StorageCluster> {
        let api: Api<StorageCluster> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_kube_error("StorageCluster", name, e))
    }

    async fn list_storage_clusters(&self, namespace: &str) -> Result<Vec<StorageCluster>> {
        let api: Api<StorageCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn create_storage_cluster(&self, cluster: &StorageCluster) -> Result<StorageCluster> {
        let namespace = cluster.namespace_or_default();
        debug!("Creating StorageCluster {}/{}", namespace, cluster.name());
        let api: Api<StorageCluster> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), cluster)
            .await
            .map_err(|e| map_kube_error("StorageCluster", cluster.name(), e))
    }

    async fn patch_storage_cluster(
        &self,
        namespace: &str,
        name: &str,
        ops: &[PatchOperation],
    ) -> Result<StorageCluster> {
        debug!("Patching StorageCluster {}/{} ({} ops)", namespace, name, ops.len());
        let api: Api<StorageCluster> = Api::namespaced(self.client.clone(), namespace);
        api.patch(name, &PatchParams::default(), &json_patch_body(ops))
            .await
            .map_err(|e| map_kube_error("StorageCluster", name, e))
    }

    async fn list_pods(&self, namespace: &str, label_selector: Option<&str>) -> Result<Vec<Pod>> {
        let api: Api<Pod> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&list_params(label_selector)).await?.items)
    }

    async fn list_nodes(&self, label_selector: Option<&str>) -> Result<Vec<Node>> {
        let api: Api<Node> = Api::all(self.client.clone());
        Ok(api.list(&list_params(label_selector)).await?.items)
    }

    async fn patch_node(&self, name: &str, ops: &[PatchOperation]) -> Result<Node> {
        debug!("Patching node {} ({} ops)", name, ops.len());
        let api: Api<Node> = Api::all(self.client.clone());
        api.patch(name, &PatchParams::default(), &json_patch_body(ops))
            .await
            .map_err(|e| map_kube_error("Node", name, e))
    }

    async fn list_storage_classes(&self) -> Result<Vec<StorageClass>> {
        let api: Api<StorageClass> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_persistent_volumes(&self) -> Result<Vec<PersistentVolume>> {
        let api: Api<PersistentVolume> = Api::all(self.client.clone());
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn list_ceph_clusters(&self, namespace: &str) -> Result<Vec<CephCluster>> {
        let api: Api<CephCluster> = Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&ListParams::default()).await?.items)
    }

    async fn create_local_volume_set(&self, set: &LocalVolumeSet) -> Result<LocalVolumeSet> {
        let namespace = set.metadata.namespace.as_deref().unwrap_or("default");
        let name = set.metadata.name.as_deref().unwrap_or_default();
        let api: Api<LocalVolumeSet> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), set)
            .await
            .map_err(|e| map_kube_error("LocalVolumeSet", name, e))
    }

    async fn create_local_volume_discovery(
        &self,
        discovery: &LocalVolumeDiscovery,
    ) -> Result<LocalVolumeDiscovery> {
        let namespace = discovery.metadata.namespace.as_deref().unwrap_or("default");
        let name = discovery.metadata.name.as_deref().unwrap_or_default();
        let api: Api<LocalVolumeDiscovery> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), discovery)
            .await
            .map_err(|e| map_kube_error("LocalVolumeDiscovery", name, e))
    }

    async fn list_local_volume_discovery_results(
        &self,
        namespace: &str,
        label_selector: Option<&str>,
    ) -> Result<Vec<LocalVolumeDiscoveryResult>> {
        let api: Api<LocalVolumeDiscoveryResult> =
            Api::namespaced(self.client.clone(), namespace);
        Ok(api.list(&list_params(label_selector)).await?.items)
    }

    async fn get_persistent_volume_claim(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<PersistentVolumeClaim> {
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.get(name)
            .await
            .map_err(|e| map_kube_error("PersistentVolumeClaim", name, e))
    }

    async fn create_persistent_volume_claim(
        &self,
        pvc: &PersistentVolumeClaim,
    ) -> Result<PersistentVolumeClaim> {
        let namespace = pvc.metadata.namespace.as_deref().unwrap_or("default");
        let name = pvc.metadata.name.as_deref().unwrap_or_default();
        debug!("Creating PersistentVolumeClaim {}/{}", namespace, name);
        let api: Api<PersistentVolumeClaim> = Api::namespaced(self.client.clone(), namespace);
        api.create(&PostParams::default(), pvc)
            .await
            .map_err(|e| map_kube_error("PersistentVolumeClaim", name, e))
    }
}
