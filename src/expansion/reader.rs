//! Resource Snapshot Reader

use crate::crd::StorageCluster;
use crate::domain::ports::{ClusterApiRef, ResourceRef};
use crate::domain::snapshot::ExpansionSnapshot;
use crate::error::Result;
use tracing::{debug, warn};

/// Reads the cluster state one expansion is judged against
pub struct SnapshotReader {
    api: ClusterApiRef,
}

impl SnapshotReader {
    pub fn new(api: ClusterApiRef) -> Self {
        Self { api }
    }

    /// Capture the StorageCluster, the pods in its namespace, all nodes and
    /// the Ceph health, in that order
    ///
    /// A failure to read Ceph health is not fatal; the snapshot just has no
    /// health.
    pub async fn capture(&self, target: &ResourceRef, label: &str) -> Result<ExpansionSnapshot> {
        self.read(target, label).await.map(|(_, snapshot)| snapshot)
    }

    /// Like [`capture`](Self::capture), also handing back the StorageCluster read
    pub async fn read(
        &self,
        target: &ResourceRef,
        label: &str,
    ) -> Result<(StorageCluster, ExpansionSnapshot)> {
        let cluster = self
            .api
            .get_storage_cluster(&target.namespace, &target.name)
            .await?;
        let pods = self.api.list_pods(&target.namespace, None).await?;
        let nodes = self.api.list_nodes(None).await?;

        let ceph_health = match self.api.list_ceph_clusters(&target.namespace).await {
            Ok(clusters) => clusters.first().and_then(|c| c.health()),
            Err(e) => {
                warn!("Could not read Ceph health in {}: {}", target.namespace, e);
                None
            }
        };

        let snapshot =
            ExpansionSnapshot::from_resources(label, &cluster, &pods, &nodes, ceph_health);
        debug!(
            "Captured '{}' snapshot of {}: count={}, {} pods, {} nodes",
            label,
            target,
            snapshot.device_set_count,
            snapshot.pods.pods.len(),
            snapshot.nodes.len()
        );
        Ok((cluster, snapshot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crd::CephHealth;
    use crate::testing::{self, FakeCluster, CLUSTER, NS};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_capture_reads_in_order() {
        let fake = Arc::new(
            FakeCluster::new()
                .with_storage_cluster(testing::storage_cluster(2, Some("gp2")))
                .with_pods(testing::daemon_pods(6))
                .with_nodes(vec![testing::node("a", true), testing::node("b", false)])
                .with_ceph_cluster(testing::ceph_cluster(CephHealth::Warn)),
        );

        let snapshot = SnapshotReader::new(fake.clone())
            .capture(&ResourceRef::storage_cluster(NS, CLUSTER), "before")
            .await
            .unwrap();

        assert_eq!(
            fake.calls(),
            vec![
                "get_storage_cluster",
                "list_pods",
                "list_nodes",
                "list_ceph_clusters"
            ]
        );
        assert_eq!(snapshot.device_set_count, 2);
        assert_eq!(snapshot.replica, 3);
        assert_eq!(snapshot.storage_class.as_deref(), Some("gp2"));
        assert_eq!(snapshot.pods.label, "before");
        assert_eq!(snapshot.pods.pods.len(), 6);
        assert_eq!(snapshot.nodes.len(), 2);
        assert_eq!(snapshot.ceph_health, Some(CephHealth::Warn));
    }

    #[tokio::test]
    async fn test_capture_without_ceph_cluster() {
        let fake = Arc::new(
            FakeCluster::new().with_storage_cluster(testing::storage_cluster(1, None)),
        );
        let snapshot = SnapshotReader::new(fake)
            .capture(&ResourceRef::storage_cluster(NS, CLUSTER), "after")
            .await
            .unwrap();
        assert_eq!(snapshot.ceph_health, None);
        assert!(snapshot.pods.pods.is_empty());
    }
}
