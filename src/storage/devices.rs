//! Local devices found by discovery, and the nodes local PVs live on

use super::capacity::{humanize_binary_bytes, parse_quantity};
use crate::crd::{
    DeviceSize, DiscoveredDevice, LocalVolumeDiscoveryResult, DEVICE_DISCOVERY_NODE_LABEL,
    HOSTNAME_LABEL, LOCAL_STORAGE_NAMESPACE,
};
use crate::domain::ports::ClusterApiRef;
use crate::error::{Error, Result};
use k8s_openapi::api::core::v1::PersistentVolume;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Distinct hostnames carried by `pvs`, sorted
pub fn associated_nodes(pvs: &[PersistentVolume]) -> Vec<String> {
    pvs.iter()
        .filter_map(|pv| pv.metadata.labels.as_ref()?.get(HOSTNAME_LABEL))
        .filter(|host| !host.is_empty())
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

pub fn device_bytes(device: &DiscoveredDevice) -> Result<u64> {
    match &device.size {
        DeviceSize::Bytes(bytes) => Ok(*bytes),
        DeviceSize::Quantity(q) => parse_quantity(q),
    }
}

/// Sum of the sizes of the available devices across all results
pub fn total_device_capacity(results: &[LocalVolumeDiscoveryResult]) -> Result<u64> {
    results
        .iter()
        .flat_map(|r| r.devices())
        .filter(|d| d.is_available())
        .try_fold(0u64, |total, device| {
            total
                .checked_add(device_bytes(device)?)
                .ok_or_else(|| Error::CapacityParse("device capacity overflow".into()))
        })
}

/// Discovered disks per node and their claimable total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapacityView {
    pub nodes: BTreeMap<String, Vec<DiscoveredDevice>>,
    pub total_bytes: u64,
    pub total_capacity: String,
}

impl DeviceCapacityView {
    pub fn build(results: &[LocalVolumeDiscoveryResult]) -> Result<Self> {
        let total_bytes = total_device_capacity(results)?;
        let mut nodes: BTreeMap<String, Vec<DiscoveredDevice>> = BTreeMap::new();
        for result in results {
            nodes
                .entry(result.spec.node_name.clone())
                .or_default()
                .extend(result.devices().iter().cloned());
        }
        Ok(Self {
            nodes,
            total_bytes,
            total_capacity: humanize_binary_bytes(total_bytes as f64),
        })
    }
}

pub struct DeviceDiscoveryService {
    api: ClusterApiRef,
}

impl DeviceDiscoveryService {
    pub fn new(api: ClusterApiRef) -> Self {
        Self { api }
    }

    /// One list per node, selected by the discovery node label
    pub async fn discovered(&self, node_names: &[String]) -> Result<DeviceCapacityView> {
        let mut results = Vec::new();
        for name in node_names {
            let selector = format!("{}={}", DEVICE_DISCOVERY_NODE_LABEL, name);
            let found = self
                .api
                .list_local_volume_discovery_results(LOCAL_STORAGE_NAMESPACE, Some(&selector))
                .await?;
            debug!("{} discovery result(s) for node {}", found.len(), name);
            // One result per node is expected; extra ones would double count
            results.extend(found.into_iter().take(1));
        }

        let view = DeviceCapacityView::build(&results)?;
        info!(
            "{} available on {} node(s)",
            view.total_capacity,
            view.nodes.len()
        );
        Ok(view)
    }

    /// Hostnames of the nodes local PVs were created on
    pub async fn associated_nodes(&self) -> Result<Vec<String>> {
        let pvs = self.api.list_persistent_volumes().await?;
        Ok(associated_nodes(&pvs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::capacity::GIB;
    use crate::testing::{self, FakeCluster};
    use assert_matches::assert_matches;
    use std::sync::Arc;

    #[test]
    fn test_associated_nodes_are_distinct() {
        let mut unlabelled = testing::persistent_volume("pv-x", "localblock", "1Ti", "Bound");
        unlabelled.metadata.labels = None;
        let pvs = vec![
            testing::local_persistent_volume("pv-a", "localblock", "1Ti", "worker-1"),
            testing::local_persistent_volume("pv-b", "localblock", "1Ti", "worker-0"),
            testing::local_persistent_volume("pv-c", "localblock", "1Ti", "worker-1"),
            unlabelled,
        ];
        assert_eq!(associated_nodes(&pvs), vec!["worker-0", "worker-1"]);
        assert!(associated_nodes(&[]).is_empty());
    }

    #[test]
    fn test_total_counts_only_available_devices() {
        let results = vec![
            testing::discovery_result(
                "worker-0",
                &[
                    ("/dev/sdb", DeviceSize::Bytes(100 * GIB), "Available"),
                    ("/dev/sdc", DeviceSize::Bytes(500 * GIB), "NotAvailable"),
                ],
            ),
            testing::discovery_result(
                "worker-1",
                &[("/dev/sdb", DeviceSize::Quantity("28Gi".into()), "Available")],
            ),
        ];
        assert_eq!(total_device_capacity(&results).unwrap(), 128 * GIB);

        let view = DeviceCapacityView::build(&results).unwrap();
        assert_eq!(view.total_capacity, "128 GiB");
        assert_eq!(view.nodes["worker-0"].len(), 2);
    }

    #[test]
    fn test_unparsable_available_device_is_error() {
        let results = vec![testing::discovery_result(
            "worker-0",
            &[("/dev/sdb", DeviceSize::Quantity("big".into()), "Available")],
        )];
        assert_matches!(total_device_capacity(&results), Err(Error::CapacityParse(_)));

        // Unavailable devices are never parsed
        let results = vec![testing::discovery_result(
            "worker-0",
            &[("/dev/sdb", DeviceSize::Quantity("big".into()), "NotAvailable")],
        )];
        assert_eq!(total_device_capacity(&results).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_discovered_selects_each_node() {
        let fake = Arc::new(FakeCluster::new().with_discovery_results(vec![
            testing::discovery_result(
                "worker-0",
                &[("/dev/sdb", DeviceSize::Bytes(GIB), "Available")],
            ),
            testing::discovery_result(
                "worker-1",
                &[("/dev/sdb", DeviceSize::Bytes(2 * GIB), "Available")],
            ),
            testing::discovery_result(
                "worker-2",
                &[("/dev/sdb", DeviceSize::Bytes(4 * GIB), "Available")],
            ),
        ]));
        let view = DeviceDiscoveryService::new(fake.clone())
            .discovered(&["worker-0".into(), "worker-2".into()])
            .await
            .unwrap();

        assert_eq!(view.total_bytes, 5 * GIB);
        assert_eq!(
            view.nodes.keys().collect::<Vec<_>>(),
            vec!["worker-0", "worker-2"]
        );
        assert_eq!(fake.call_count("list_local_volume_discovery_results"), 2);
    }

    #[tokio::test]
    async fn test_associated_nodes_from_cluster() {
        let fake = Arc::new(FakeCluster::new().with_persistent_volumes(vec![
            testing::local_persistent_volume("pv-a", "localblock", "1Ti", "worker-2"),
        ]));
        let nodes = DeviceDiscoveryService::new(fake).associated_nodes().await.unwrap();
        assert_eq!(nodes, vec!["worker-2"]);
    }
}
