//! Custom Resource Definitions consumed by the capacity manager
//!
//! This module contains all CRD types:
//! - StorageCluster: desired device sets and reconciliation phase
//! - CephCluster: Ceph health as reported by Rook
//! - LocalVolumeSet / LocalVolumeDiscovery: local disk provisioning

pub mod ceph_cluster;
pub mod local_volume;
pub mod storage_cluster;

pub use ceph_cluster::*;
pub use local_volume::*;
pub use storage_cluster::*;
