//! Prometheus queries used by the capacity views and dashboards

/// Raw bytes used across all OSDs, before dividing by the replica factor
pub const CEPH_CAPACITY_USED: &str = "ceph_cluster_total_used_raw_bytes";

/// Raw bytes available across all OSDs
pub const CEPH_CAPACITY_TOTAL: &str = "ceph_cluster_total_bytes";

/// 0 = HEALTH_OK, 1 = HEALTH_WARN, 2 = HEALTH_ERR
pub const CEPH_HEALTH_STATUS: &str = "ceph_health_status";

/// Number of OSDs that are up
pub const CEPH_OSDS_UP: &str = "sum(ceph_osd_up)";
