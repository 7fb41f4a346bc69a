//! CephCluster CRD (read-only)
//!
//! Only the overall Ceph health reported by Rook is modelled.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// CephCluster as managed by Rook. The spec is opaque to this crate.
#[derive(CustomResource, Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[kube(
    group = "ceph.rook.io",
    version = "v1",
    kind = "CephCluster",
    plural = "cephclusters",
    status = "CephClusterStatus",
    namespaced
)]
pub struct CephClusterSpec {
    #[serde(flatten)]
    #[schemars(skip)]
    pub rest: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CephClusterStatus {
    #[serde(default)]
    pub ceph: Option<CephStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CephStatus {
    #[serde(default)]
    pub health: Option<CephHealth>,
}

/// Overall health string reported by `ceph status`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum CephHealth {
    #[serde(rename = "HEALTH_OK")]
    Ok,
    #[serde(rename = "HEALTH_WARN")]
    Warn,
    #[serde(rename = "HEALTH_ERR")]
    Err,
    #[serde(other)]
    Unknown,
}

impl std::fmt::Display for CephHealth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CephHealth::Ok => write!(f, "HEALTH_OK"),
            CephHealth::Warn => write!(f, "HEALTH_WARN"),
            CephHealth::Err => write!(f, "HEALTH_ERR"),
            CephHealth::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl CephCluster {
    pub fn health(&self) -> Option<CephHealth> {
        self.status
            .as_ref()
            .and_then(|s| s.ceph.as_ref())
            .and_then(|c| c.health)
    }
}
