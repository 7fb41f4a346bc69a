//! Configuration
//!
//! Loaded from an optional YAML file; every field has a default, so an
//! empty file (or none) is a valid configuration. Command-line flags are
//! applied on top by the binary.

use crate::api::DEFAULT_API_ADDR;
use crate::error::{Error, Result};
use crate::expansion::{
    ExpansionConfig, DEFAULT_EXPANSION_TIMEOUT, DEFAULT_POLL_INTERVAL, DEFAULT_SETTLE_TIMEOUT,
};
use crate::install::{STORAGE_CLUSTER_NAME, STORAGE_NAMESPACE};
use crate::metrics::{DEFAULT_METRICS_INTERVAL, DEFAULT_PROMETHEUS_URL};
use crate::nodes::{NodeSelectionOptions, NodeTaint, DEFAULT_MIN_NODES};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    /// Namespace of the StorageCluster
    pub namespace: String,
    /// Name of the StorageCluster
    pub cluster_name: String,
    pub poll_interval_secs: u64,
    /// Time allowed for the phase to leave Ready after a patch
    pub settle_timeout_secs: u64,
    /// Time allowed for an expansion to reach Ready
    pub expansion_timeout_secs: u64,
    pub metrics_interval_secs: u64,
    pub prometheus_url: String,
    pub api_addr: String,
    pub min_nodes: usize,
    /// Taint storage nodes when labelling them
    pub taint_nodes: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            namespace: STORAGE_NAMESPACE.to_string(),
            cluster_name: STORAGE_CLUSTER_NAME.to_string(),
            poll_interval_secs: DEFAULT_POLL_INTERVAL.as_secs(),
            settle_timeout_secs: DEFAULT_SETTLE_TIMEOUT.as_secs(),
            expansion_timeout_secs: DEFAULT_EXPANSION_TIMEOUT.as_secs(),
            metrics_interval_secs: DEFAULT_METRICS_INTERVAL.as_secs(),
            prometheus_url: DEFAULT_PROMETHEUS_URL.to_string(),
            api_addr: DEFAULT_API_ADDR.to_string(),
            min_nodes: DEFAULT_MIN_NODES,
            taint_nodes: false,
        }
    }
}

impl Config {
    /// Read and validate a YAML config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&text)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let config: Config = if text.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(text)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.namespace.is_empty() || self.cluster_name.is_empty() {
            return Err(Error::Configuration(
                "namespace and clusterName must not be empty".into(),
            ));
        }
        if self.poll_interval_secs == 0 {
            return Err(Error::Configuration("pollIntervalSecs must be positive".into()));
        }
        if self.expansion_timeout_secs < self.poll_interval_secs {
            return Err(Error::Configuration(format!(
                "expansionTimeoutSecs ({}) is shorter than pollIntervalSecs ({})",
                self.expansion_timeout_secs, self.poll_interval_secs
            )));
        }
        if self.min_nodes == 0 {
            return Err(Error::Configuration("minNodes must be at least 1".into()));
        }
        self.socket_addr()?;
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.api_addr.parse().map_err(|e| {
            Error::Configuration(format!("Invalid API address {}: {}", self.api_addr, e))
        })
    }

    pub fn expansion(&self) -> ExpansionConfig {
        ExpansionConfig {
            poll_interval: Duration::from_secs(self.poll_interval_secs),
            settle_timeout: Duration::from_secs(self.settle_timeout_secs),
            expansion_timeout: Duration::from_secs(self.expansion_timeout_secs),
            ..Default::default()
        }
    }

    pub fn node_options(&self) -> NodeSelectionOptions {
        NodeSelectionOptions {
            min_nodes: self.min_nodes,
            taint: self.taint_nodes.then(NodeTaint::default),
            ..Default::default()
        }
    }

    pub fn metrics_interval(&self) -> Duration {
        Duration::from_secs(self.metrics_interval_secs)
    }
}
