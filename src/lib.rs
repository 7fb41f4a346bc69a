//! OCS Capacity Manager
//!
//! Adds raw capacity to an OpenShift Container Storage cluster and verifies
//! that the cluster actually grew: the StorageCluster is patched, its phase
//! is polled until reconciliation settles, and before/after snapshots of
//! pods, nodes and Ceph health are compared property by property.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────────┐
//! │                          REST API (axum)                                     │
//! ├─────────────────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────┐  ┌─────────────────┐  ┌─────────────────────────────┐  │
//! │  │    Expansion    │  │     Install     │  │   Capacity view / classes   │  │
//! │  │    Workflow     │  │    Workflow     │  │   Node selection            │  │
//! │  └────────┬────────┘  └────────┬────────┘  └─────────────┬───────────────┘  │
//! │           │                    │                         │                   │
//! │  builder → submitter → poller → reader → verifier        │                   │
//! │           │                    │                         │                   │
//! │           └────────────────────┼─────────────────────────┘                   │
//! │                                │                                             │
//! │                 ┌──────────────┴──────────────┐                              │
//! │                 │  Ports: ClusterApi,         │                              │
//! │                 │         MetricsSource       │                              │
//! │                 └──────────────┬──────────────┘                              │
//! ├────────────────────────────────┼────────────────────────────────────────────┤
//! │  ┌─────────────────────────────┴───┐  ┌─────────────────────────────────┐   │
//! │  │   Kubernetes API (kube-rs)      │  │   Prometheus (reqwest)          │   │
//! │  └─────────────────────────────────┘  └─────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`expansion`]: capacity expansion and outcome verification
//! - [`install`]: first-time StorageCluster and local volume setup
//! - [`nodes`]: storage node selection, labelling and tainting
//! - [`storage`]: capacity math, add-capacity view, storage class choice,
//!   discovered devices, claim cloning
//! - [`metrics`]: Prometheus client, pollers, storage overview and this process's
//!   own metrics
//! - [`api`]: REST API server
//! - [`adapters`]: Kubernetes implementation of the cluster port
//! - [`crd`]: Custom Resource Definitions
//! - [`domain`]: Port traits and snapshot types
//! - [`config`]: file configuration
//! - [`error`]: Error types and handling

pub mod adapters;
pub mod api;
pub mod config;
pub mod crd;
pub mod domain;
pub mod error;
pub mod expansion;
pub mod install;
pub mod metrics;
pub mod nodes;
pub mod storage;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use adapters::KubeClusterApi;

pub use api::{ApiServer, ApiServerConfig, AppState, RestRouter};

pub use config::Config;

pub use crd::{
    CephCluster, CephHealth, ClusterPhase, LocalVolumeDiscovery, LocalVolumeDiscoveryResult,
    LocalVolumeSet, StorageCluster, StorageClusterSpec, StorageClusterStatus, StorageDeviceSet,
};

pub use domain::ports::{
    ClusterApi, ClusterApiRef, MetricSample, MetricsSource, MetricsSourceRef, PatchOperation,
    ResourceRef,
};
pub use domain::snapshot::ExpansionSnapshot;

pub use error::{Error, Result};

pub use expansion::{
    CapacityChangeRequest, ExpansionConfig, ExpansionOutcome, ExpansionWorkflow,
    OutcomeVerifier, Property, VerificationReport,
};

pub use install::{
    InstallOutcome, InstallRequest, InstallWorkflow, LocalStorageOutcome, LocalVolumeSetForm,
};

pub use metrics::{
    MetricsPoller, MetricsState, OverviewWatch, PrometheusClient, StorageOverview, WorkflowMetrics,
};

pub use nodes::{NodeCandidate, NodeSelectionOptions, NodeSelectionService};

pub use storage::{
    AddCapacityView, CapacityService, DeviceCapacityView, DeviceDiscoveryService, PvcCloneService,
    PvcCloneView, StorageClassOption, StorageClassSelector,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
