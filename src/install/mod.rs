//! First-time setup of the storage cluster

pub mod request;
pub mod workflow;

pub use request::{
    discovery_request, local_volume_set_request, storage_cluster_request, DiskType,
    LocalVolumeSetForm, DEVICE_SET_NAME, MAX_SIZE_ALL, STORAGE_CLUSTER_NAME, STORAGE_NAMESPACE,
};
pub use workflow::{InstallOutcome, InstallRequest, InstallWorkflow, LocalStorageOutcome};
