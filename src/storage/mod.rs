//! Storage capacity math, the add-capacity view, storage class selection,
//! discovered local devices and claim cloning

pub mod capacity;
pub mod classes;
pub mod devices;
pub mod pvc;

pub use capacity::{
    humanize_binary_bytes, osd_size_tib, parse_quantity, provisioned_capacity, AddCapacityView,
    CapacityService, NOT_AVAILABLE, OSD_CAPACITY_SIZES,
};
pub use classes::{
    available_pvs, expansion_options, is_ceph_provisioned, is_no_provisioner, pvs_capacity,
    StorageClassOption, StorageClassSelector, CEPH_PROVISIONERS, NO_PROVISIONER,
};
pub use devices::{
    associated_nodes, total_device_capacity, DeviceCapacityView, DeviceDiscoveryService,
};
pub use pvc::{pvc_clone_request, PvcCloneService, PvcCloneView, NO_DATA};
