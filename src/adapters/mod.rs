//! Adapters implementing the domain ports
//!
//! - kubernetes: Kubernetes API server via `kube::Api`
//! - prometheus: lives in `crate::metrics`, next to the poller that drives it

pub mod kubernetes;

pub use kubernetes::*;
