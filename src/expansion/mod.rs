//! Capacity expansion
//!
//! - [`builder`]: computes the spec change (pure)
//! - [`submitter`]: sends exactly one mutation per call
//! - [`poller`]: waits for a phase at a fixed interval
//! - [`reader`]: captures before/after snapshots
//! - [`verifier`]: compares snapshots property by property (pure)
//! - [`workflow`]: wires the above into one pass

pub mod builder;
pub mod poller;
pub mod reader;
pub mod submitter;
pub mod verifier;
pub mod workflow;

pub use builder::{expand_spec, CapacityChangeRequest, EXPANDED_DEVICE_SET};
pub use poller::{StatusPoller, DEFAULT_POLL_INTERVAL};
pub use reader::SnapshotReader;
pub use submitter::MutationSubmitter;
pub use verifier::{
    DaemonPodPattern, OutcomeVerifier, Property, PropertyResult, VerificationReport,
};
pub use workflow::{
    ExpansionConfig, ExpansionOutcome, ExpansionWorkflow, DEFAULT_EXPANSION_TIMEOUT,
    DEFAULT_SETTLE_TIMEOUT,
};
