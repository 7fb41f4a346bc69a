//! Domain layer - Port definitions and snapshot types
//!
//! This module defines the traits (ports) that adapters implement and the
//! plain values the workflows pass between their steps.

pub mod ports;
pub mod snapshot;

pub use ports::*;
pub use snapshot::*;
