//! HTTP API
//!
//! - [`rest`]: axum router and handlers
//! - [`server`]: listener with graceful shutdown

pub mod rest;
pub mod server;

pub use rest::{AddCapacityRequest, ApiErrorResponse, AppState, LabelNodesRequest, RestRouter};
pub use server::{ApiServer, ApiServerConfig, DEFAULT_API_ADDR};
