//! Error types for the capacity manager
//!
//! Provides a single structured error type shared by the expansion workflow,
//! node selection, install flow, metrics glue and the HTTP API.

use crate::crd::ClusterPhase;
use std::time::Duration;
use thiserror::Error;

/// Unified error type
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Internal error: {0}")]
    Internal(String),

    /// Invalid or missing input detected before anything is submitted
    #[error("Configuration error: {0}")]
    Configuration(String),

    // =========================================================================
    // Kubernetes Errors
    // =========================================================================
    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),

    #[error("Resource not found: {kind}/{name}")]
    ResourceNotFound { kind: String, name: String },

    // =========================================================================
    // Reconciliation Errors
    // =========================================================================
    #[error(
        "Timed out after {waited:?} waiting for {resource}; last observed phase: {}",
        last_phase.map(|p| p.to_string()).unwrap_or_else(|| "none".to_string())
    )]
    PollTimeout {
        resource: String,
        last_phase: Option<ClusterPhase>,
        waited: Duration,
    },

    #[error("Reconciliation of {resource} failed: phase {phase}")]
    ReconcileFailed { resource: String, phase: ClusterPhase },

    // =========================================================================
    // Prometheus/Metrics Errors
    // =========================================================================
    #[error("Prometheus connection error: {0}")]
    PrometheusConnection(#[from] reqwest::Error),

    #[error("Prometheus query error: {0}")]
    PrometheusQuery(String),

    #[error("Prometheus response parse error: {0}")]
    PrometheusResponseParse(String),

    // =========================================================================
    // Parse Errors
    // =========================================================================
    #[error("Capacity parse error: {0}")]
    CapacityParse(String),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    // =========================================================================
    // IO Errors
    // =========================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Check if this error is transient
    ///
    /// Only transport-level failures qualify; API responses with a status code
    /// (conflict, forbidden, not found) are answers, not outages.
    pub fn is_transient(&self) -> bool {
        match self {
            Error::Kube(kube::Error::Api(resp)) => resp.code >= 500 || resp.code == 429,
            Error::Kube(
                kube::Error::HyperError(_) | kube::Error::Service(_) | kube::Error::HttpError(_),
            ) => true,
            Error::PrometheusConnection(_) => true,
            _ => false,
        }
    }

    /// HTTP status code used when this error reaches the REST API
    pub fn http_status(&self) -> u16 {
        match self {
            Error::Configuration(_) | Error::CapacityParse(_) | Error::JsonParse(_) => 400,
            Error::ResourceNotFound { .. } => 404,
            Error::Kube(kube::Error::Api(resp)) if resp.code == 409 => 409,
            Error::PollTimeout { .. } => 504,
            Error::ReconcileFailed { .. }
            | Error::PrometheusConnection(_)
            | Error::PrometheusQuery(_)
            | Error::PrometheusResponseParse(_) => 502,
            _ => 500,
        }
    }

    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            Error::Internal(_) => "internal_error",
            Error::Configuration(_) => "configuration_error",
            Error::Kube(_) => "api_error",
            Error::ResourceNotFound { .. } => "not_found",
            Error::PollTimeout { .. } => "poll_timeout",
            Error::ReconcileFailed { .. } => "reconcile_failed",
            Error::PrometheusConnection(_)
            | Error::PrometheusQuery(_)
            | Error::PrometheusResponseParse(_) => "metrics_error",
            Error::CapacityParse(_) => "invalid_capacity",
            Error::JsonParse(_) | Error::YamlParse(_) => "parse_error",
            Error::Io(_) => "io_error",
        }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16) -> Error {
        Error::Kube(kube::Error::Api(ErrorResponse {
            status: "Failure".into(),
            message: "boom".into(),
            reason: "Test".into(),
            code,
        }))
    }

    #[test]
    fn test_transient_classification() {
        assert!(api_error(503).is_transient());
        assert!(api_error(429).is_transient());
        assert!(!api_error(409).is_transient());
        assert!(!api_error(404).is_transient());
        assert!(!Error::Configuration("bad".into()).is_transient());
    }

    #[test]
    fn test_decode_error_is_not_transient() {
        let decode = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!Error::Kube(kube::Error::SerdeError(decode)).is_transient());
    }

    #[test]
    fn test_http_status() {
        assert_eq!(Error::Configuration("x".into()).http_status(), 400);
        assert_eq!(
            Error::ResourceNotFound {
                kind: "StorageCluster".into(),
                name: "ocs".into()
            }
            .http_status(),
            404
        );
        assert_eq!(api_error(409).http_status(), 409);
        assert_eq!(api_error(500).http_status(), 500);
        let timeout = Error::PollTimeout {
            resource: "StorageCluster/ocs".into(),
            last_phase: Some(ClusterPhase::Progressing),
            waited: Duration::from_secs(4),
        };
        assert_eq!(timeout.http_status(), 504);
    }

    #[test]
    fn test_poll_timeout_message() {
        let err = Error::PollTimeout {
            resource: "StorageCluster/openshift-storage/ocs".into(),
            last_phase: Some(ClusterPhase::Progressing),
            waited: Duration::from_secs(4),
        };
        assert!(err.to_string().contains("last observed phase: Progressing"));

        let err = Error::PollTimeout {
            resource: "StorageCluster/openshift-storage/ocs".into(),
            last_phase: None,
            waited: Duration::from_secs(4),
        };
        assert!(err.to_string().contains("last observed phase: none"));
    }
}
