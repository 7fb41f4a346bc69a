//! Prometheus HTTP API client
//!
//! Only instant queries (`/api/v1/query`) are needed.

use crate::domain::ports::{MetricSample, MetricsSource};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

/// In-cluster Prometheus of the monitoring stack
pub const DEFAULT_PROMETHEUS_URL: &str = "http://prometheus-k8s.openshift-monitoring.svc:9090";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// =============================================================================
// Response Envelope
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryResponse {
    status: String,
    #[serde(default)]
    data: Option<QueryData>,
    #[serde(default)]
    error_type: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QueryData {
    result_type: String,
    #[serde(default)]
    result: Vec<VectorSample>,
}

#[derive(Debug, Deserialize)]
struct VectorSample {
    #[serde(default)]
    metric: BTreeMap<String, String>,
    /// `[unix_seconds, "value"]`
    value: (f64, String),
}

/// Parse a `/api/v1/query` response body into samples
pub fn parse_response(body: &str) -> Result<Vec<MetricSample>> {
    let response: QueryResponse = serde_json::from_str(body)
        .map_err(|e| Error::PrometheusResponseParse(format!("invalid envelope: {}", e)))?;

    if response.status != "success" {
        return Err(Error::PrometheusQuery(format!(
            "{}: {}",
            response.error_type.as_deref().unwrap_or("error"),
            response.error.as_deref().unwrap_or("no error message")
        )));
    }

    let data = response
        .data
        .ok_or_else(|| Error::PrometheusResponseParse("missing data".into()))?;
    if data.result_type != "vector" {
        return Err(Error::PrometheusResponseParse(format!(
            "unsupported result type: {}",
            data.result_type
        )));
    }

    data.result
        .into_iter()
        .map(|sample| {
            let value = sample.value.1.parse::<f64>().map_err(|_| {
                Error::PrometheusResponseParse(format!("invalid sample value: {}", sample.value.1))
            })?;
            Ok(MetricSample {
                labels: sample.metric,
                timestamp: sample.value.0,
                value,
            })
        })
        .collect()
}

// =============================================================================
// Client
// =============================================================================

pub struct PrometheusClient {
    base_url: String,
    client: reqwest::Client,
}

impl PrometheusClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self::with_client(base_url, client))
    }

    pub fn with_client(base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        }
    }

    /// Full URL of an instant query
    pub fn query_url(&self, query: &str) -> String {
        format!(
            "{}/api/v1/query?query={}",
            self.base_url,
            urlencoding::encode(query)
        )
    }
}

#[async_trait]
impl MetricsSource for PrometheusClient {
    async fn query(&self, query: &str) -> Result<Vec<MetricSample>> {
        let url = self.query_url(query);
        debug!("Prometheus query: {}", query);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            // Prometheus still answers with the envelope on 4xx/5xx
            return match parse_response(&body) {
                Err(e @ Error::PrometheusQuery(_)) => Err(e),
                _ => Err(Error::PrometheusQuery(format!("HTTP {}", status))),
            };
        }

        parse_response(&body)
    }
}
