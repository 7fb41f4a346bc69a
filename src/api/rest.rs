//! REST API Handlers
//!
//! JSON endpoints backing the console's storage pages: the add-capacity form
//! and its submission, storage class and node pickers, install, local volume
//! sets and device discovery, claim cloning, and the storage overview card.

use crate::domain::ports::{ClusterApiRef, MetricsSourceRef, ResourceRef};
use crate::error::Error;
use crate::expansion::{ExpansionConfig, ExpansionWorkflow};
use crate::install::{InstallRequest, InstallWorkflow, LocalVolumeSetForm};
use crate::metrics::{OverviewWatch, WorkflowMetrics};
use crate::nodes::{NodeSelectionOptions, NodeSelectionService, NodeTaint};
use crate::storage::{
    CapacityService, DeviceDiscoveryService, PvcCloneService, StorageClassSelector,
};
use axum::{
    extract::{Json, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

// =============================================================================
// Request/Response Types
// =============================================================================

/// Add capacity request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddCapacityRequest {
    /// Storage class for the new devices; current class when absent
    #[serde(default)]
    pub storage_class: Option<String>,
}

/// Label nodes request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelNodesRequest {
    pub nodes: Vec<String>,
    /// Also apply the storage taint
    #[serde(default)]
    pub taint: bool,
}

/// Label nodes response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelNodesResponse {
    pub nodes: Vec<String>,
}

/// Nodes whose discovered devices are listed, comma separated
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DevicesQuery {
    #[serde(default)]
    pub nodes: String,
}

impl DevicesQuery {
    pub fn node_names(&self) -> Vec<String> {
        self.nodes
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// Clone claim request
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClonePvcRequest {
    /// Name of the clone; `<source>-clone` when absent
    #[serde(default)]
    pub name: Option<String>,
}

/// API error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

fn error_response(e: &Error) -> Response {
    let status =
        StatusCode::from_u16(e.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    } else {
        warn!("Request rejected: {}", e);
    }

    (
        status,
        Json(ApiErrorResponse {
            error: e.code().into(),
            message: e.to_string(),
            details: None,
        }),
    )
        .into_response()
}

fn json_response<T: Serialize>(result: crate::error::Result<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::OK, Json(body)).into_response(),
        Err(e) => error_response(&e),
    }
}

fn created_response<T: Serialize>(result: crate::error::Result<T>) -> Response {
    match result {
        Ok(body) => (StatusCode::CREATED, Json(body)).into_response(),
        Err(e) => error_response(&e),
    }
}

// =============================================================================
// REST Router
// =============================================================================

/// Everything the handlers need
#[derive(Clone)]
pub struct AppState {
    pub api: ClusterApiRef,
    pub metrics_source: MetricsSourceRef,
    pub workflow_metrics: Arc<WorkflowMetrics>,
    pub expansion: ExpansionConfig,
    pub node_options: NodeSelectionOptions,
    /// Namespace probed by the readiness check
    pub namespace: String,
    /// Latest storage overview polls
    pub overview: OverviewWatch,
}

/// REST API router builder
pub struct RestRouter {
    state: AppState,
}

impl RestRouter {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Build the Axum router
    pub fn build(self) -> Router {
        Router::new()
            // Capacity endpoints
            .route(
                "/v1/storageclusters/:namespace/:name/capacity",
                get(get_capacity).post(add_capacity),
            )
            .route("/v1/capacity/usage", get(get_usage))
            .route("/v1/capacity/overview", get(get_overview))
            .route("/v1/storageclasses", get(list_storage_classes))
            // Claim cloning
            .route(
                "/v1/persistentvolumeclaims/:namespace/:name/clone",
                get(get_clone_view).post(clone_pvc),
            )
            // Node endpoints
            .route("/v1/nodes", get(list_nodes))
            .route("/v1/nodes/label", post(label_nodes))
            // Install and local storage
            .route("/v1/install", post(install))
            .route("/v1/localvolumesets", post(create_local_storage))
            .route("/v1/devices", get(list_devices))
            .route("/v1/localvolumes/nodes", get(list_local_volume_nodes))
            // Health and metrics
            .route("/health", get(health_check))
            .route("/ready", get(readiness_check))
            .route("/metrics", get(metrics))
            .layer(TraceLayer::new_for_http())
            .with_state(self.state)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Add-capacity form data
async fn get_capacity(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    let target = ResourceRef::storage_cluster(namespace, name);
    json_response(
        CapacityService::new(state.api.clone(), state.metrics_source.clone())
            .view(&target)
            .await,
    )
}

/// Run one capacity expansion
async fn add_capacity(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(request): Json<AddCapacityRequest>,
) -> Response {
    let target = ResourceRef::storage_cluster(namespace, name);
    info!("Add capacity requested for {}", target);

    let workflow = ExpansionWorkflow::new(state.api.clone(), state.expansion.clone())
        .with_metrics(state.workflow_metrics.clone());
    json_response(
        workflow
            .run(&target, request.storage_class.as_deref())
            .await,
    )
}

/// Latest used-capacity sample
async fn get_usage(State(state): State<AppState>) -> Response {
    let usage = state.overview.used.borrow().clone();
    (StatusCode::OK, Json(usage)).into_response()
}

/// Used, total, health and OSDs up
async fn get_overview(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(state.overview.overview())).into_response()
}

/// Source claim details for the clone dialog
async fn get_clone_view(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
) -> Response {
    json_response(
        PvcCloneService::new(state.api.clone(), state.metrics_source.clone())
            .view(&namespace, &name)
            .await,
    )
}

/// Create a clone of a claim
async fn clone_pvc(
    State(state): State<AppState>,
    Path((namespace, name)): Path<(String, String)>,
    Json(request): Json<ClonePvcRequest>,
) -> Response {
    info!("Clone requested for claim {}/{}", namespace, name);
    created_response(
        PvcCloneService::new(state.api.clone(), state.metrics_source.clone())
            .clone_claim(&namespace, &name, request.name.as_deref())
            .await,
    )
}

/// Storage classes offered for expansion
async fn list_storage_classes(State(state): State<AppState>) -> Response {
    json_response(StorageClassSelector::new(state.api.clone()).list().await)
}

/// Node selection table
async fn list_nodes(State(state): State<AppState>) -> Response {
    json_response(
        NodeSelectionService::new(state.api.clone(), state.node_options.clone())
            .list_candidates()
            .await,
    )
}

/// Label (and optionally taint) storage nodes
async fn label_nodes(
    State(state): State<AppState>,
    Json(request): Json<LabelNodesRequest>,
) -> Response {
    let mut options = state.node_options.clone();
    if request.taint && options.taint.is_none() {
        options.taint = Some(NodeTaint::default());
    }

    let result = NodeSelectionService::new(state.api.clone(), options)
        .select_and_apply(&request.nodes)
        .await
        .map(|nodes| LabelNodesResponse {
            nodes: nodes
                .into_iter()
                .filter_map(|n| n.metadata.name)
                .collect(),
        });
    json_response(result)
}

/// Create the storage cluster
async fn install(
    State(state): State<AppState>,
    Json(request): Json<InstallRequest>,
) -> Response {
    info!(
        "Install requested on {} node(s) with storage class {}",
        request.nodes.len(),
        request.storage_class
    );
    let workflow = InstallWorkflow::new(state.api.clone(), state.node_options.clone())
        .with_metrics(state.workflow_metrics.clone());
    created_response(workflow.run(&request).await)
}

/// Enable discovery and create a LocalVolumeSet
async fn create_local_storage(
    State(state): State<AppState>,
    Json(form): Json<LocalVolumeSetForm>,
) -> Response {
    info!(
        "LocalVolumeSet {} requested on {} node(s)",
        form.volume_set_name,
        form.node_names.len()
    );
    created_response(
        InstallWorkflow::new(state.api.clone(), state.node_options.clone())
            .create_local_storage(&form)
            .await,
    )
}

/// Devices discovered on the requested nodes
async fn list_devices(
    State(state): State<AppState>,
    Query(query): Query<DevicesQuery>,
) -> Response {
    json_response(
        DeviceDiscoveryService::new(state.api.clone())
            .discovered(&query.node_names())
            .await,
    )
}

/// Nodes that already carry local PVs
async fn list_local_volume_nodes(State(state): State<AppState>) -> Response {
    json_response(
        DeviceDiscoveryService::new(state.api.clone())
            .associated_nodes()
            .await,
    )
}

/// Health check
async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness check
async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.api.list_storage_clusters(&state.namespace).await {
        Ok(_) => (StatusCode::OK, "ready".to_string()),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("cluster API unreachable: {}", e),
        ),
    }
}

/// Prometheus text exposition
async fn metrics(State(state): State<AppState>) -> Response {
    match state.workflow_metrics.render() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => error_response(&e),
    }
}
