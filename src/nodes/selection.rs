//! Node Selection Service
//!
//! Lists storage node candidates, validates a selection and labels (and
//! optionally taints) the selected nodes. The install flow and the stand-alone
//! "label nodes" action both go through this one service; they differ only in
//! the options they pass.

use crate::domain::ports::{
    add_op, escape_pointer_segment, replace_op, ClusterApiRef, PatchOperation,
};
use crate::domain::snapshot::NodeRecord;
use crate::error::{Error, Result};
use futures::future::try_join_all;
use k8s_openapi::api::core::v1::Node;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Label that marks a node as part of the storage cluster
pub const STORAGE_NODE_LABEL: &str = "cluster.ocs.openshift.io/openshift-storage";

/// Taint that reserves a node for storage workloads
pub const STORAGE_TAINT_KEY: &str = "node.ocs.openshift.io/storage";

/// Storage needs three failure domains
pub const DEFAULT_MIN_NODES: usize = 3;

// =============================================================================
// Options
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeLabel {
    pub key: String,
    pub value: String,
}

impl Default for NodeLabel {
    fn default() -> Self {
        Self {
            key: STORAGE_NODE_LABEL.to_string(),
            value: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeTaint {
    pub key: String,
    pub value: String,
    pub effect: String,
}

impl Default for NodeTaint {
    fn default() -> Self {
        Self {
            key: STORAGE_TAINT_KEY.to_string(),
            value: "true".to_string(),
            effect: "NoSchedule".to_string(),
        }
    }
}

impl NodeTaint {
    fn to_json(&self) -> Value {
        json!({ "key": self.key, "value": self.value, "effect": self.effect })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeSelectionOptions {
    pub min_nodes: usize,
    pub label: NodeLabel,
    /// Taint applied to selected workers; `None` leaves taints alone
    pub taint: Option<NodeTaint>,
}

impl Default for NodeSelectionOptions {
    fn default() -> Self {
        Self {
            min_nodes: DEFAULT_MIN_NODES,
            label: NodeLabel::default(),
            taint: None,
        }
    }
}

impl NodeSelectionOptions {
    /// Default options plus the storage taint
    pub fn with_storage_taint() -> Self {
        Self {
            taint: Some(NodeTaint::default()),
            ..Default::default()
        }
    }
}

// =============================================================================
// Candidates
// =============================================================================

/// One row of the node selection table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCandidate {
    pub name: String,
    pub zone: Option<String>,
    pub cpu: Option<String>,
    pub memory: Option<String>,
    pub ready: bool,
    pub control_plane: bool,
    pub labeled: bool,
    pub tainted: bool,
    /// Pre-selected in the table because it already carries the storage label
    pub selected: bool,
}

fn capacity(node: &Node, resource: &str) -> Option<String> {
    node.status
        .as_ref()
        .and_then(|s| s.capacity.as_ref())
        .and_then(|c| c.get(resource))
        .map(|q| q.0.clone())
}

fn has_taint(node: &Node, key: &str) -> bool {
    node.spec
        .as_ref()
        .and_then(|s| s.taints.as_ref())
        .map(|taints| taints.iter().any(|t| t.key == key))
        .unwrap_or(false)
}

// =============================================================================
// Service
// =============================================================================

pub struct NodeSelectionService {
    api: ClusterApiRef,
    options: NodeSelectionOptions,
}

impl NodeSelectionService {
    pub fn new(api: ClusterApiRef, options: NodeSelectionOptions) -> Self {
        Self { api, options }
    }

    pub fn options(&self) -> &NodeSelectionOptions {
        &self.options
    }

    /// Build the selection table for `nodes`
    pub fn candidates(&self, nodes: &[Node]) -> Vec<NodeCandidate> {
        let taint_key = self
            .options
            .taint
            .as_ref()
            .map(|t| t.key.as_str())
            .unwrap_or(STORAGE_TAINT_KEY);

        nodes
            .iter()
            .map(|node| {
                let record = NodeRecord::from(node);
                let labeled = record.labels.contains_key(&self.options.label.key);
                NodeCandidate {
                    zone: record.zone,
                    cpu: capacity(node, "cpu"),
                    memory: capacity(node, "memory"),
                    ready: record.ready,
                    control_plane: record.control_plane,
                    labeled,
                    tainted: has_taint(node, taint_key),
                    selected: labeled,
                    name: record.name,
                }
            })
            .collect()
    }

    /// Fetch all nodes and build the selection table
    pub async fn list_candidates(&self) -> Result<Vec<NodeCandidate>> {
        let nodes = self.api.list_nodes(None).await?;
        Ok(self.candidates(&nodes))
    }

    /// Resolve `names` against `nodes`
    ///
    /// Duplicate names count once.
    pub fn select(&self, nodes: &[Node], names: &[String]) -> Result<Vec<Node>> {
        let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();
        if unique.len() < self.options.min_nodes {
            return Err(Error::Configuration(format!(
                "at least {} nodes must be selected, got {}",
                self.options.min_nodes,
                unique.len()
            )));
        }

        unique
            .into_iter()
            .map(|name| {
                nodes
                    .iter()
                    .find(|n| n.metadata.name.as_deref() == Some(name))
                    .cloned()
                    .ok_or_else(|| Error::ResourceNotFound {
                        kind: "Node".to_string(),
                        name: name.to_string(),
                    })
            })
            .collect()
    }

    /// Patch operations that put the storage label on `node`
    ///
    /// Empty when the label is already present with the right value.
    pub fn label_ops(&self, node: &Node) -> Vec<PatchOperation> {
        let label = &self.options.label;
        let labels = match &node.metadata.labels {
            Some(labels) => labels,
            None => {
                return vec![add_op(
                    "/metadata/labels",
                    json!(BTreeMap::from([(label.key.clone(), label.value.clone())])),
                )]
            }
        };

        let path = format!("/metadata/labels/{}", escape_pointer_segment(&label.key));
        match labels.get(&label.key) {
            Some(value) if value == &label.value => Vec::new(),
            Some(_) => vec![replace_op(path, json!(label.value))],
            None => vec![add_op(path, json!(label.value))],
        }
    }

    /// Patch operations that add the storage taint to `node`
    ///
    /// Empty when no taint is configured, the node is a control plane node,
    /// or it already carries the taint.
    pub fn taint_ops(&self, node: &Node) -> Result<Vec<PatchOperation>> {
        let taint = match &self.options.taint {
            Some(t) => t,
            None => return Ok(Vec::new()),
        };
        let record = NodeRecord::from(node);
        if record.control_plane || has_taint(node, &taint.key) {
            return Ok(Vec::new());
        }

        let ops = match node.spec.as_ref() {
            None => vec![add_op("/spec", json!({ "taints": [taint.to_json()] }))],
            Some(spec) => match &spec.taints {
                None => vec![add_op("/spec/taints", json!([taint.to_json()]))],
                Some(existing) => {
                    let mut taints = existing
                        .iter()
                        .map(serde_json::to_value)
                        .collect::<std::result::Result<Vec<_>, _>>()?;
                    taints.push(taint.to_json());
                    vec![replace_op("/spec/taints", Value::Array(taints))]
                }
            },
        };
        Ok(ops)
    }

    /// Label and taint every node in `selection`, one patch per node
    ///
    /// Nodes that need no change are not patched. Returns the nodes that
    /// were patched, as stored by the API server.
    pub async fn apply(&self, selection: &[Node]) -> Result<Vec<Node>> {
        let mut pending = Vec::new();
        for node in selection {
            let name = node.metadata.name.clone().unwrap_or_default();
            let mut ops = self.label_ops(node);
            ops.extend(self.taint_ops(node)?);
            if ops.is_empty() {
                debug!("Node {} already prepared", name);
                continue;
            }
            pending.push((name, ops));
        }

        info!("Preparing {} storage node(s)", pending.len());
        try_join_all(
            pending
                .iter()
                .map(|(name, ops)| self.api.patch_node(name, ops)),
        )
        .await
    }

    /// Select by name from the live node list, then apply
    pub async fn select_and_apply(&self, names: &[String]) -> Result<Vec<Node>> {
        let nodes = self.api.list_nodes(None).await?;
        let selection = self.select(&nodes, names)?;
        self.apply(&selection).await?;
        Ok(selection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::snapshot::CONTROL_PLANE_LABEL;
    use crate::testing::{self, FakeCluster};
    use assert_matches::assert_matches;
    use k8s_openapi::api::core::v1::{NodeSpec, Taint};
    use std::sync::Arc;

    fn workers(n: usize) -> Vec<Node> {
        (0..n)
            .map(|i| testing::node(&format!("worker-{}", i), true))
            .collect()
    }

    fn names(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("worker-{}", i)).collect()
    }

    fn service(fake: &Arc<FakeCluster>, options: NodeSelectionOptions) -> NodeSelectionService {
        NodeSelectionService::new(fake.clone(), options)
    }

    #[test]
    fn test_select_below_minimum_fails() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::default());
        let err = svc.select(&workers(3), &names(2)).unwrap_err();
        assert_matches!(err, Error::Configuration(msg) if msg.contains("at least 3"));

        let dupes = vec!["worker-0".to_string(), "worker-0".into(), "worker-1".into()];
        assert_matches!(svc.select(&workers(3), &dupes), Err(Error::Configuration(_)));
    }

    #[test]
    fn test_select_unknown_node() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::default());
        let mut wanted = names(2);
        wanted.push("ghost".into());
        let err = svc.select(&workers(3), &wanted).unwrap_err();
        assert_matches!(
            err,
            Error::ResourceNotFound { kind, name } if kind == "Node" && name == "ghost"
        );
    }

    #[test]
    fn test_label_ops_merge_existing_labels() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::default());
        let node = testing::node("worker-0", true);

        let ops = svc.label_ops(&node);
        assert_eq!(ops.len(), 1);
        let expected_path = format!(
            "/metadata/labels/{}",
            STORAGE_NODE_LABEL.replace('/', "~1")
        );
        assert_matches!(
            &ops[0],
            PatchOperation::Add(op) if op.path == expected_path && op.value == json!("")
        );

        // Applying the op keeps the labels the node already had
        let patched = testing::apply_ops(&node, &ops).unwrap();
        let labels = patched.metadata.labels.unwrap();
        assert_eq!(labels["kubernetes.io/hostname"], "worker-0");
        assert_eq!(labels[STORAGE_NODE_LABEL], "");
        assert!(svc.label_ops(&testing::apply_ops(&node, &ops).unwrap()).is_empty());

        let mut bare = node.clone();
        bare.metadata.labels = None;
        assert_matches!(
            &svc.label_ops(&bare)[0],
            PatchOperation::Add(op) if op.path == "/metadata/labels"
        );
    }

    #[test]
    fn test_label_ops_replace_wrong_value() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::default());
        let mut node = testing::node("worker-0", true);
        node.metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(STORAGE_NODE_LABEL.to_string(), "stale".to_string());

        let ops = svc.label_ops(&node);
        assert_matches!(&ops[0], PatchOperation::Replace(op) if op.value == json!(""));
        let patched = testing::apply_ops(&node, &ops).unwrap();
        assert_eq!(patched.metadata.labels.unwrap()[STORAGE_NODE_LABEL], "");
    }

    #[test]
    fn test_taint_skips_control_plane_and_duplicates() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::with_storage_taint());

        let mut master = testing::node("master-0", true);
        master
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(CONTROL_PLANE_LABEL.to_string(), String::new());
        assert!(svc.taint_ops(&master).unwrap().is_empty());

        let mut tainted = testing::node("worker-0", true);
        tainted.spec = Some(NodeSpec {
            taints: Some(vec![Taint {
                key: STORAGE_TAINT_KEY.into(),
                value: Some("true".into()),
                effect: "NoSchedule".into(),
                ..Default::default()
            }]),
            ..Default::default()
        });
        assert!(svc.taint_ops(&tainted).unwrap().is_empty());

        let fresh = testing::node("worker-1", true);
        let ops = svc.taint_ops(&fresh).unwrap();
        assert_matches!(&ops[0], PatchOperation::Add(op) if op.path == "/spec");
    }

    #[test]
    fn test_taint_appends_to_existing() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::with_storage_taint());
        let mut node = testing::node("worker-0", true);
        node.spec = Some(NodeSpec {
            taints: Some(vec![Taint {
                key: "dedicated".into(),
                effect: "NoExecute".into(),
                ..Default::default()
            }]),
            ..Default::default()
        });

        let ops = svc.taint_ops(&node).unwrap();
        let value = match &ops[0] {
            PatchOperation::Replace(op) => &op.value,
            other => panic!("expected replace, got {:?}", other),
        };
        assert_eq!(value.as_array().unwrap().len(), 2);
        assert_eq!(value[1]["key"], STORAGE_TAINT_KEY);
    }

    #[test]
    fn test_candidates_mark_labeled_nodes_selected() {
        let fake = Arc::new(FakeCluster::new());
        let svc = service(&fake, NodeSelectionOptions::default());
        let mut nodes = workers(2);
        nodes[1]
            .metadata
            .labels
            .get_or_insert_with(Default::default)
            .insert(STORAGE_NODE_LABEL.to_string(), String::new());

        let rows = svc.candidates(&nodes);
        assert!(!rows[0].selected);
        assert!(rows[1].selected && rows[1].labeled);
        assert!(rows.iter().all(|r| r.ready && !r.tainted));
    }

    #[tokio::test]
    async fn test_apply_patches_each_node_once() {
        let fake = Arc::new(FakeCluster::new().with_nodes(workers(3)));
        let svc = service(&fake, NodeSelectionOptions::with_storage_taint());

        let selected = svc.select_and_apply(&names(3)).await.unwrap();
        assert_eq!(selected.len(), 3);
        assert_eq!(fake.call_count("patch_node"), 3);

        let node = fake.stored_node("worker-2");
        assert!(node.metadata.labels.unwrap().contains_key(STORAGE_NODE_LABEL));
        assert!(has_taint(&fake.stored_node("worker-2"), STORAGE_TAINT_KEY));

        // Second pass finds nothing to do
        svc.select_and_apply(&names(3)).await.unwrap();
        assert_eq!(fake.call_count("patch_node"), 3);
    }
}
