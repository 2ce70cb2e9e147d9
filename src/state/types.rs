//! State types for the previous-state snapshot.
//!
//! The snapshot mirrors the component tree by key. Each node keeps the
//! serialized resource instance as it stood after the last successful
//! reconciliation.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::component::InstanceId;

/// Current version of the state format.
pub const STATE_VERSION: &str = "1.0";

/// Number of history entries kept.
const MAX_HISTORY: usize = 100;

/// The complete persisted state of a project environment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshot {
    /// State format version.
    pub version: String,
    /// Project name.
    pub project: String,
    /// Environment name.
    pub environment: String,
    /// Hash of the last applied configuration.
    pub config_hash: String,
    /// Root of the previous-state tree, `None` before the first apply.
    #[serde(default)]
    pub root: Option<StateNode>,
    /// When the state was last updated.
    pub last_updated: DateTime<Utc>,
    /// Reconciliation history (recent entries).
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// One node of the previous-state tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateNode {
    /// Stable instance id.
    pub instance_id: InstanceId,
    /// Resource type tag.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Serialized resource instance.
    pub state: Value,
    /// Children keyed by name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub children: BTreeMap<String, StateNode>,
}

/// A single entry in the reconciliation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// When the operation occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of operation.
    pub operation: Operation,
    /// Configuration hash at the time of the operation.
    pub config_hash: String,
    /// Paths of the resources touched.
    pub resources: Vec<String>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Optional error message.
    #[serde(default)]
    pub error: Option<String>,
}

/// Types of recorded operations.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    /// Reconciliation pass.
    Apply,
    /// Removal of every resource.
    Destroy,
}

impl StateSnapshot {
    /// Creates a new empty snapshot.
    #[must_use]
    pub fn new(project: &str, environment: &str) -> Self {
        Self {
            version: STATE_VERSION.to_string(),
            project: project.to_string(),
            environment: environment.to_string(),
            config_hash: String::new(),
            root: None,
            last_updated: Utc::now(),
            history: Vec::new(),
        }
    }

    /// Replaces the previous-state tree.
    pub fn set_root(&mut self, root: Option<StateNode>) {
        self.root = root;
        self.last_updated = Utc::now();
    }

    /// Adds a history entry, dropping the oldest beyond the retention limit.
    pub fn add_history(&mut self, entry: HistoryEntry) {
        if self.history.len() >= MAX_HISTORY {
            self.history.remove(0);
        }
        self.history.push(entry);
    }

    /// Number of nodes in the previous-state tree.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.root.as_ref().map_or(0, StateNode::count)
    }
}

impl StateNode {
    /// Number of nodes in this subtree.
    #[must_use]
    pub fn count(&self) -> usize {
        1 + self.children.values().map(Self::count).sum::<usize>()
    }

    /// Visits every node children-first, passing its key path.
    pub fn walk_post_order<'a>(&'a self, path: &str, visit: &mut impl FnMut(&str, &'a Self)) {
        for (key, child) in &self.children {
            child.walk_post_order(&format!("{path}/{key}"), visit);
        }
        visit(path, self);
    }
}

impl HistoryEntry {
    /// Creates a successful history entry.
    #[must_use]
    pub fn new(operation: Operation, config_hash: &str, resources: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            operation,
            config_hash: config_hash.to_string(),
            resources,
            success: true,
            error: None,
        }
    }

    /// Creates a failed history entry.
    #[must_use]
    pub fn failed(operation: Operation, config_hash: &str, resources: Vec<String>, error: &str) -> Self {
        Self {
            success: false,
            error: Some(error.to_string()),
            ..Self::new(operation, config_hash, resources)
        }
    }
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let op = match self {
            Self::Apply => "apply",
            Self::Destroy => "destroy",
        };
        write!(f, "{op}")
    }
}
