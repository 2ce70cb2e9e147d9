//! Deployment plan types and construction.
//!
//! A plan lists one action per node of the hydrated tree, followed by the
//! removal of every previously deployed node that no longer has a
//! counterpart.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::component::{ComponentTree, DeployDecision, InstanceId, Node};
use crate::state::StateNode;

/// A complete deployment plan.
#[derive(Debug, Serialize)]
pub struct DeploymentPlan {
    /// When the plan was created.
    pub created_at: DateTime<Utc>,
    /// Planned actions: tree nodes in pre-order, then removals children-first.
    pub actions: Vec<PlannedAction>,
    /// Previously deployed nodes to remove.
    #[serde(skip)]
    pub removals: Vec<Orphan>,
}

/// A single planned action.
#[derive(Debug, Clone, Serialize)]
pub struct PlannedAction {
    /// Action type.
    pub action_type: ActionType,
    /// Key path from the root.
    pub path: String,
    /// Instance id of the node.
    pub instance_id: InstanceId,
    /// Resource type tag.
    pub type_name: String,
    /// Reason for this action.
    pub reason: String,
}

/// Types of actions in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Create a new resource.
    Create,
    /// Update an existing resource in place.
    Update,
    /// Create a new resource and remove the old one.
    Replace,
    /// Remove a resource that is no longer declared.
    Remove,
    /// No operation (for tracking).
    Noop,
}

/// A previously deployed node with no counterpart in the desired tree.
#[derive(Debug, Clone)]
pub struct Orphan {
    /// Key path in the previous tree.
    pub path: String,
    /// Instance id.
    pub instance_id: InstanceId,
    /// Resource type tag.
    pub type_name: String,
    /// Persisted state, used to restore the resource for removal.
    pub state: Value,
}

impl DeploymentPlan {
    /// Builds a plan from a hydrated tree and the previous snapshot root.
    #[must_use]
    pub fn from_tree(tree: &ComponentTree, previous: Option<&StateNode>) -> Self {
        let mut actions: Vec<PlannedAction> = tree.iter().map(PlannedAction::for_node).collect();

        let mut removals = Vec::new();
        if let Some(previous) = previous {
            collect_orphans(Some(tree.root()), previous, &tree.root().path, &mut removals);
        }
        actions.extend(removals.iter().map(|orphan| PlannedAction {
            action_type: ActionType::Remove,
            path: orphan.path.clone(),
            instance_id: orphan.instance_id.clone(),
            type_name: orphan.type_name.clone(),
            reason: String::from("No longer declared"),
        }));

        Self {
            created_at: Utc::now(),
            actions,
            removals,
        }
    }

    /// Returns true if the plan changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.iter().all(|a| a.action_type == ActionType::Noop)
    }

    /// Returns the number of actions.
    #[must_use]
    pub const fn action_count(&self) -> usize {
        self.actions.len()
    }

    /// Returns the number of actions of the given type.
    #[must_use]
    pub fn count(&self, action_type: ActionType) -> usize {
        self.actions
            .iter()
            .filter(|a| a.action_type == action_type)
            .count()
    }

    /// Returns the number of actions that change something.
    #[must_use]
    pub fn change_count(&self) -> usize {
        self.actions.len() - self.count(ActionType::Noop)
    }
}

/// Walks the previous tree, pushing nodes without a same-typed counterpart
/// children-first.
fn collect_orphans(current: Option<&Node>, previous: &StateNode, path: &str, out: &mut Vec<Orphan>) {
    let current = current.filter(|node| node.type_name() == previous.type_name);

    for (key, child) in &previous.children {
        let child_current = current.and_then(|node| node.child(key));
        collect_orphans(child_current, child, &format!("{path}/{key}"), out);
    }

    if current.is_none() {
        out.push(Orphan {
            path: path.to_string(),
            instance_id: previous.instance_id.clone(),
            type_name: previous.type_name.clone(),
            state: previous.state.clone(),
        });
    }
}

impl PlannedAction {
    fn for_node(node: &Node) -> Self {
        let (action_type, reason) = match node.decision() {
            DeployDecision::Deploy if node.previous().is_none() => (ActionType::Create, "Not deployed"),
            DeployDecision::Deploy => (ActionType::Update, "Attributes changed"),
            DeployDecision::Replace => (ActionType::Replace, "Identity changed"),
            DeployDecision::None => (ActionType::Noop, "Up to date"),
        };

        Self {
            action_type,
            path: node.path().to_string(),
            instance_id: node.instance_id().clone(),
            type_name: node.type_name().to_string(),
            reason: reason.to_string(),
        }
    }

    /// Returns a human-readable description of the action.
    #[must_use]
    pub fn description(&self) -> String {
        match self.action_type {
            ActionType::Create => format!("Create {} '{}'", self.type_name, self.path),
            ActionType::Update => format!("Update {} '{}'", self.type_name, self.path),
            ActionType::Replace => format!("Replace {} '{}'", self.type_name, self.path),
            ActionType::Remove => format!("Remove {} '{}'", self.type_name, self.path),
            ActionType::Noop => format!("No change for '{}'", self.path),
        }
    }
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Replace => "replace",
            Self::Remove => "remove",
            Self::Noop => "noop",
        };
        write!(f, "{s}")
    }
}

impl std::fmt::Display for PlannedAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.action_type, self.type_name, self.path)?;
        if !self.reason.is_empty() {
            write!(f, " ({})", self.reason)?;
        }
        Ok(())
    }
}

impl std::fmt::Display for DeploymentPlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "No changes required");
        }

        writeln!(f, "Deployment Plan ({} changes):", self.change_count())?;
        for (i, action) in self
            .actions
            .iter()
            .filter(|a| a.action_type != ActionType::Noop)
            .enumerate()
        {
            writeln!(f, "  {i}. {action}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::component::{Context, hydrate};
    use crate::resources::builtin_registry;

    fn state_node(id: &str, type_name: &str, children: Vec<(&str, StateNode)>) -> StateNode {
        StateNode {
            instance_id: InstanceId::new(id),
            type_name: type_name.to_string(),
            state: json!({"deployed": true}),
            children: children
                .into_iter()
                .map(|(k, v)| (k.to_string(), v))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    #[tokio::test]
    async fn test_plan_lists_removals_children_first() {
        let ctx = Context::new(Arc::new(builtin_registry()));
        let root = ctx
            .registry()
            .root_component(json!({"type": "group", "components": {"kept": {"type": "group"}}}), &ctx)
            .unwrap();

        let previous = state_node(
            "root-1",
            "group",
            vec![
                ("kept", state_node("kept-1", "group", vec![])),
                (
                    "old",
                    state_node("old-1", "group", vec![("leaf", state_node("leaf-1", "group", vec![]))]),
                ),
            ],
        );

        let tree = hydrate(root, Some(&previous), &ctx).await.unwrap();
        let plan = DeploymentPlan::from_tree(&tree, Some(&previous));

        let removed: Vec<_> = plan.removals.iter().map(|o| o.path.as_str()).collect();
        assert_eq!(removed, vec!["root/old/leaf", "root/old"]);
        assert_eq!(plan.count(ActionType::Remove), 2);
        assert_eq!(plan.count(ActionType::Noop), 2);
    }

    #[tokio::test]
    async fn test_first_plan_creates_everything() {
        let ctx = Context::new(Arc::new(builtin_registry()));
        let root = ctx
            .registry()
            .root_component(json!({"type": "group", "components": [{"type": "group"}]}), &ctx)
            .unwrap();

        let tree = hydrate(root, None, &ctx).await.unwrap();
        let plan = DeploymentPlan::from_tree(&tree, None);

        assert_eq!(plan.count(ActionType::Create), 2);
        assert!(plan.removals.is_empty());
        assert!(!plan.is_empty());
        assert_eq!(plan.actions[0].path, "root");
        assert_eq!(plan.actions[1].path, "root/0");
    }

    #[tokio::test]
    async fn test_type_change_removes_previous_node() {
        let ctx = Context::new(Arc::new(builtin_registry()));
        let root = ctx
            .registry()
            .root_component(json!({"type": "group"}), &ctx)
            .unwrap();
        let previous = state_node("root-1", "topic", vec![]);

        let tree = hydrate(root, Some(&previous), &ctx).await.unwrap();
        let plan = DeploymentPlan::from_tree(&tree, Some(&previous));

        assert_eq!(plan.removals.len(), 1);
        assert_eq!(plan.removals[0].type_name, "topic");
        assert_eq!(plan.count(ActionType::Create), 1);
    }
}
