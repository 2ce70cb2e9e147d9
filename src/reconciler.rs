//! Reconciliation driver.
//!
//! This module runs a full pass: it locks the state, loads the previous
//! snapshot, hydrates the declared root against it, deploys the tree
//! children-first, removes what is no longer declared and saves the new
//! snapshot. There is no rollback: a failed pass keeps the previous
//! snapshot and records the failure in the history.

use std::collections::HashSet;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info};

use crate::component::{Context, DeployDecision, InstanceId, Node, ROOT_KEY, hydrate};
use crate::config::ProjectConfig;
use crate::error::{CanopyError, ReconcileError, Result};
use crate::planner::{ActionType, DeploymentPlan};
use crate::state::{
    HistoryEntry, LockInfo, Operation, StateNode, StateSnapshot, StateStore, generate_holder_id,
};

/// Drives reconciliation passes for one project environment.
pub struct Reconciler<'a, S: StateStore> {
    /// Context handed to every lifecycle hook.
    ctx: &'a Context,
    /// State store.
    store: &'a S,
    /// Project the snapshot belongs to.
    project: &'a ProjectConfig,
    /// Lock holder identifier.
    holder: String,
}

/// Result of an apply or destroy pass.
#[derive(Debug, Serialize)]
pub struct ReconciliationResult {
    /// Operation that ran.
    pub operation: Operation,
    /// Number of resources created.
    pub created: usize,
    /// Number of resources updated in place.
    pub updated: usize,
    /// Number of resources replaced.
    pub replaced: usize,
    /// Number of resources removed.
    pub removed: usize,
    /// Number of resources left unchanged.
    pub unchanged: usize,
    /// Snapshot saved at the end of the pass.
    #[serde(skip)]
    pub final_state: Option<StateSnapshot>,
}

/// Summary of one deployed node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeInfo {
    /// Key path from the root.
    pub path: String,
    /// Instance id.
    pub instance_id: InstanceId,
    /// Resource type tag.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Display title.
    pub title: String,
    /// Display type.
    pub kind: String,
    /// Type-specific details.
    pub data: Value,
}

/// A successful pass before it is written to the snapshot.
struct Outcome {
    root: StateNode,
    result: ReconciliationResult,
    touched: Vec<String>,
}

impl<'a, S: StateStore> Reconciler<'a, S> {
    /// Creates a new reconciler.
    #[must_use]
    pub fn new(ctx: &'a Context, store: &'a S, project: &'a ProjectConfig) -> Self {
        Self {
            ctx,
            store,
            project,
            holder: generate_holder_id(),
        }
    }

    /// Overrides the lock holder identifier.
    #[must_use]
    pub fn with_holder(mut self, holder: impl Into<String>) -> Self {
        self.holder = holder.into();
        self
    }

    /// Hydrates `root` against the previous snapshot and plans without
    /// deploying anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or hydration fails.
    pub async fn plan(&self, root: Value) -> Result<DeploymentPlan> {
        let snapshot = self.store.load().await?;
        let previous = snapshot.as_ref().and_then(|s| s.root.as_ref());

        let component = self.ctx.registry().root_component(root, self.ctx)?;
        let tree = hydrate(component, previous, self.ctx).await?;

        let plan = DeploymentPlan::from_tree(&tree, previous);
        info!("Plan: {} changes over {} nodes", plan.change_count(), tree.len());
        Ok(plan)
    }

    /// Reconciles the deployed resources with `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held elsewhere or any step of the
    /// pass fails. The previous snapshot is kept in that case.
    pub async fn apply(&self, root: Value, config_hash: &str) -> Result<ReconciliationResult> {
        info!(
            "Starting reconciliation for {}/{}",
            self.project.name, self.project.environment
        );

        let lock = self.store.acquire_lock(&self.holder).await?;
        let result = self.apply_locked(root, config_hash).await;
        self.release(&lock).await;
        result
    }

    /// Removes every resource recorded in the snapshot, children first, then
    /// deletes the snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the lock is held elsewhere or a removal fails.
    pub async fn destroy(&self) -> Result<ReconciliationResult> {
        info!(
            "Destroying {}/{}",
            self.project.name, self.project.environment
        );

        let lock = self.store.acquire_lock(&self.holder).await?;
        let result = self.destroy_locked().await;
        self.release(&lock).await;
        result
    }

    /// Describes every node of the saved snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if the snapshot cannot be loaded or a node cannot be
    /// restored.
    pub async fn info(&self) -> Result<Vec<NodeInfo>> {
        let Some(snapshot) = self.store.load().await? else {
            return Ok(Vec::new());
        };
        let Some(root) = &snapshot.root else {
            return Ok(Vec::new());
        };

        let mut nodes = Vec::new();
        let mut pending = vec![(ROOT_KEY.to_string(), root)];
        while let Some((path, node)) = pending.pop() {
            let resource = self.ctx.registry().restore(&node.type_name, &node.state)?;
            let summary = resource.info().await;
            nodes.push(NodeInfo {
                path: path.clone(),
                instance_id: node.instance_id.clone(),
                type_name: node.type_name.clone(),
                title: summary.title,
                kind: summary.type_name,
                data: summary.data,
            });
            for (key, child) in node.children.iter().rev() {
                pending.push((format!("{path}/{key}"), child));
            }
        }
        Ok(nodes)
    }

    async fn apply_locked(&self, root: Value, config_hash: &str) -> Result<ReconciliationResult> {
        let mut snapshot = self.load_or_new().await?;

        match self.reconcile(root, snapshot.root.as_ref()).await {
            Ok(outcome) => {
                snapshot.set_root(Some(outcome.root));
                snapshot.config_hash = config_hash.to_string();
                snapshot.add_history(HistoryEntry::new(Operation::Apply, config_hash, outcome.touched));
                self.store.save(&snapshot).await?;

                let mut result = outcome.result;
                info!(
                    "Reconciliation complete: {} created, {} updated, {} replaced, {} removed",
                    result.created, result.updated, result.replaced, result.removed
                );
                result.final_state = Some(snapshot);
                Ok(result)
            }
            Err(err) => {
                error!("Reconciliation failed: {err}");
                self.record_failure(&mut snapshot, Operation::Apply, config_hash, &err.to_string())
                    .await;
                Err(err)
            }
        }
    }

    /// Hydrates, deploys and removes.
    async fn reconcile(&self, root: Value, previous: Option<&StateNode>) -> Result<Outcome> {
        let component = self.ctx.registry().root_component(root, self.ctx)?;
        let mut tree = hydrate(component, previous, self.ctx).await?;
        let plan = DeploymentPlan::from_tree(&tree, previous);

        if plan.is_empty() {
            info!("No changes required - state is converged");
        } else {
            debug!("Executing plan with {} changes", plan.change_count());
        }

        deploy_node(&mut tree.root, self.ctx).await?;

        // A resource moved to another key or swapped between keys is found again
        // by its new node. Stale instances pointing at it are kept.
        let claimed: HashSet<String> = tree.iter().filter_map(|node| node.resource.external_id()).collect();

        for node in tree.iter().filter(|node| node.decision() == DeployDecision::Replace) {
            let Some(previous) = node.previous() else {
                continue;
            };
            if previous.external_id().is_some_and(|id| claimed.contains(&id)) {
                info!(path = %node.path, "Replaced resource is still declared, keeping it");
                continue;
            }
            previous.remove(self.ctx).await.map_err(|e| {
                ReconcileError::resource_failed("remove", node.type_name(), &node.path, &e)
            })?;
        }

        let mut kept = HashSet::new();
        for orphan in &plan.removals {
            let resource = self.ctx.registry().restore(&orphan.type_name, &orphan.state)?;
            if let Some(external_id) = resource.external_id()
                && claimed.contains(&external_id)
            {
                info!(path = %orphan.path, %external_id, "Resource is still declared, keeping it");
                kept.insert(orphan.path.as_str());
                continue;
            }

            info!(path = %orphan.path, id = %orphan.instance_id, "Removing undeclared resource");
            resource.remove(self.ctx).await.map_err(|e| {
                ReconcileError::resource_failed("remove", &orphan.type_name, &orphan.path, &e)
            })?;
        }

        let touched = plan
            .actions
            .iter()
            .filter(|a| a.action_type != ActionType::Noop)
            .filter(|a| !(a.action_type == ActionType::Remove && kept.contains(a.path.as_str())))
            .map(|a| a.path.clone())
            .collect();

        let result = ReconciliationResult {
            operation: Operation::Apply,
            created: plan.count(ActionType::Create),
            updated: plan.count(ActionType::Update),
            replaced: plan.count(ActionType::Replace),
            removed: plan.count(ActionType::Remove) - kept.len(),
            unchanged: plan.count(ActionType::Noop),
            final_state: None,
        };

        Ok(Outcome {
            root: tree.snapshot()?,
            result,
            touched,
        })
    }

    async fn destroy_locked(&self) -> Result<ReconciliationResult> {
        let mut result = ReconciliationResult {
            operation: Operation::Destroy,
            created: 0,
            updated: 0,
            replaced: 0,
            removed: 0,
            unchanged: 0,
            final_state: None,
        };

        let Some(mut snapshot) = self.store.load().await? else {
            info!("No state found, nothing to destroy");
            return Ok(result);
        };
        let config_hash = snapshot.config_hash.clone();

        let mut targets = Vec::new();
        if let Some(root) = &snapshot.root {
            root.walk_post_order(ROOT_KEY, &mut |path, node| {
                targets.push((path.to_string(), node.clone()));
            });
        }

        for (path, node) in &targets {
            let removal = match self.ctx.registry().restore(&node.type_name, &node.state) {
                Ok(resource) => resource.remove(self.ctx).await.map_err(|e| {
                    CanopyError::from(ReconcileError::resource_failed("remove", &node.type_name, path, &e))
                }),
                Err(e) => Err(e),
            };
            if let Err(err) = removal {
                error!(path = %path, "Destroy failed: {err}");
                self.record_failure(&mut snapshot, Operation::Destroy, &config_hash, &err.to_string())
                    .await;
                return Err(err);
            }
            debug!(path = %path, id = %node.instance_id, "Removed");
            result.removed += 1;
        }

        self.store.delete().await?;
        info!("Destroyed {} resources", result.removed);
        Ok(result)
    }

    async fn load_or_new(&self) -> Result<StateSnapshot> {
        let snapshot = self.store.load().await?.unwrap_or_else(|| {
            StateSnapshot::new(&self.project.name, &self.project.environment)
        });

        if snapshot.project != self.project.name || snapshot.environment != self.project.environment {
            return Err(ReconcileError::Aborted {
                reason: format!(
                    "State belongs to {}/{}, not {}/{}",
                    snapshot.project, snapshot.environment, self.project.name, self.project.environment
                ),
            }
            .into());
        }
        Ok(snapshot)
    }

    async fn record_failure(&self, snapshot: &mut StateSnapshot, operation: Operation, config_hash: &str, message: &str) {
        snapshot.add_history(HistoryEntry::failed(operation, config_hash, Vec::new(), message));
        if let Err(e) = self.store.save(snapshot).await {
            error!("Failed to save state: {e}");
        }
    }

    async fn release(&self, lock: &LockInfo) {
        if let Err(e) = self.store.release_lock(&lock.lock_id).await {
            error!("Failed to release state lock: {e}");
        }
    }
}

/// Deploys the children of `node` concurrently, then `node` itself.
///
/// A replaced node is deployed from scratch; its previous instance is removed
/// by the caller once the whole tree is deployed.
fn deploy_node<'a>(node: &'a mut Node, ctx: &'a Context) -> BoxFuture<'a, Result<()>> {
    async move {
        try_join_all(node.children.values_mut().map(|child| deploy_node(child, ctx))).await?;

        match node.decision() {
            DeployDecision::None => {}
            DeployDecision::Deploy => {
                info!(path = %node.path, r#type = node.type_name(), "Deploying");
                node.resource
                    .deploy(node.previous.as_deref(), ctx)
                    .await
                    .map_err(|e| ReconcileError::resource_failed("deploy", node.type_name(), &node.path, &e))?;
            }
            DeployDecision::Replace => {
                info!(path = %node.path, r#type = node.type_name(), "Replacing");
                node.resource
                    .deploy(None, ctx)
                    .await
                    .map_err(|e| ReconcileError::resource_failed("replace", node.type_name(), &node.path, &e))?;
            }
        }
        Ok(())
    }
    .boxed()
}

impl std::fmt::Display for ReconciliationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} complete:", self.operation)?;
        if self.operation == Operation::Apply {
            writeln!(f, "  Created: {}", self.created)?;
            writeln!(f, "  Updated: {}", self.updated)?;
            writeln!(f, "  Replaced: {}", self.replaced)?;
        }
        writeln!(f, "  Removed: {}", self.removed)?;
        if self.operation == Operation::Apply {
            writeln!(f, "  Unchanged: {}", self.unchanged)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use serde_json::json;
    use tempfile::TempDir;

    use super::*;
    use crate::provider::{InMemoryTopicApi, SharedTopicApi};
    use crate::resources::builtin_registry;
    use crate::state::LocalStateStore;

    struct Harness {
        api: Arc<InMemoryTopicApi>,
        ctx: Context,
        store: LocalStateStore,
        project: ProjectConfig,
        _temp: TempDir,
    }

    impl Harness {
        fn new() -> Self {
            let api = Arc::new(InMemoryTopicApi::new());
            let shared: SharedTopicApi = api.clone();
            let temp = TempDir::new().unwrap();
            Self {
                ctx: Context::new(Arc::new(builtin_registry())).with_service(shared),
                api,
                store: LocalStateStore::with_base_dir(temp.path().join(".canopy")),
                project: ProjectConfig {
                    name: String::from("shop"),
                    environment: String::from("dev"),
                },
                _temp: temp,
            }
        }

        fn reconciler(&self) -> Reconciler<'_, LocalStateStore> {
            Reconciler::new(&self.ctx, &self.store, &self.project).with_holder("test")
        }
    }

    fn stack(topics: Value) -> Value {
        json!({"type": "group", "components": topics})
    }

    #[tokio::test]
    async fn test_first_apply_creates_everything() {
        let h = Harness::new();
        let root = stack(json!({
            "orders": {"type": "topic", "topicName": "orders", "displayName": "Orders"},
            "audit": {"type": "topic", "topicName": "audit"}
        }));

        let result = h.reconciler().apply(root, "hash-1").await.unwrap();

        assert_eq!(result.created, 3);
        assert_eq!(h.api.create_count().await, 2);
        assert_eq!(h.api.set_count().await, 0);

        let saved = h.store.load().await.unwrap().unwrap();
        assert_eq!(saved.node_count(), 3);
        assert_eq!(saved.config_hash, "hash-1");
        let orders = &saved.root.as_ref().unwrap().children["orders"];
        assert_eq!(orders.state["arn"], InMemoryTopicApi::arn_for("orders"));
        assert!(!h.store.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn test_second_apply_is_a_no_op() {
        let h = Harness::new();
        let root = stack(json!({"orders": {"type": "topic", "topicName": "orders", "displayName": "Orders"}}));

        h.reconciler().apply(root.clone(), "hash-1").await.unwrap();
        let first_ids = h.store.load().await.unwrap().unwrap().root;

        let plan = h.reconciler().plan(root.clone()).await.unwrap();
        assert!(plan.is_empty());

        let result = h.reconciler().apply(root, "hash-1").await.unwrap();
        assert_eq!(result.unchanged, 2);
        assert_eq!(h.api.create_count().await, 1);
        assert_eq!(h.api.set_count().await, 0);
        assert_eq!(h.store.load().await.unwrap().unwrap().root, first_ids);
    }

    #[tokio::test]
    async fn test_changed_attribute_is_updated_in_place() {
        let h = Harness::new();
        h.reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders", "displayName": "Orders"}})), "a")
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders", "displayName": "All orders"}})), "b")
            .await
            .unwrap();

        assert_eq!(result.updated, 1);
        assert_eq!(h.api.create_count().await, 1);
        assert_eq!(h.api.set_count().await, 1);
        let live = h.api.attributes("orders").await.unwrap();
        assert_eq!(live["displayName"], "All orders");
    }

    #[tokio::test]
    async fn test_renamed_topic_is_replaced() {
        let h = Harness::new();
        h.reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders"}})), "a")
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders-v2"}})), "b")
            .await
            .unwrap();

        assert_eq!(result.replaced, 1);
        assert!(h.api.attributes("orders").await.is_none());
        assert!(h.api.attributes("orders-v2").await.is_some());
    }

    #[tokio::test]
    async fn test_undeclared_topic_is_removed() {
        let h = Harness::new();
        h.reconciler()
            .apply(
                stack(json!({
                    "orders": {"type": "topic", "topicName": "orders"},
                    "audit": {"type": "topic", "topicName": "audit"}
                })),
                "a",
            )
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders"}})), "b")
            .await
            .unwrap();

        assert_eq!(result.removed, 1);
        assert_eq!(h.api.delete_count().await, 1);
        assert!(h.api.attributes("audit").await.is_none());
        let saved = h.store.load().await.unwrap().unwrap();
        assert!(!saved.root.unwrap().children.contains_key("audit"));
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_previous_snapshot() {
        let h = Harness::new();
        h.reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders"}})), "a")
            .await
            .unwrap();
        let before = h.store.load().await.unwrap().unwrap().root;

        h.api.fail_attribute("displayName").await;
        let err = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders", "displayName": "x"}})), "b")
            .await;

        assert!(err.is_err());
        let after = h.store.load().await.unwrap().unwrap();
        assert_eq!(after.root, before);
        assert_eq!(after.config_hash, "a");
        let last = after.history.last().unwrap();
        assert!(!last.success);
        assert!(!h.store.is_locked().await.unwrap());
    }

    #[tokio::test]
    async fn test_state_of_another_project_is_not_touched() {
        let h = Harness::new();
        h.store.save(&StateSnapshot::new("billing", "dev")).await.unwrap();

        let err = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders"}})), "a")
            .await
            .unwrap_err();

        assert!(matches!(err, CanopyError::Reconcile(ReconcileError::Aborted { .. })));
        assert_eq!(h.api.create_count().await, 0);
        assert_eq!(h.store.load().await.unwrap().unwrap().project, "billing");
    }

    #[tokio::test]
    async fn test_deploy_failure_names_the_node() {
        let h = Harness::new();
        h.api.fail_attribute("displayName").await;
        h.reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders"}})), "a")
            .await
            .unwrap();

        let err = h
            .reconciler()
            .apply(stack(json!({"orders": {"type": "topic", "topicName": "orders", "displayName": "x"}})), "b")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to deploy topic 'root/orders'"));
    }

    #[tokio::test]
    async fn test_moved_topic_is_not_deleted() {
        let h = Harness::new();
        h.reconciler()
            .apply(stack(json!({"a": {"type": "topic", "topicName": "orders"}})), "a")
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(stack(json!({"b": {"type": "topic", "topicName": "orders"}})), "b")
            .await
            .unwrap();

        assert_eq!(result.removed, 0);
        assert_eq!(h.api.delete_count().await, 0);
        assert!(h.api.attributes("orders").await.is_some());

        let saved = h.store.load().await.unwrap().unwrap();
        let root = saved.root.as_ref().unwrap();
        assert!(!root.children.contains_key("a"));
        assert_eq!(root.children["b"].state["arn"], InMemoryTopicApi::arn_for("orders"));
    }

    #[tokio::test]
    async fn test_replace_onto_an_orphaned_name_keeps_the_topic() {
        let h = Harness::new();
        h.reconciler()
            .apply(
                stack(json!({
                    "a": {"type": "topic", "topicName": "orders"},
                    "b": {"type": "topic", "topicName": "payments"}
                })),
                "a",
            )
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(stack(json!({"b": {"type": "topic", "topicName": "orders"}})), "b")
            .await
            .unwrap();

        assert_eq!(result.replaced, 1);
        assert_eq!(result.removed, 0);
        assert!(h.api.attributes("orders").await.is_some());
        assert!(h.api.attributes("payments").await.is_none());
    }

    #[tokio::test]
    async fn test_swapped_names_keep_both_topics() {
        let h = Harness::new();
        h.reconciler()
            .apply(
                stack(json!({
                    "a": {"type": "topic", "topicName": "orders"},
                    "b": {"type": "topic", "topicName": "payments"}
                })),
                "a",
            )
            .await
            .unwrap();

        let result = h
            .reconciler()
            .apply(
                stack(json!({
                    "a": {"type": "topic", "topicName": "payments"},
                    "b": {"type": "topic", "topicName": "orders"}
                })),
                "b",
            )
            .await
            .unwrap();

        assert_eq!(result.replaced, 2);
        assert_eq!(h.api.delete_count().await, 0);
        assert!(h.api.attributes("orders").await.is_some());
        assert!(h.api.attributes("payments").await.is_some());
    }

    #[tokio::test]
    async fn test_locked_state_blocks_apply() {
        let h = Harness::new();
        h.store.acquire_lock("someone-else").await.unwrap();

        let err = h
            .reconciler()
            .apply(stack(json!({})), "a")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("someone-else"));
        assert_eq!(h.api.create_count().await, 0);
    }

    #[tokio::test]
    async fn test_out_of_band_removal_is_recreated() {
        let h = Harness::new();
        let root = stack(json!({"orders": {"type": "topic", "topicName": "orders"}}));
        h.reconciler().apply(root.clone(), "a").await.unwrap();
        let id_before = h.store.load().await.unwrap().unwrap().root.unwrap().children["orders"]
            .instance_id
            .clone();

        h.api.delete_out_of_band("orders").await;
        let result = h.reconciler().apply(root, "a").await.unwrap();

        assert_eq!(result.created, 1);
        assert_eq!(h.api.create_count().await, 2);
        let id_after = h.store.load().await.unwrap().unwrap().root.unwrap().children["orders"]
            .instance_id
            .clone();
        assert_eq!(id_before, id_after);
    }

    #[tokio::test]
    async fn test_destroy_removes_everything() {
        let h = Harness::new();
        h.reconciler()
            .apply(
                stack(json!({
                    "orders": {"type": "topic", "topicName": "orders"},
                    "audit": {"type": "topic", "topicName": "audit"}
                })),
                "a",
            )
            .await
            .unwrap();

        let result = h.reconciler().destroy().await.unwrap();

        assert_eq!(result.removed, 3);
        assert_eq!(h.api.delete_count().await, 2);
        assert!(!h.store.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_info_lists_nodes_in_order() {
        let h = Harness::new();
        h.reconciler()
            .apply(
                stack(json!({
                    "orders": {"type": "topic", "topicName": "orders"},
                    "audit": {"type": "topic", "topicName": "audit"}
                })),
                "a",
            )
            .await
            .unwrap();

        let nodes = h.reconciler().info().await.unwrap();
        let paths: Vec<_> = nodes.iter().map(|n| n.path.as_str()).collect();

        assert_eq!(paths, vec![ROOT_KEY, "root/audit", "root/orders"]);
        assert_eq!(nodes[2].title, "orders");
        assert_eq!(nodes[2].kind, "Topic");
        let by_path: BTreeMap<_, _> = nodes.iter().map(|n| (n.path.clone(), n.type_name.clone())).collect();
        assert_eq!(by_path["root"], "group");
    }
}
