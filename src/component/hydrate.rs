//! Recursive hydration of a component tree.
//!
//! Hydrating a node reconciles its previous instance against the provider,
//! adopts resolved fields into the desired instance, expands the children
//! returned by `define` and hydrates them concurrently. Parents are
//! referenced by instance id only, so the resulting tree has single
//! ownership from the root down.

use std::collections::BTreeMap;

use futures::FutureExt;
use futures::future::{BoxFuture, try_join_all};
use tracing::{debug, info, warn};

use crate::error::{ComponentError, Result};
use crate::state::StateNode;

use super::context::Context;
use super::instance::{Component, InstanceId};
use super::resource::SyncStatus;
use super::tree::{ComponentTree, Node};

/// Key of the root node.
pub const ROOT_KEY: &str = "root";

/// Hydrates `component` into a tree, correlating nodes with `previous` by key.
///
/// # Errors
///
/// Returns the first error raised by any node's `sync` or `define`, or a
/// structural error in a definition. No partial tree is returned.
pub async fn hydrate(
    component: Component,
    previous: Option<&StateNode>,
    ctx: &Context,
) -> Result<ComponentTree> {
    let root = hydrate_node(
        component,
        ROOT_KEY.to_string(),
        ROOT_KEY.to_string(),
        previous,
        ctx,
    )
    .await?;

    info!(root = %root.instance_id, "Component tree hydrated");
    Ok(ComponentTree { root })
}

fn hydrate_node<'a>(
    component: Component,
    key: String,
    path: String,
    previous: Option<&'a StateNode>,
    ctx: &'a Context,
) -> BoxFuture<'a, Result<Node>> {
    async move {
        let parent = component.parent().cloned();
        let (pinned, mut resource) = component.into_parts();
        let type_name = resource.type_name();

        let previous = previous.filter(|prev| {
            let matches = prev.type_name == type_name;
            if !matches {
                warn!(
                    path = %path,
                    previous = %prev.type_name,
                    current = type_name,
                    "Type changed, ignoring previous state"
                );
            }
            matches
        });

        let instance_id = previous
            .map(|prev| prev.instance_id.clone())
            .or(pinned)
            .unwrap_or_else(|| InstanceId::derive(parent.as_ref(), &key));

        let mut working = resource.declared_copy();
        if let Some(prev) = previous {
            working.restore(&prev.state)?;
        }
        let resolved = match working.sync(ctx).await? {
            SyncStatus::Active => Some(working),
            SyncStatus::Removed => {
                info!(path = %path, id = %instance_id, "Resource removed out-of-band");
                None
            }
        };
        if let Some(resolved) = &resolved {
            resource.adopt(resolved.as_ref());
        }

        let definition = resource.define(ctx).await?;
        let declared = definition.resolve(instance_id.as_str(), ctx).await?;

        let mut pending = Vec::with_capacity(declared.len());
        for (child_key, child) in declared {
            let child_path = format!("{path}/{child_key}");
            if let Some(owner) = child.parent() {
                return Err(ComponentError::ParentConflict {
                    child: child_path,
                    owner: owner.to_string(),
                    parent: instance_id.to_string(),
                }
                .into());
            }

            let child_previous = previous.and_then(|prev| prev.children.get(&child_key));
            pending.push(hydrate_node(
                child.attached_to(instance_id.clone()),
                child_key,
                child_path,
                child_previous,
                ctx,
            ));
        }

        let children: BTreeMap<String, Node> = try_join_all(pending)
            .await?
            .into_iter()
            .map(|node| (node.key.clone(), node))
            .collect();

        debug!(
            path = %path,
            id = %instance_id,
            r#type = type_name,
            children = children.len(),
            "Hydrated component"
        );

        Ok(Node {
            instance_id,
            key,
            path,
            parent,
            resource,
            previous: resolved,
            children,
        })
    }
    .boxed()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::{Deserialize, Serialize};
    use serde_json::{Value, json};

    use super::*;
    use crate::component::{
        Definition, DeployDecision, Registry, Resource, ResourceInfo,
    };
    use crate::error::CanopyError;
    use crate::resources::Group;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Sleeper {
        label: String,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        gone: bool,
        #[serde(default)]
        token: Option<String>,
    }

    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct SleeperInputs {
        label: String,
        #[serde(default)]
        delay_ms: u64,
        #[serde(default)]
        gone: bool,
    }

    #[async_trait]
    impl Resource for Sleeper {
        const TYPE: &'static str = "sleeper";
        type Inputs = SleeperInputs;

        fn construct(inputs: SleeperInputs, _ctx: &Context) -> Result<Self> {
            Ok(Self {
                label: inputs.label,
                delay_ms: inputs.delay_ms,
                gone: inputs.gone,
                token: None,
            })
        }

        fn declared(&self) -> Self {
            Self {
                token: None,
                ..self.clone()
            }
        }

        fn adopt(&mut self, resolved: &Self) {
            self.token.clone_from(&resolved.token);
        }

        async fn sync(&mut self, _ctx: &Context) -> Result<SyncStatus> {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
            if self.gone || self.token.is_none() {
                return Ok(SyncStatus::Removed);
            }
            Ok(SyncStatus::Active)
        }

        fn should_deploy(&self, previous: Option<&Self>) -> DeployDecision {
            match previous {
                None => DeployDecision::Deploy,
                Some(prev) if prev.label != self.label => DeployDecision::Replace,
                Some(_) => DeployDecision::None,
            }
        }

        async fn deploy(&mut self, _previous: Option<&Self>, _ctx: &Context) -> Result<()> {
            self.token = Some(format!("tok-{}", self.label));
            Ok(())
        }

        async fn remove(&self, _ctx: &Context) -> Result<()> {
            Ok(())
        }

        async fn info(&self) -> ResourceInfo {
            ResourceInfo {
                title: self.label.clone(),
                type_name: String::from("Sleeper"),
                data: Value::Null,
            }
        }
    }

    /// Defines one child that is already owned elsewhere.
    #[derive(Debug, Clone, Serialize, Deserialize)]
    struct Thief;

    #[async_trait]
    impl Resource for Thief {
        const TYPE: &'static str = "thief";
        type Inputs = Value;

        fn construct(_inputs: Value, _ctx: &Context) -> Result<Self> {
            Ok(Self)
        }

        fn declared(&self) -> Self {
            Self
        }

        fn adopt(&mut self, _resolved: &Self) {}

        async fn sync(&mut self, _ctx: &Context) -> Result<SyncStatus> {
            Ok(SyncStatus::Active)
        }

        async fn define(&self, _ctx: &Context) -> Result<Definition> {
            let stolen = Component::new(Sleeper {
                label: String::from("stolen"),
                delay_ms: 0,
                gone: false,
                token: None,
            })
            .attached_to(InstanceId::new("elsewhere"));
            Ok(Definition::components([("loot", stolen)]))
        }

        fn should_deploy(&self, _previous: Option<&Self>) -> DeployDecision {
            DeployDecision::None
        }

        async fn deploy(&mut self, _previous: Option<&Self>, _ctx: &Context) -> Result<()> {
            Ok(())
        }

        async fn remove(&self, _ctx: &Context) -> Result<()> {
            Ok(())
        }

        async fn info(&self) -> ResourceInfo {
            ResourceInfo {
                title: String::from("thief"),
                type_name: String::from("Thief"),
                data: Value::Null,
            }
        }
    }

    fn context() -> Context {
        let mut registry = Registry::new();
        registry
            .register::<Group>()
            .register::<Sleeper>()
            .register::<Thief>();
        Context::new(Arc::new(registry))
    }

    fn root(ctx: &Context, value: Value) -> Component {
        ctx.registry().root_component(value, ctx).unwrap()
    }

    #[tokio::test]
    async fn test_scalar_components_fail_with_parent_named() {
        let ctx = context();
        let component = root(
            &ctx,
            json!({"type": "group", "id": "stack", "components": "oops"}),
        );

        let err = hydrate(component, None, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            CanopyError::Component(ComponentError::InvalidDefinition { ref component, .. })
                if component == "stack"
        ));
    }

    #[tokio::test]
    async fn test_children_with_uneven_sync_times_are_all_attached() {
        let ctx = context();
        let component = root(
            &ctx,
            json!({
                "type": "group",
                "id": "stack",
                "components": {
                    "a": {"type": "sleeper", "label": "a", "delayMs": 40},
                    "b": {"type": "sleeper", "label": "b", "delayMs": 1}
                }
            }),
        );

        let tree = hydrate(component, None, &ctx).await.unwrap();
        let stack = tree.root();

        assert_eq!(stack.children().len(), 2);
        for key in ["a", "b"] {
            let child = stack.child(key).unwrap();
            assert_eq!(child.parent(), Some(stack.instance_id()));
            assert_eq!(child.path(), format!("root/{key}"));
            let owner = tree.parent_of(child.instance_id()).unwrap();
            assert_eq!(owner.instance_id().as_str(), "stack");
        }
    }

    #[tokio::test]
    async fn test_hydration_is_deterministic() {
        let ctx = context();
        let value = json!({
            "type": "group",
            "components": {
                "inner": {
                    "type": "group",
                    "components": [{"type": "sleeper", "label": "x"}]
                }
            }
        });

        let first = hydrate(root(&ctx, value.clone()), None, &ctx).await.unwrap();
        let second = hydrate(root(&ctx, value), None, &ctx).await.unwrap();

        let links = |tree: &ComponentTree| {
            tree.iter()
                .map(|node| (node.path().to_string(), node.instance_id().clone(), node.parent().cloned()))
                .collect::<Vec<_>>()
        };
        assert_eq!(links(&first), links(&second));
        assert_eq!(first.len(), 3);
    }

    #[tokio::test]
    async fn test_parent_conflict_is_an_error() {
        let ctx = context();
        let component = root(&ctx, json!({"type": "thief", "id": "thief"}));

        let err = hydrate(component, None, &ctx).await.unwrap_err();
        match err {
            CanopyError::Component(ComponentError::ParentConflict { child, owner, parent }) => {
                assert_eq!(child, "root/loot");
                assert_eq!(owner, "elsewhere");
                assert_eq!(parent, "thief");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    async fn deploy_child(tree: &mut ComponentTree, key: &str, ctx: &Context) {
        let node = tree.root.children.get_mut(key).unwrap();
        node.resource.deploy(None, ctx).await.unwrap();
    }

    #[tokio::test]
    async fn test_previous_state_is_correlated_by_key() {
        let ctx = context();
        let value = json!({
            "type": "group",
            "components": {"a": {"type": "sleeper", "label": "a"}}
        });

        let mut first = hydrate(root(&ctx, value.clone()), None, &ctx).await.unwrap();
        assert_eq!(first.root().child("a").unwrap().decision(), DeployDecision::Deploy);
        deploy_child(&mut first, "a", &ctx).await;
        let snapshot = first.snapshot().unwrap();

        let second = hydrate(root(&ctx, value), Some(&snapshot), &ctx).await.unwrap();
        let child = second.root().child("a").unwrap();

        assert_eq!(child.instance_id(), first.root().child("a").unwrap().instance_id());
        assert!(child.previous().is_some());
        assert_eq!(child.decision(), DeployDecision::None);
    }

    #[tokio::test]
    async fn test_removed_resource_keeps_id_but_discards_previous() {
        let ctx = context();
        let value = json!({
            "type": "group",
            "components": {"a": {"type": "sleeper", "label": "a", "gone": true}}
        });

        let mut first = hydrate(root(&ctx, value.clone()), None, &ctx).await.unwrap();
        deploy_child(&mut first, "a", &ctx).await;
        let snapshot = first.snapshot().unwrap();

        let second = hydrate(root(&ctx, value), Some(&snapshot), &ctx).await.unwrap();
        let child = second.root().child("a").unwrap();

        assert_eq!(child.instance_id(), &snapshot.children["a"].instance_id);
        assert!(child.previous().is_none());
        assert_eq!(child.decision(), DeployDecision::Deploy);
    }

    #[tokio::test]
    async fn test_type_change_ignores_previous_state() {
        let ctx = context();
        let before = json!({
            "type": "group",
            "components": {"a": {"type": "group"}}
        });
        let after = json!({
            "type": "group",
            "components": {"a": {"type": "sleeper", "label": "a"}}
        });

        let first = hydrate(root(&ctx, before), None, &ctx).await.unwrap();
        let snapshot = first.snapshot().unwrap();
        let second = hydrate(root(&ctx, after), Some(&snapshot), &ctx).await.unwrap();

        let child = second.root().child("a").unwrap();
        assert_eq!(child.type_name(), "sleeper");
        assert!(child.previous().is_none());
        assert_eq!(child.decision(), DeployDecision::Deploy);
    }

    #[tokio::test]
    async fn test_invalid_child_inputs_propagate() {
        let ctx = context();
        let component = root(
            &ctx,
            json!({"type": "group", "components": {"a": {"type": "sleeper"}}}),
        );

        let err = hydrate(component, None, &ctx).await.unwrap_err();
        assert!(matches!(
            err,
            CanopyError::Component(ComponentError::InvalidInputs { .. })
        ));
    }
}
