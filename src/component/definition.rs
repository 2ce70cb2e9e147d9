//! Children returned from `define` and their resolution into components.

use std::collections::BTreeMap;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use tracing::warn;

use crate::error::{ComponentError, Result};

use super::context::Context;
use super::instance::Component;

/// Result of a component's `define` hook.
pub enum Definition {
    /// No children.
    Empty,
    /// Children built in code, keyed by name.
    Components(BTreeMap<String, Child>),
    /// Children given as a declared value: a mapping, a list, or null.
    Declared(Value),
}

/// One entry of a [`Definition::Components`] map.
pub enum Child {
    /// A ready component.
    Component(Component),
    /// A child that is only known once the future resolves.
    Deferred(BoxFuture<'static, Result<Child>>),
    /// A declared value resolved through the registry.
    Declared(Value),
}

impl Definition {
    /// Builds a definition from a list of keyed components.
    #[must_use]
    pub fn components<K: Into<String>>(children: impl IntoIterator<Item = (K, Component)>) -> Self {
        Self::Components(
            children
                .into_iter()
                .map(|(key, component)| (key.into(), Child::Component(component)))
                .collect(),
        )
    }

    /// Resolves every child into a component.
    ///
    /// `owner` names the defining component in error messages.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::InvalidDefinition` if a declared value is not a
    /// mapping, list or null, or any error raised while resolving a child.
    pub async fn resolve(self, owner: &str, ctx: &Context) -> Result<BTreeMap<String, Component>> {
        let children = match self {
            Self::Empty => return Ok(BTreeMap::new()),
            Self::Components(children) => children,
            Self::Declared(value) => declared_children(value, owner)?,
        };

        let mut resolved = BTreeMap::new();
        for (key, child) in children {
            match child.resolve(ctx).await? {
                Some(component) => {
                    resolved.insert(key, component);
                }
                None => warn!(component = %owner, child = %key, "Discarding child that is not a component"),
            }
        }
        Ok(resolved)
    }
}

impl Child {
    /// Wraps a future producing a child.
    pub fn deferred<F>(future: F) -> Self
    where
        F: std::future::Future<Output = Result<Self>> + Send + 'static,
    {
        Self::Deferred(future.boxed())
    }

    /// Resolves this child, awaiting deferred values. `None` means the value
    /// is not a component.
    fn resolve(self, ctx: &Context) -> BoxFuture<'_, Result<Option<Component>>> {
        async move {
            match self {
                Self::Component(component) => Ok(Some(component)),
                Self::Declared(value) => ctx.registry().component_from_value(value, ctx),
                Self::Deferred(future) => future.await?.resolve(ctx).await,
            }
        }
        .boxed()
    }
}

impl std::fmt::Debug for Definition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty"),
            Self::Components(children) => f.debug_tuple("Components").field(children).finish(),
            Self::Declared(value) => f.debug_tuple("Declared").field(value).finish(),
        }
    }
}

impl std::fmt::Debug for Child {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Component(component) => f.debug_tuple("Component").field(component).finish(),
            Self::Deferred(_) => f.write_str("Deferred(..)"),
            Self::Declared(value) => f.debug_tuple("Declared").field(value).finish(),
        }
    }
}

fn declared_children(value: Value, owner: &str) -> Result<BTreeMap<String, Child>> {
    match value {
        Value::Null => Ok(BTreeMap::new()),
        Value::Object(map) => Ok(map
            .into_iter()
            .map(|(key, value)| (key, Child::Declared(value)))
            .collect()),
        Value::Array(items) => Ok(items
            .into_iter()
            .enumerate()
            .map(|(index, value)| (index.to_string(), Child::Declared(value)))
            .collect()),
        other => Err(ComponentError::InvalidDefinition {
            component: owner.to_string(),
            found: value_kind(&other).to_string(),
        }
        .into()),
    }
}

/// Short name of a JSON value's kind, for error messages.
pub(crate) const fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "mapping",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::component::Registry;

    fn ctx() -> Context {
        Context::new(Arc::new(crate::resources::builtin_registry()))
    }

    #[tokio::test]
    async fn test_scalar_definition_is_rejected() {
        let err = Definition::Declared(json!("not-a-list"))
            .resolve("stack", &ctx())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::CanopyError::Component(ComponentError::InvalidDefinition { ref component, ref found })
                if component == "stack" && found == "string"
        ));
    }

    #[tokio::test]
    async fn test_list_children_are_keyed_by_index() {
        let value = json!([
            {"type": "group"},
            {"type": "group", "components": {}}
        ]);
        let children = Definition::Declared(value).resolve("stack", &ctx()).await.unwrap();

        assert_eq!(children.keys().collect::<Vec<_>>(), vec!["0", "1"]);
    }

    #[tokio::test]
    async fn test_non_components_are_discarded() {
        let value = json!({
            "label": "just a string",
            "count": 3,
            "nested": {"type": "group"}
        });
        let children = Definition::Declared(value).resolve("stack", &ctx()).await.unwrap();

        assert_eq!(children.len(), 1);
        assert!(children.contains_key("nested"));
    }

    #[tokio::test]
    async fn test_null_definition_is_empty() {
        let children = Definition::Declared(Value::Null)
            .resolve("stack", &ctx())
            .await
            .unwrap();
        assert!(children.is_empty());
    }

    #[tokio::test]
    async fn test_deferred_child_is_awaited() {
        let mut children = BTreeMap::new();
        children.insert(
            String::from("later"),
            Child::deferred(async { Ok(Child::Declared(json!({"type": "group"}))) }),
        );

        let resolved = Definition::Components(children)
            .resolve("stack", &ctx())
            .await
            .unwrap();
        assert_eq!(resolved["later"].type_name(), "group");
    }

    #[tokio::test]
    async fn test_unknown_declared_type_fails() {
        let ctx = Context::new(Arc::new(Registry::new()));
        let err = Definition::Declared(json!({"a": {"type": "bucket"}}))
            .resolve("stack", &ctx)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            crate::error::CanopyError::Component(ComponentError::UnknownType { .. })
        ));
    }
}
