//! Registry of resource types that can appear in declarations.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{ComponentError, Result};

use super::context::Context;
use super::definition::value_kind;
use super::instance::Component;
use super::resource::{Reconcilable, Resource};

type ConstructFn = Box<dyn Fn(Value, &Context) -> Result<Box<dyn Reconcilable>> + Send + Sync>;
type RestoreFn = Box<dyn Fn(&Value) -> Result<Box<dyn Reconcilable>> + Send + Sync>;

struct Entry {
    construct: ConstructFn,
    restore: RestoreFn,
}

/// A component declaration: `{"type": ..., "id": ..., ...inputs}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    /// Registered type tag.
    pub type_name: String,
    /// Optional pinned instance id.
    pub id: Option<String>,
    /// Remaining fields, handed to the resource's `construct`.
    pub inputs: Value,
}

impl Declaration {
    /// Interprets a value as a declaration.
    ///
    /// Returns `None` when the value is not an object with a string `type` field.
    #[must_use]
    pub fn from_value(value: Value) -> Option<Self> {
        let Value::Object(mut map) = value else {
            return None;
        };
        let type_name = match map.remove("type") {
            Some(Value::String(type_name)) => type_name,
            _ => return None,
        };
        let id = match map.remove("id") {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };
        Some(Self {
            type_name,
            id,
            inputs: Value::Object(map),
        })
    }
}

/// Maps type tags to constructors and state restorers.
#[derive(Default)]
pub struct Registry {
    entries: HashMap<&'static str, Entry>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a resource type under its `TYPE` tag.
    pub fn register<R: Resource>(&mut self) -> &mut Self {
        let construct: ConstructFn = Box::new(|inputs: Value, ctx: &Context| {
            let inputs: R::Inputs = serde_json::from_value(inputs)
                .map_err(|e| ComponentError::invalid_inputs(R::TYPE, e.to_string()))?;
            Ok(Box::new(R::construct(inputs, ctx)?) as Box<dyn Reconcilable>)
        });
        let restore: RestoreFn = Box::new(|state: &Value| {
            let instance: R = serde_json::from_value(state.clone()).map_err(|e| {
                ComponentError::InvalidState {
                    type_name: R::TYPE.to_string(),
                    message: e.to_string(),
                }
            })?;
            Ok(Box::new(instance) as Box<dyn Reconcilable>)
        });

        self.entries.insert(R::TYPE, Entry { construct, restore });
        self
    }

    /// Returns true if `type_name` is registered.
    #[must_use]
    pub fn contains(&self, type_name: &str) -> bool {
        self.entries.contains_key(type_name)
    }

    /// Registered type tags, sorted.
    #[must_use]
    pub fn types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.entries.keys().copied().collect();
        types.sort_unstable();
        types
    }

    /// Builds a resource from declared inputs.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the inputs are invalid.
    pub fn construct(&self, type_name: &str, inputs: Value, ctx: &Context) -> Result<Box<dyn Reconcilable>> {
        (self.entry(type_name)?.construct)(inputs, ctx)
    }

    /// Rebuilds a resource from its persisted state.
    ///
    /// # Errors
    ///
    /// Returns an error if the type is unknown or the state does not deserialize.
    pub fn restore(&self, type_name: &str, state: &Value) -> Result<Box<dyn Reconcilable>> {
        (self.entry(type_name)?.restore)(state)
    }

    /// Turns a declared value into a component.
    ///
    /// Returns `Ok(None)` when the value is not a declaration.
    ///
    /// # Errors
    ///
    /// Returns an error if the declaration names an unknown type or carries invalid inputs.
    pub fn component_from_value(&self, value: Value, ctx: &Context) -> Result<Option<Component>> {
        let Some(declaration) = Declaration::from_value(value) else {
            return Ok(None);
        };

        let resource = self.construct(&declaration.type_name, declaration.inputs, ctx)?;
        let component = Component::from_boxed(resource);
        Ok(Some(match declaration.id {
            Some(id) => component.with_id(id),
            None => component,
        }))
    }

    /// Turns the configured root value into a component.
    ///
    /// # Errors
    ///
    /// Returns `ComponentError::NotAComponent` if the value is not a declaration.
    pub fn root_component(&self, value: Value, ctx: &Context) -> Result<Component> {
        let rendered = render(&value);
        self.component_from_value(value, ctx)?
            .ok_or_else(|| ComponentError::NotAComponent { value: rendered }.into())
    }

    fn entry(&self, type_name: &str) -> Result<&Entry> {
        self.entries.get(type_name).ok_or_else(|| {
            ComponentError::UnknownType {
                type_name: type_name.to_string(),
            }
            .into()
        })
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("types", &self.types())
            .finish()
    }
}

const MAX_RENDERED_LEN: usize = 60;

fn render(value: &Value) -> String {
    let text = value.to_string();
    if text.chars().count() > MAX_RENDERED_LEN {
        let truncated: String = text.chars().take(MAX_RENDERED_LEN).collect();
        format!("{} {truncated}...", value_kind(value))
    } else {
        format!("{} {text}", value_kind(value))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::error::CanopyError;
    use crate::resources::{Group, Topic, builtin_registry};

    #[test]
    fn test_declaration_parsing() {
        let decl = Declaration::from_value(json!({
            "type": "topic",
            "id": "orders",
            "topicName": "orders"
        }))
        .unwrap();

        assert_eq!(decl.type_name, "topic");
        assert_eq!(decl.id.as_deref(), Some("orders"));
        assert_eq!(decl.inputs, json!({"topicName": "orders"}));

        assert!(Declaration::from_value(json!({"type": 3})).is_none());
        assert!(Declaration::from_value(json!("topic")).is_none());
    }

    #[test]
    fn test_register_and_list_types() {
        let mut registry = Registry::new();
        registry.register::<Topic>().register::<Group>();

        assert!(registry.contains("topic"));
        assert!(!registry.contains("queue"));
        assert_eq!(registry.types(), vec!["group", "topic"]);
    }

    #[test]
    fn test_root_must_be_a_component() {
        let registry = Arc::new(builtin_registry());
        let ctx = Context::new(Arc::clone(&registry));

        let err = registry.root_component(json!(["a", "b"]), &ctx).unwrap_err();
        assert!(matches!(
            err,
            CanopyError::Component(ComponentError::NotAComponent { ref value }) if value.starts_with("list")
        ));
    }

    #[test]
    fn test_pinned_id_is_kept() {
        let registry = Arc::new(builtin_registry());
        let ctx = Context::new(Arc::clone(&registry));

        let component = registry
            .root_component(json!({"type": "group", "id": "stack"}), &ctx)
            .unwrap();
        assert_eq!(component.instance_id().map(|id| id.as_str()), Some("stack"));
    }

    #[test]
    fn test_invalid_inputs_are_reported() {
        let registry = Arc::new(builtin_registry());
        let ctx = Context::new(Arc::clone(&registry));

        let err = registry
            .construct("topic", json!({"topicName": "orders", "colour": "red"}), &ctx)
            .unwrap_err();
        assert!(matches!(
            err,
            CanopyError::Component(ComponentError::InvalidInputs { .. })
        ));
    }
}
