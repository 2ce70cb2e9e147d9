//! A composite component with no external resource of its own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::component::{Context, Definition, DeployDecision, Resource, ResourceInfo, SyncStatus};
use crate::error::Result;

/// Groups declared child components under one key.
///
/// A group only exists in the state snapshot: it is created on its first
/// deployment and has nothing to update afterwards.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Group {
    /// Declared children: a mapping, a list, or null.
    #[serde(default, skip_serializing)]
    pub components: Value,
    #[serde(default)]
    deployed: bool,
}

/// Declared inputs of a [`Group`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GroupInputs {
    /// Declared children.
    #[serde(default)]
    pub components: Value,
}

impl Group {
    /// Creates a group around declared children.
    #[must_use]
    pub fn new(components: Value) -> Self {
        Self {
            components,
            deployed: false,
        }
    }
}

#[async_trait]
impl Resource for Group {
    const TYPE: &'static str = "group";
    type Inputs = GroupInputs;

    fn construct(inputs: GroupInputs, _ctx: &Context) -> Result<Self> {
        Ok(Self::new(inputs.components))
    }

    fn declared(&self) -> Self {
        Self::new(self.components.clone())
    }

    fn adopt(&mut self, resolved: &Self) {
        self.deployed = resolved.deployed;
    }

    async fn sync(&mut self, _ctx: &Context) -> Result<SyncStatus> {
        if self.deployed {
            Ok(SyncStatus::Active)
        } else {
            Ok(SyncStatus::Removed)
        }
    }

    async fn define(&self, _ctx: &Context) -> Result<Definition> {
        Ok(Definition::Declared(self.components.clone()))
    }

    fn should_deploy(&self, previous: Option<&Self>) -> DeployDecision {
        if previous.is_some() {
            DeployDecision::None
        } else {
            DeployDecision::Deploy
        }
    }

    async fn deploy(&mut self, _previous: Option<&Self>, _ctx: &Context) -> Result<()> {
        self.deployed = true;
        Ok(())
    }

    async fn remove(&self, _ctx: &Context) -> Result<()> {
        Ok(())
    }

    async fn info(&self) -> ResourceInfo {
        let children = match &self.components {
            Value::Object(map) => map.len(),
            Value::Array(items) => items.len(),
            _ => 0,
        };
        ResourceInfo {
            title: String::from("group"),
            type_name: String::from("Group"),
            data: json!({ "declaredChildren": children }),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::component::Registry;

    #[tokio::test]
    async fn test_group_is_created_once() {
        let ctx = Context::new(Arc::new(Registry::new()));
        let mut group = Group::new(json!({}));

        assert_eq!(group.should_deploy(None), DeployDecision::Deploy);
        group.deploy(None, &ctx).await.unwrap();

        let mut restored = group.declared();
        assert_eq!(restored.sync(&ctx).await.unwrap(), SyncStatus::Removed);

        let mut persisted: Group = serde_json::from_value(serde_json::to_value(&group).unwrap()).unwrap();
        assert_eq!(persisted.sync(&ctx).await.unwrap(), SyncStatus::Active);
        assert_eq!(group.should_deploy(Some(&persisted)), DeployDecision::None);
    }
}
