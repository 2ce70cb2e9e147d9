//! The per-resource lifecycle contract.
//!
//! Adapters implement the typed [`Resource`] trait. The engine only ever
//! handles `Box<dyn Reconcilable>`, which every `Resource` gets through a
//! blanket implementation.

use std::any::Any;
use std::fmt::Debug;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ComponentError, Result, StateError};

use super::context::Context;
use super::definition::Definition;

/// Outcome of reconciling a node against live provider state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// The resource exists (or has nothing external to check).
    Active,
    /// The resource no longer exists on the provider.
    Removed,
}

/// What a node needs in order to converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployDecision {
    /// Create the resource, or update it in place.
    Deploy,
    /// An identity field changed; create a new resource and remove the old one.
    Replace,
    /// Nothing to do.
    None,
}

/// Display-oriented summary of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceInfo {
    /// Human-readable title.
    pub title: String,
    /// Resource type label.
    #[serde(rename = "type")]
    pub type_name: String,
    /// Type-specific details.
    pub data: Value,
}

/// Lifecycle hooks implemented by every resource type.
///
/// The serialized form of an instance is what gets persisted as the node's
/// previous state, so runtime identifiers assigned by the provider must be
/// serialized fields.
#[async_trait]
pub trait Resource: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Type tag used in declarations and snapshots.
    const TYPE: &'static str;

    /// Declared inputs accepted by [`Resource::construct`].
    type Inputs: DeserializeOwned + Send;

    /// Validates and normalizes declared inputs. No external calls.
    ///
    /// # Errors
    ///
    /// Returns an error if the inputs are invalid.
    fn construct(inputs: Self::Inputs, ctx: &Context) -> Result<Self>;

    /// Copies the declared-input fields only, leaving runtime identifiers unset.
    #[must_use]
    fn declared(&self) -> Self;

    /// Attaches resolved, provider-assigned fields from a synced instance.
    fn adopt(&mut self, resolved: &Self);

    /// Reconciles this instance against live provider state.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider cannot be queried.
    async fn sync(&mut self, ctx: &Context) -> Result<SyncStatus>;

    /// Returns the child components of this node.
    ///
    /// # Errors
    ///
    /// Returns an error if the children cannot be produced.
    async fn define(&self, _ctx: &Context) -> Result<Definition> {
        Ok(Definition::Empty)
    }

    /// Provider-side identifier of the external resource, once known.
    ///
    /// Two instances reporting the same id address the same external resource.
    fn external_id(&self) -> Option<String> {
        None
    }

    /// Decides how this instance converges from `previous`.
    fn should_deploy(&self, previous: Option<&Self>) -> DeployDecision;

    /// Creates the resource, or updates it in place when `previous` has the same identity.
    ///
    /// # Errors
    ///
    /// Returns the first provider error encountered.
    async fn deploy(&mut self, previous: Option<&Self>, ctx: &Context) -> Result<()>;

    /// Deletes the external resource.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider rejects the deletion.
    async fn remove(&self, ctx: &Context) -> Result<()>;

    /// Summarizes the resource for display.
    async fn info(&self) -> ResourceInfo;
}

/// Type-erased lifecycle used by the hydrator and the reconciler.
#[async_trait]
pub trait Reconcilable: Debug + Send + Sync + 'static {
    /// Type tag of the underlying resource.
    fn type_name(&self) -> &'static str;

    /// Upcast for downcasting to the concrete resource.
    fn as_any(&self) -> &dyn Any;

    /// Deep copy of the declared inputs, without runtime identifiers.
    fn declared_copy(&self) -> Box<dyn Reconcilable>;

    /// Replaces this instance with the persisted one.
    ///
    /// # Errors
    ///
    /// Returns an error if `state` does not describe this resource type.
    fn restore(&mut self, state: &Value) -> Result<()>;

    /// Serializes this instance for the next previous-state snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    fn snapshot(&self) -> Result<Value>;

    /// See [`Resource::adopt`]. Instances of another type are ignored.
    fn adopt(&mut self, resolved: &dyn Reconcilable);

    /// See [`Resource::sync`].
    async fn sync(&mut self, ctx: &Context) -> Result<SyncStatus>;

    /// See [`Resource::define`].
    async fn define(&self, ctx: &Context) -> Result<Definition>;

    /// See [`Resource::external_id`].
    fn external_id(&self) -> Option<String>;

    /// See [`Resource::should_deploy`]. A previous instance of another type
    /// yields [`DeployDecision::Replace`].
    fn should_deploy(&self, previous: Option<&dyn Reconcilable>) -> DeployDecision;

    /// See [`Resource::deploy`].
    async fn deploy(&mut self, previous: Option<&dyn Reconcilable>, ctx: &Context) -> Result<()>;

    /// See [`Resource::remove`].
    async fn remove(&self, ctx: &Context) -> Result<()>;

    /// See [`Resource::info`].
    async fn info(&self) -> ResourceInfo;
}

#[async_trait]
impl<R: Resource> Reconcilable for R {
    fn type_name(&self) -> &'static str {
        R::TYPE
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn declared_copy(&self) -> Box<dyn Reconcilable> {
        Box::new(Resource::declared(self))
    }

    fn restore(&mut self, state: &Value) -> Result<()> {
        let persisted: R = serde_json::from_value(state.clone()).map_err(|e| {
            ComponentError::InvalidState {
                type_name: R::TYPE.to_string(),
                message: e.to_string(),
            }
        })?;
        *self = persisted;
        Ok(())
    }

    fn snapshot(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| {
            StateError::serialization(format!("Failed to serialize {}: {e}", R::TYPE)).into()
        })
    }

    fn adopt(&mut self, resolved: &dyn Reconcilable) {
        if let Some(resolved) = resolved.as_any().downcast_ref::<R>() {
            Resource::adopt(self, resolved);
        }
    }

    async fn sync(&mut self, ctx: &Context) -> Result<SyncStatus> {
        Resource::sync(self, ctx).await
    }

    async fn define(&self, ctx: &Context) -> Result<Definition> {
        Resource::define(self, ctx).await
    }

    fn external_id(&self) -> Option<String> {
        Resource::external_id(self)
    }

    fn should_deploy(&self, previous: Option<&dyn Reconcilable>) -> DeployDecision {
        match previous {
            None => Resource::should_deploy(self, None),
            Some(previous) => previous
                .as_any()
                .downcast_ref::<R>()
                .map_or(DeployDecision::Replace, |previous| {
                    Resource::should_deploy(self, Some(previous))
                }),
        }
    }

    async fn deploy(&mut self, previous: Option<&dyn Reconcilable>, ctx: &Context) -> Result<()> {
        let previous = previous.and_then(|p| p.as_any().downcast_ref::<R>());
        Resource::deploy(self, previous, ctx).await
    }

    async fn remove(&self, ctx: &Context) -> Result<()> {
        Resource::remove(self, ctx).await
    }

    async fn info(&self) -> ResourceInfo {
        Resource::info(self).await
    }
}
