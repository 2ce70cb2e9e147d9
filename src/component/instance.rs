//! Component identity and the unhydrated component value.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::resource::{Reconcilable, Resource};

/// Number of hex characters kept from the derivation hash.
const DERIVED_SUFFIX_LEN: usize = 12;

/// Stable identifier of a component instance.
///
/// Ids survive across reconciliation passes: a node correlated with a
/// previous-state node keeps that node's id, and fresh ids are derived
/// deterministically from the parent id and the child key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceId(String);

impl InstanceId {
    /// Wraps an explicit identifier.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Derives the id of the child stored under `key` beneath `parent`.
    #[must_use]
    pub fn derive(parent: Option<&Self>, key: &str) -> Self {
        let mut hasher = Sha256::new();
        if let Some(parent) = parent {
            hasher.update(parent.0.as_bytes());
        }
        hasher.update(b"/");
        hasher.update(key.as_bytes());

        let digest = hex::encode(hasher.finalize());
        Self(format!("{key}-{}", &digest[..DERIVED_SUFFIX_LEN]))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for InstanceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for InstanceId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for InstanceId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// A desired component before hydration.
///
/// `parent` is a non-owning link to the component that attached this one.
/// A component returned from `define` must not carry a parent yet.
#[derive(Debug)]
pub struct Component {
    instance_id: Option<InstanceId>,
    parent: Option<InstanceId>,
    resource: Box<dyn Reconcilable>,
}

impl Component {
    /// Creates a component around a typed resource.
    #[must_use]
    pub fn new<R: Resource>(resource: R) -> Self {
        Self::from_boxed(Box::new(resource))
    }

    /// Creates a component around an already type-erased resource.
    #[must_use]
    pub fn from_boxed(resource: Box<dyn Reconcilable>) -> Self {
        Self {
            instance_id: None,
            parent: None,
            resource,
        }
    }

    /// Pins an explicit instance id.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<InstanceId>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Marks the component as owned by `parent`.
    #[must_use]
    pub fn attached_to(mut self, parent: InstanceId) -> Self {
        self.parent = Some(parent);
        self
    }

    /// Explicit instance id, if one was pinned.
    #[must_use]
    pub const fn instance_id(&self) -> Option<&InstanceId> {
        self.instance_id.as_ref()
    }

    /// Current owner, if attached.
    #[must_use]
    pub const fn parent(&self) -> Option<&InstanceId> {
        self.parent.as_ref()
    }

    /// Type tag of the wrapped resource.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    /// Borrows the wrapped resource.
    #[must_use]
    pub fn resource(&self) -> &dyn Reconcilable {
        self.resource.as_ref()
    }

    pub(crate) fn into_parts(self) -> (Option<InstanceId>, Box<dyn Reconcilable>) {
        (self.instance_id, self.resource)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_id_is_deterministic() {
        let parent = InstanceId::new("root");
        let first = InstanceId::derive(Some(&parent), "orders");
        let second = InstanceId::derive(Some(&parent), "orders");

        assert_eq!(first, second);
        assert!(first.as_str().starts_with("orders-"));
    }

    #[test]
    fn test_derived_id_depends_on_parent() {
        let a = InstanceId::derive(Some(&InstanceId::new("a")), "child");
        let b = InstanceId::derive(Some(&InstanceId::new("b")), "child");
        let root = InstanceId::derive(None, "child");

        assert_ne!(a, b);
        assert_ne!(a, root);
    }
}
