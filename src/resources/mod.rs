//! Built-in resource types.

mod group;
mod topic;

pub use group::{Group, GroupInputs};
pub use topic::{DeliveryProtocol, DeliveryStatus, Topic, TopicInputs};

use crate::component::Registry;

/// Returns a registry with every built-in resource type.
#[must_use]
pub fn builtin_registry() -> Registry {
    let mut registry = Registry::new();
    registry.register::<Topic>().register::<Group>();
    registry
}
