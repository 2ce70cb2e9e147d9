//! Component model and tree hydration.
//!
//! A component describes one desired resource. Hydration expands a root
//! component into a parent-linked tree by running each node's `sync` and
//! `define` hooks and correlating it with the previously deployed tree.

mod context;
mod definition;
mod hydrate;
mod instance;
mod registry;
mod resource;
mod tree;

pub use context::{Context, EngineSettings};
pub use definition::{Child, Definition};
pub use hydrate::{hydrate, ROOT_KEY};
pub use instance::{Component, InstanceId};
pub use registry::{Declaration, Registry};
pub use resource::{DeployDecision, Reconcilable, Resource, ResourceInfo, SyncStatus};
pub use tree::{ComponentTree, Node};
