//! The hydrated component tree.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::state::StateNode;

use super::instance::InstanceId;
use super::resource::{DeployDecision, Reconcilable};

/// A hydrated node: the desired resource paired with its reconciled previous instance.
#[derive(Debug)]
pub struct Node {
    pub(crate) instance_id: InstanceId,
    pub(crate) key: String,
    pub(crate) path: String,
    pub(crate) parent: Option<InstanceId>,
    pub(crate) resource: Box<dyn Reconcilable>,
    pub(crate) previous: Option<Box<dyn Reconcilable>>,
    pub(crate) children: BTreeMap<String, Node>,
}

impl Node {
    /// Stable instance id.
    #[must_use]
    pub const fn instance_id(&self) -> &InstanceId {
        &self.instance_id
    }

    /// Key under which the parent defined this node.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Slash-separated key path from the root.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Id of the owning node, `None` for the root.
    #[must_use]
    pub const fn parent(&self) -> Option<&InstanceId> {
        self.parent.as_ref()
    }

    /// Type tag of the resource.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.resource.type_name()
    }

    /// Desired resource, with resolved fields adopted.
    #[must_use]
    pub fn resource(&self) -> &dyn Reconcilable {
        self.resource.as_ref()
    }

    /// Previous instance after sync, `None` if new or removed out-of-band.
    #[must_use]
    pub fn previous(&self) -> Option<&dyn Reconcilable> {
        self.previous.as_deref()
    }

    /// Children keyed by name.
    #[must_use]
    pub const fn children(&self) -> &BTreeMap<String, Self> {
        &self.children
    }

    /// Looks up a direct child.
    #[must_use]
    pub fn child(&self, key: &str) -> Option<&Self> {
        self.children.get(key)
    }

    /// Convergence decision for this node.
    #[must_use]
    pub fn decision(&self) -> DeployDecision {
        self.resource.should_deploy(self.previous())
    }

    fn snapshot(&self) -> Result<StateNode> {
        let mut children = BTreeMap::new();
        for (key, child) in &self.children {
            children.insert(key.clone(), child.snapshot()?);
        }
        Ok(StateNode {
            instance_id: self.instance_id.clone(),
            type_name: self.type_name().to_string(),
            state: self.resource.snapshot()?,
            children,
        })
    }
}

/// A fully hydrated component tree.
#[derive(Debug)]
pub struct ComponentTree {
    pub(crate) root: Node,
}

impl ComponentTree {
    /// Root node.
    #[must_use]
    pub const fn root(&self) -> &Node {
        &self.root
    }

    /// Finds a node by instance id.
    #[must_use]
    pub fn find(&self, id: &InstanceId) -> Option<&Node> {
        self.iter().find(|node| &node.instance_id == id)
    }

    /// Finds the owner of the node with the given id.
    #[must_use]
    pub fn parent_of(&self, id: &InstanceId) -> Option<&Node> {
        self.find(id)
            .and_then(|node| node.parent.as_ref())
            .and_then(|parent| self.find(parent))
    }

    /// Number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.iter().count()
    }

    /// A tree always has a root.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        false
    }

    /// Pre-order traversal.
    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        let mut stack = vec![&self.root];
        std::iter::from_fn(move || {
            let node = stack.pop()?;
            stack.extend(node.children.values().rev());
            Some(node)
        })
    }

    /// Persisted form of the desired tree.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource fails to serialize.
    pub fn snapshot(&self) -> Result<StateNode> {
        self.root.snapshot()
    }
}
