//! Resource nodes
//!
//! A [`Node`] is a cheap handle to one entry in some hierarchy: a local
//! file, an object-store key or virtual directory, an entry in a remote
//! listing, or the expansion of a wildcard alias. Backends implement
//! [`ResourceNode`]; the ones reachable through the factory also implement
//! [`Backend`].

pub mod alias;
pub mod factory;
pub mod local;
pub mod object_store;
pub mod remote;

use std::any::Any;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::SystemTime;

use crate::config::Config;
use crate::error::{ConfigError, NodeError};
use crate::strategy::Filter;

pub use alias::{AliasExpander, AliasNode, AliasSpec};
pub use factory::{create, BackendRegistry, Constructor, NodeFactory, DEFAULT_BACKEND};
pub use local::LocalFileNode;
pub use object_store::ObjectStoreNode;
pub use remote::RemoteListingNode;

/// Capabilities every node variant provides
pub trait ResourceNode: Send + Sync + fmt::Debug {
    /// Backend tag; together with the path this is the node's identity
    fn backend(&self) -> &'static str;

    /// Normalized path
    fn path(&self) -> &str;

    /// Last path segment
    fn name(&self) -> &str;

    fn config(&self) -> &Config;

    fn exists(&self) -> Result<bool, NodeError>;

    fn is_collection(&self) -> Result<bool, NodeError>;

    /// Size in bytes; `None` for collections or when unknown
    fn size(&self) -> Result<Option<u64>, NodeError>;

    fn last_modified(&self) -> Result<Option<SystemTime>, NodeError>;

    /// Rebuild the parent from the parent path; `None` at a root
    fn parent(&self) -> Result<Option<Node>, ConfigError>;

    /// Build the node at `relative_path` below this one
    fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError>;

    /// Immediate children in backend order. Only called on collections.
    fn children(&self) -> Result<Vec<Node>, NodeError>;

    fn as_any(&self) -> &dyn Any;
}

/// A node variant constructible by the factory from a path and a config
pub trait Backend: ResourceNode + Sized + 'static {
    /// Tag the default registry maps to this backend
    const TAG: &'static str;

    fn new(normalized_path: String, config: Config) -> Result<Self, ConfigError>;
}

/// Shared handle to a node of any backend
#[derive(Clone)]
pub struct Node {
    inner: Arc<dyn ResourceNode>,
}

impl Node {
    pub fn new<N: ResourceNode + 'static>(node: N) -> Self {
        Self {
            inner: Arc::new(node),
        }
    }

    pub fn backend(&self) -> &'static str {
        self.inner.backend()
    }

    pub fn path(&self) -> &str {
        self.inner.path()
    }

    pub fn name(&self) -> &str {
        self.inner.name()
    }

    pub fn config(&self) -> &Config {
        self.inner.config()
    }

    pub fn exists(&self) -> Result<bool, NodeError> {
        self.inner.exists()
    }

    pub fn is_collection(&self) -> Result<bool, NodeError> {
        self.inner.is_collection()
    }

    pub fn size(&self) -> Result<Option<u64>, NodeError> {
        self.inner.size()
    }

    pub fn last_modified(&self) -> Result<Option<SystemTime>, NodeError> {
        self.inner.last_modified()
    }

    pub fn parent(&self) -> Result<Option<Node>, ConfigError> {
        self.inner.parent()
    }

    pub fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError> {
        self.inner.descendant(relative_path)
    }

    /// List immediate children, keeping those `filter` accepts.
    ///
    /// Fails with [`NodeError::IllegalState`] on a non-collection. Without a
    /// filter every child is returned in backend order.
    pub fn list_children(&self, filter: Option<&dyn Filter>) -> Result<Vec<Node>, NodeError> {
        if !self.is_collection()? {
            return Err(NodeError::IllegalState(format!(
                "not a collection: {}",
                self.path()
            )));
        }

        let children = self.inner.children()?;
        Ok(match filter {
            None => children,
            Some(filter) => children.into_iter().filter(|c| filter.accept(c)).collect(),
        })
    }

    /// Access the concrete backend type
    pub fn downcast_ref<T: ResourceNode + 'static>(&self) -> Option<&T> {
        self.inner.as_any().downcast_ref::<T>()
    }
}

impl fmt::Debug for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Node")
            .field("backend", &self.backend())
            .field("path", &self.path())
            .finish()
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.backend() == other.backend() && self.path() == other.path()
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.backend().hash(state);
        self.path().hash(state);
    }
}
