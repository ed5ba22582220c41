//! Node construction
//!
//! The registry maps backend tags to constructors; the factory normalizes
//! paths and routes wildcard paths to alias expansion.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::{AliasNode, Backend, LocalFileNode, Node, ObjectStoreNode, RemoteListingNode};
use crate::config::Config;
use crate::error::ConfigError;
use crate::path;

/// Builds a node from a normalized, wildcard-free path
pub type Constructor = fn(String, Config) -> Result<Node, ConfigError>;

/// Backend used when the tag is empty
pub const DEFAULT_BACKEND: &str = LocalFileNode::TAG;

fn construct<B: Backend>(path: String, config: Config) -> Result<Node, ConfigError> {
    B::new(path, config).map(Node::new)
}

/// Backend tag to constructor mapping
#[derive(Clone)]
pub struct BackendRegistry {
    constructors: HashMap<String, Constructor>,
}

impl BackendRegistry {
    /// A registry with no backends
    pub fn empty() -> Self {
        Self {
            constructors: HashMap::new(),
        }
    }

    /// Local files, object store and remote listings
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry
            .register::<LocalFileNode>()
            .register::<ObjectStoreNode>()
            .register::<RemoteListingNode>()
            .register_constructor("https", construct::<RemoteListingNode>);
        registry
    }

    /// Register `B` under its own tag
    pub fn register<B: Backend>(&mut self) -> &mut Self {
        self.register_constructor(B::TAG, construct::<B>)
    }

    /// Register a constructor under `tag`, replacing any previous one
    pub fn register_constructor(&mut self, tag: &str, constructor: Constructor) -> &mut Self {
        self.constructors.insert(tag.to_string(), constructor);
        self
    }

    /// Constructor for `tag`; the empty tag means the local backend
    pub fn resolve(&self, tag: &str) -> Result<Constructor, ConfigError> {
        let tag = if tag.is_empty() { DEFAULT_BACKEND } else { tag };
        self.constructors
            .get(tag)
            .copied()
            .ok_or_else(|| ConfigError::UnknownBackend(tag.to_string()))
    }

    /// Registered tags, sorted
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for BackendRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}

/// Creates nodes through a shared registry
#[derive(Debug, Clone, Default)]
pub struct NodeFactory {
    registry: Arc<BackendRegistry>,
}

impl NodeFactory {
    pub fn new(registry: BackendRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Create the node for `raw_path` on the backend named by `backend`.
    ///
    /// Paths containing `*` become alias nodes over that backend. All
    /// configuration problems surface here rather than on first use.
    pub fn create(&self, backend: &str, raw_path: &str, config: Config) -> Result<Node, ConfigError> {
        let path = path::normalize(raw_path);
        if path.is_empty() {
            return Err(ConfigError::MalformedPath("empty path".to_string()));
        }

        let constructor = self.registry.resolve(backend)?;

        if path::is_alias(&path) {
            debug!(backend = backend, path = %path, "Creating alias node");
            return AliasNode::new(self, backend, path, config).map(Node::new);
        }

        debug!(backend = backend, path = %path, "Creating node");
        constructor(path, config)
    }
}

/// Create a node using the default backends
pub fn create(backend: &str, raw_path: &str, config: Config) -> Result<Node, ConfigError> {
    NodeFactory::default().create(backend, raw_path, config)
}
