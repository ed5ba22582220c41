//! Object-store backend
//!
//! Keys are flat; `/` is treated as a directory delimiter. A key is a
//! collection when listing it as a prefix yields anything, and the bucket
//! root always is. Metadata and listings go through the shared caches in
//! [`ObjectStoreContext`], so repeated queries for the same URI hit the
//! client once.

use std::any::Any;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tracing::debug;

use super::{Backend, Node, ResourceNode};
use crate::cache::FileLease;
use crate::config::{Config, ObjectStoreContext};
use crate::error::{ConfigError, NodeError};
use crate::path;
use crate::store::{Listing, Metadata, ObjectStoreClient, ResourceUri, StoreError, DELIMITER};

/// What a parent listing already told us about a child
#[derive(Debug, Clone, Copy)]
struct Hint {
    collection: bool,
    size: Option<u64>,
    last_modified: Option<SystemTime>,
}

/// A key or virtual directory in an object store bucket
pub struct ObjectStoreNode {
    path: String,
    name: String,
    uri: ResourceUri,
    config: Config,
    context: Arc<ObjectStoreContext>,
    hint: Option<Hint>,
}

impl ObjectStoreNode {
    pub fn uri(&self) -> &ResourceUri {
        &self.uri
    }

    /// Lease on a locally cached copy of the object; `None` if it does not
    /// exist. The file stays on disk at least until the lease is dropped.
    pub fn open_cached(&self) -> Result<Option<FileLease>, NodeError> {
        let client = &self.context.client;
        self.context
            .files
            .get_or_fetch(&self.uri, &self.name, |uri, dest| fetch_object(client.as_ref(), uri, dest))
    }

    /// Copy the object to `dest`; `None` if it does not exist
    pub fn fetch_to(&self, dest: &Path) -> Result<Option<PathBuf>, NodeError> {
        let client = &self.context.client;
        self.context
            .files
            .store_to(&self.uri, &self.name, dest, |uri, dest| fetch_object(client.as_ref(), uri, dest))
    }

    fn child(&self, name: &str, hint: Hint) -> Node {
        Node::new(Self {
            path: path::join(&self.path, name),
            name: name.to_string(),
            uri: self.uri.child(name),
            config: self.config.clone(),
            context: Arc::clone(&self.context),
            hint: Some(hint),
        })
    }

    fn listing(&self) -> Result<Option<Listing>, NodeError> {
        if self.hint.is_some_and(|h| !h.collection) {
            return Ok(None);
        }

        let prefix = self.uri.directory_prefix(DELIMITER);
        let client = &self.context.client;
        Ok(self
            .context
            .listings
            .try_get_or_load(&prefix, |p| client.list(p, DELIMITER))?)
    }

    fn metadata(&self) -> Result<Option<Metadata>, NodeError> {
        if self.uri.is_bucket_root() {
            return Ok(None);
        }

        let client = &self.context.client;
        Ok(self
            .context
            .metadata
            .try_get_or_load(&self.uri, |uri| client.get_metadata(uri))?)
    }
}

fn fetch_object(
    client: &dyn ObjectStoreClient,
    uri: &ResourceUri,
    dest: &Path,
) -> Result<bool, StoreError> {
    match client.fetch(uri, dest) {
        Ok(()) => Ok(true),
        Err(StoreError::NotFound(_)) => Ok(false),
        Err(e) => Err(e),
    }
}

impl Backend for ObjectStoreNode {
    const TAG: &'static str = "s3";

    fn new(normalized_path: String, config: Config) -> Result<Self, ConfigError> {
        let uri = ResourceUri::parse(&normalized_path)?;
        let context = Arc::clone(config.object_store()?);
        let name = uri.base_name().to_string();

        Ok(Self {
            path: normalized_path,
            name,
            uri,
            config,
            context,
            hint: None,
        })
    }
}

impl ResourceNode for ObjectStoreNode {
    fn backend(&self) -> &'static str {
        Self::TAG
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn config(&self) -> &Config {
        &self.config
    }

    fn exists(&self) -> Result<bool, NodeError> {
        if self.hint.is_some() || self.uri.is_bucket_root() {
            return Ok(true);
        }
        Ok(self.metadata()?.is_some() || self.is_collection()?)
    }

    fn is_collection(&self) -> Result<bool, NodeError> {
        if let Some(hint) = self.hint {
            return Ok(hint.collection);
        }
        if self.uri.is_bucket_root() {
            return Ok(true);
        }
        Ok(self.listing()?.is_some())
    }

    fn size(&self) -> Result<Option<u64>, NodeError> {
        match self.hint {
            Some(hint) if hint.collection => Ok(None),
            Some(hint) if hint.size.is_some() => Ok(hint.size),
            _ => Ok(self.metadata()?.map(|m| m.size)),
        }
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, NodeError> {
        match self.hint {
            Some(hint) if hint.collection => Ok(None),
            Some(hint) if hint.last_modified.is_some() => Ok(hint.last_modified),
            _ => Ok(self.metadata()?.map(|m| m.last_modified)),
        }
    }

    fn parent(&self) -> Result<Option<Node>, ConfigError> {
        self.uri
            .parent()
            .map(|parent| Self::new(parent.to_string(), self.config.clone()).map(Node::new))
            .transpose()
    }

    fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError> {
        Self::new(path::join(&self.path, relative_path), self.config.clone()).map(Node::new)
    }

    fn children(&self) -> Result<Vec<Node>, NodeError> {
        let Some(listing) = self.listing()? else {
            return Ok(Vec::new());
        };

        let prefix = self.uri.directory_prefix(DELIMITER);
        let prefix_key = prefix.key().unwrap_or_default();
        let mut children = Vec::with_capacity(listing.common_prefixes.len() + listing.objects.len());

        for common in &listing.common_prefixes {
            let name = common
                .strip_prefix(prefix_key)
                .unwrap_or(common)
                .trim_end_matches(DELIMITER);
            if name.is_empty() {
                continue;
            }
            children.push(self.child(
                name,
                Hint {
                    collection: true,
                    size: None,
                    last_modified: None,
                },
            ));
        }

        for object in &listing.objects {
            let name = object.key.strip_prefix(prefix_key).unwrap_or(&object.key);
            if name.is_empty() || name.contains(DELIMITER) {
                continue;
            }

            let child_uri = self.uri.child(name);
            self.context.metadata.insert(
                child_uri,
                Some(Metadata {
                    key: object.key.clone(),
                    size: object.size,
                    last_modified: object.last_modified,
                    content_type: None,
                }),
            );

            children.push(self.child(
                name,
                Hint {
                    collection: false,
                    size: Some(object.size),
                    last_modified: Some(object.last_modified),
                },
            ));
        }

        debug!(uri = %self.uri, count = children.len(), "Listed object store prefix");
        Ok(children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for ObjectStoreNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectStoreNode")
            .field("path", &self.path)
            .field("uri", &self.uri)
            .field("hint", &self.hint)
            .finish()
    }
}
