//! Remote listing backend
//!
//! Nodes are `http://` or `https://` URLs. A URL is a collection when the
//! listing client returns a listing for it; per-entry facts come from the
//! enclosing collection's listing.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{Backend, Node, ResourceNode};
use crate::config::{Config, RemoteContext};
use crate::error::{ConfigError, NodeError};
use crate::path;
use crate::remote::RemoteEntry;

const SCHEMES: [&str; 2] = ["http://", "https://"];

/// An entry in a remote HTTP listing
pub struct RemoteListingNode {
    path: String,
    name: String,
    config: Config,
    context: Arc<RemoteContext>,
    entry: Option<RemoteEntry>,
}

impl RemoteListingNode {
    fn listing(&self) -> Result<Option<Vec<RemoteEntry>>, NodeError> {
        if self.entry.as_ref().is_some_and(|e| !e.collection) {
            return Ok(None);
        }
        let client = &self.context.client;
        Ok(self
            .context
            .listings
            .try_get_or_load(&self.path, |url| client.list(url))?)
    }

    /// This node's entry in its parent's listing
    fn entry(&self) -> Result<Option<RemoteEntry>, NodeError> {
        if let Some(entry) = &self.entry {
            return Ok(Some(entry.clone()));
        }
        let Some(parent) = path::parent_path(&self.path) else {
            return Ok(None);
        };

        let client = &self.context.client;
        let siblings = self
            .context
            .listings
            .try_get_or_load(&parent, |url| client.list(url))?;
        Ok(siblings.and_then(|entries| entries.into_iter().find(|e| e.name == self.name)))
    }
}

impl Backend for RemoteListingNode {
    const TAG: &'static str = "http";

    fn new(normalized_path: String, config: Config) -> Result<Self, ConfigError> {
        let Some(scheme) = SCHEMES.iter().find(|s| normalized_path.starts_with(*s)) else {
            return Err(ConfigError::MalformedPath(format!(
                "expected an http(s) URL: {}",
                normalized_path
            )));
        };
        if normalized_path.len() == scheme.len() {
            return Err(ConfigError::MalformedPath(format!(
                "missing host: {}",
                normalized_path
            )));
        }

        let context = Arc::clone(config.remote()?);
        let name = path::base_name(&normalized_path).to_string();
        Ok(Self {
            path: normalized_path,
            name,
            config,
            context,
            entry: None,
        })
    }
}

impl ResourceNode for RemoteListingNode {
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
        if self.entry.is_some() {
            return Ok(true);
        }
        Ok(self.is_collection()? || self.entry()?.is_some())
    }

    fn is_collection(&self) -> Result<bool, NodeError> {
        if let Some(entry) = &self.entry {
            return Ok(entry.collection);
        }
        Ok(self.listing()?.is_some())
    }

    fn size(&self) -> Result<Option<u64>, NodeError> {
        Ok(self
            .entry()?
            .filter(|e| !e.collection)
            .and_then(|e| e.size))
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, NodeError> {
        Ok(self.entry()?.and_then(|e| e.modified_time()))
    }

    fn parent(&self) -> Result<Option<Node>, ConfigError> {
        path::parent_path(&self.path)
            .map(|parent| Self::new(parent, self.config.clone()).map(Node::new))
            .transpose()
    }

    fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError> {
        Self::new(path::join(&self.path, relative_path), self.config.clone()).map(Node::new)
    }

    fn children(&self) -> Result<Vec<Node>, NodeError> {
        let Some(entries) = self.listing()? else {
            return Ok(Vec::new());
        };

        let mut children = Vec::with_capacity(entries.len());
        for entry in entries {
            if entry.name.is_empty() || entry.name.contains('/') {
                warn!(url = %self.path, name = %entry.name, "Skipping malformed listing entry");
                continue;
            }
            children.push(Node::new(Self {
                path: path::join(&self.path, &entry.name),
                name: entry.name.clone(),
                config: self.config.clone(),
                context: Arc::clone(&self.context),
                entry: Some(entry),
            }));
        }

        debug!(url = %self.path, count = children.len(), "Listed remote collection");
        Ok(children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl fmt::Debug for RemoteListingNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteListingNode")
            .field("path", &self.path)
            .field("entry", &self.entry)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::remote::ListingClient;
    use crate::store::StoreError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FakeListings {
        listings: HashMap<String, Vec<RemoteEntry>>,
        calls: AtomicUsize,
    }

    impl ListingClient for FakeListings {
        fn list(&self, url: &str) -> Result<Option<Vec<RemoteEntry>>, StoreError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.listings.get(url).cloned())
        }
    }

    fn entry(name: &str, collection: bool, size: Option<u64>) -> RemoteEntry {
        RemoteEntry {
            name: name.to_string(),
            collection,
            size,
            last_modified: Some(1_700_000_000_000),
        }
    }

    fn fixture() -> (Arc<FakeListings>, Config) {
        let mut listings = HashMap::new();
        listings.insert(
            "http://host/data".to_string(),
            vec![entry("a.nc", false, Some(12)), entry("sub", true, None)],
        );
        listings.insert("http://host/data/sub".to_string(), vec![entry("b.nc", false, Some(1))]);
        let client = Arc::new(FakeListings {
            listings,
            calls: AtomicUsize::new(0),
        });
        let context = RemoteContext::new(client.clone(), &Settings::default());
        (client, Config::new().with_remote(Arc::new(context)))
    }

    fn node(config: &Config, url: &str) -> Node {
        Node::new(RemoteListingNode::new(path::normalize(url), config.clone()).unwrap())
    }

    #[test]
    fn test_children_carry_listing_facts() {
        let (client, config) = fixture();
        let data = node(&config, "http://host/data/");
        let children = data.list_children(None).unwrap();

        assert_eq!(children.len(), 2);
        assert_eq!(children[0].path(), "http://host/data/a.nc");
        assert_eq!(children[0].size().unwrap(), Some(12));
        assert!(children[0].last_modified().unwrap().is_some());
        assert!(children[1].is_collection().unwrap());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_fresh_node_stats_through_parent_listing() {
        let (client, config) = fixture();
        let a = node(&config, "http://host/data/a.nc");
        assert!(!a.is_collection().unwrap());
        assert!(a.exists().unwrap());
        assert_eq!(a.size().unwrap(), Some(12));
        assert_eq!(a.size().unwrap(), Some(12));
        // one listing probe for a.nc itself, one for its parent
        assert_eq!(client.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_missing_entry() {
        let (_client, config) = fixture();
        let missing = node(&config, "http://host/data/nope");
        assert!(!missing.exists().unwrap());
        assert_eq!(missing.size().unwrap(), None);
    }

    #[test]
    fn test_parent_stops_at_host() {
        let (_client, config) = fixture();
        let host = node(&config, "http://host");
        assert!(host.parent().unwrap().is_none());

        let sub = node(&config, "http://host/data/sub");
        assert_eq!(sub.parent().unwrap().unwrap().path(), "http://host/data");
        assert_eq!(sub.descendant("b.nc").unwrap().path(), "http://host/data/sub/b.nc");
    }

    #[test]
    fn test_rejects_non_http_paths() {
        let (_client, config) = fixture();
        assert!(matches!(
            RemoteListingNode::new("/local/path".to_string(), config.clone()),
            Err(ConfigError::MalformedPath(_))
        ));
        assert!(matches!(
            RemoteListingNode::new("http://".to_string(), config),
            Err(ConfigError::MalformedPath(_))
        ));
        assert!(matches!(
            RemoteListingNode::new("http://host/x".to_string(), Config::new()),
            Err(ConfigError::BadConfig(_))
        ));
    }
}
