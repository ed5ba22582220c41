//! Configuration
//!
//! [`Settings`] are process-wide knobs read once by the composition root.
//! [`Config`] is the opaque per-call value handed to node constructors; it
//! carries the backend contexts (clients and caches) a node may need.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::cache::{BoundedCache, FileCache};
use crate::error::ConfigError;
use crate::remote::{ListingClient, RemoteEntry};
use crate::store::{Listing, Metadata, ObjectStoreClient, ResourceUri};

/// Environment variable naming a JSON settings file
pub const SETTINGS_ENV: &str = "RESOURCE_TREE_SETTINGS";

fn deserialize_secs<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
}

/// Bounds for one cache: whichever is hit first evicts
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Maximum number of entries
    pub max_entries: u64,
    /// Evict entries not accessed for this long
    #[serde(rename = "time_to_idle_secs", default, deserialize_with = "deserialize_secs")]
    pub time_to_idle: Option<Duration>,
}

impl CacheConfig {
    pub fn new(max_entries: u64, time_to_idle: Option<Duration>) -> Self {
        Self {
            max_entries,
            time_to_idle,
        }
    }
}

/// Process-wide settings
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub metadata_cache: CacheConfig,
    pub listing_cache: CacheConfig,
    pub file_cache: CacheConfig,
    pub remote_cache: CacheConfig,
    /// Root for downloaded objects (defaults to the platform cache dir)
    pub file_cache_dir: Option<PathBuf>,
    pub request_timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            metadata_cache: CacheConfig::new(10_000, Some(Duration::from_secs(600))),
            listing_cache: CacheConfig::new(1_000, Some(Duration::from_secs(300))),
            file_cache: CacheConfig::new(100, Some(Duration::from_secs(1800))),
            remote_cache: CacheConfig::new(1_000, Some(Duration::from_secs(300))),
            file_cache_dir: None,
            request_timeout_secs: 30,
        }
    }
}

impl Settings {
    /// Load settings from a JSON file; missing fields keep their defaults
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::BadConfig(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&text)
            .map_err(|e| ConfigError::BadConfig(format!("{}: {}", path.display(), e)))
    }

    /// Settings from the file named by `RESOURCE_TREE_SETTINGS`, or defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        match std::env::var_os(SETTINGS_ENV) {
            Some(path) => Self::load(Path::new(&path)),
            None => Ok(Self::default()),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Client and caches shared by object-store nodes
pub struct ObjectStoreContext {
    pub client: Arc<dyn ObjectStoreClient>,
    pub metadata: BoundedCache<ResourceUri, Metadata>,
    pub listings: BoundedCache<ResourceUri, Listing>,
    pub files: FileCache<ResourceUri>,
}

impl ObjectStoreContext {
    pub fn new(client: Arc<dyn ObjectStoreClient>, settings: &Settings) -> io::Result<Self> {
        let files = match &settings.file_cache_dir {
            Some(dir) => FileCache::with_dir(dir.clone(), &settings.file_cache)?,
            None => FileCache::new(&settings.file_cache)?,
        };
        Ok(Self {
            client,
            metadata: BoundedCache::new("object_metadata", &settings.metadata_cache),
            listings: BoundedCache::new("object_listings", &settings.listing_cache),
            files,
        })
    }

    /// Flush every cache, deleting unleased downloaded files
    pub fn shutdown(&self) {
        self.metadata.log_metrics();
        self.listings.log_metrics();
        self.files.log_metrics();
        self.metadata.invalidate_all();
        self.listings.invalidate_all();
        self.files.clear();
    }
}

/// Client and cache shared by remote-listing nodes
pub struct RemoteContext {
    pub client: Arc<dyn ListingClient>,
    pub listings: BoundedCache<String, Vec<RemoteEntry>>,
}

impl RemoteContext {
    pub fn new(client: Arc<dyn ListingClient>, settings: &Settings) -> Self {
        Self {
            client,
            listings: BoundedCache::new("remote_listings", &settings.remote_cache),
        }
    }
}

/// Opaque per-call configuration passed to node constructors
#[derive(Clone, Default)]
pub struct Config {
    object_store: Option<Arc<ObjectStoreContext>>,
    remote: Option<Arc<RemoteContext>>,
    options: Arc<Value>,
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object_store(mut self, context: Arc<ObjectStoreContext>) -> Self {
        self.object_store = Some(context);
        self
    }

    pub fn with_remote(mut self, context: Arc<RemoteContext>) -> Self {
        self.remote = Some(context);
        self
    }

    /// Attach free-form options for backends and strategies
    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Arc::new(options);
        self
    }

    pub fn object_store(&self) -> Result<&Arc<ObjectStoreContext>, ConfigError> {
        self.object_store
            .as_ref()
            .ok_or_else(|| ConfigError::BadConfig("no object store client configured".to_string()))
    }

    pub fn remote(&self) -> Result<&Arc<RemoteContext>, ConfigError> {
        self.remote
            .as_ref()
            .ok_or_else(|| ConfigError::BadConfig("no remote listing client configured".to_string()))
    }

    pub fn options(&self) -> &Value {
        &self.options
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("object_store", &self.object_store.is_some())
            .field("remote", &self.remote.is_some())
            .field("options", &self.options)
            .finish()
    }
}
