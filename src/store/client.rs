//! Request/response boundary to an object store.
//!
//! Absence is `Ok(None)`, never an error, so that known-missing keys can be
//! cached. Transport, auth and timeout failures are `Err`.

use std::path::Path;
use std::time::SystemTime;

use super::errors::StoreError;
use super::uri::ResourceUri;

/// Default listing page size; listings are not auto-paginated
pub const DEFAULT_PAGE_SIZE: u32 = 1000;

/// Delimiter used for virtual directory listings
pub const DELIMITER: &str = "/";

/// Metadata for a single object
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub key: String,
    pub size: u64,
    pub last_modified: SystemTime,
    pub content_type: Option<String>,
}

/// One object returned by a listing
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectSummary {
    pub key: String,
    pub size: u64,
    pub last_modified: SystemTime,
}

/// Delimited listing of a virtual directory
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Listing {
    /// Keys ending with the delimiter, one per immediate sub-directory
    pub common_prefixes: Vec<String>,
    /// Objects directly under the listed prefix
    pub objects: Vec<ObjectSummary>,
}

impl Listing {
    pub fn is_empty(&self) -> bool {
        self.common_prefixes.is_empty() && self.objects.is_empty()
    }
}

/// Object-store client used by object-store nodes.
///
/// Calls block the current thread and may be issued from any thread.
pub trait ObjectStoreClient: Send + Sync {
    /// Metadata for `uri`; `Ok(None)` if there is no such key
    fn get_metadata(&self, uri: &ResourceUri) -> Result<Option<Metadata>, StoreError>;

    /// Delimited listing under `uri`'s key; `Ok(None)` if the key denotes no
    /// virtual directory. At most one page is returned.
    fn list(&self, uri: &ResourceUri, delimiter: &str) -> Result<Option<Listing>, StoreError>;

    /// Download the object bytes to `dest`
    fn fetch(&self, uri: &ResourceUri, dest: &Path) -> Result<(), StoreError>;
}
