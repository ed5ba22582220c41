//! In-memory object store with call counters, for tests.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::client::{Listing, Metadata, ObjectStoreClient, ObjectSummary};
use super::errors::StoreError;
use super::uri::ResourceUri;

pub struct MemoryStore {
    bucket: String,
    objects: BTreeMap<String, Vec<u8>>,
    pub metadata_calls: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fetch_calls: AtomicUsize,
    /// When set, every call fails with a timeout
    pub offline: AtomicBool,
    /// Keys under these prefixes fail with a timeout
    failing: Mutex<Vec<String>>,
}

impl MemoryStore {
    pub fn new(bucket: &str, keys: &[(&str, &[u8])]) -> Self {
        Self {
            bucket: bucket.to_string(),
            objects: keys
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_vec()))
                .collect(),
            metadata_calls: AtomicUsize::new(0),
            list_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            offline: AtomicBool::new(false),
            failing: Mutex::new(Vec::new()),
        }
    }

    fn mtime(key: &str) -> SystemTime {
        UNIX_EPOCH + Duration::from_secs(1_700_000_000 + key.len() as u64)
    }

    /// Make every call on a key starting with `prefix` time out
    pub fn fail_under(&self, prefix: &str) {
        self.failing.lock().unwrap().push(prefix.to_string());
    }

    fn check_online(&self, uri: &ResourceUri) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Timeout);
        }
        let key = uri.key().unwrap_or_default();
        if self.failing.lock().unwrap().iter().any(|p| key.starts_with(p.as_str())) {
            return Err(StoreError::Timeout);
        }
        Ok(())
    }
}

impl ObjectStoreClient for MemoryStore {
    fn get_metadata(&self, uri: &ResourceUri) -> Result<Option<Metadata>, StoreError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online(uri)?;
        if uri.bucket() != self.bucket {
            return Ok(None);
        }
        let key = uri.key().unwrap_or_default();
        Ok(self.objects.get(key).map(|data| Metadata {
            key: key.to_string(),
            size: data.len() as u64,
            last_modified: Self::mtime(key),
            content_type: None,
        }))
    }

    fn list(&self, uri: &ResourceUri, delimiter: &str) -> Result<Option<Listing>, StoreError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online(uri)?;
        if uri.bucket() != self.bucket {
            return Ok(None);
        }

        let prefix = uri.key().unwrap_or_default();
        let mut listing = Listing::default();
        for (key, data) in self.objects.range(prefix.to_string()..) {
            let Some(rest) = key.strip_prefix(prefix) else {
                break;
            };
            if rest.is_empty() {
                continue;
            }
            match rest.find(delimiter) {
                Some(idx) => {
                    let common = format!("{}{}", prefix, &rest[..idx + delimiter.len()]);
                    if listing.common_prefixes.last() != Some(&common) {
                        listing.common_prefixes.push(common);
                    }
                }
                None => listing.objects.push(ObjectSummary {
                    key: key.clone(),
                    size: data.len() as u64,
                    last_modified: Self::mtime(key),
                }),
            }
        }

        Ok(if listing.is_empty() { None } else { Some(listing) })
    }

    fn fetch(&self, uri: &ResourceUri, dest: &Path) -> Result<(), StoreError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online(uri)?;
        let key = uri.key().unwrap_or_default();
        match self.objects.get(key) {
            Some(data) if uri.bucket() == self.bucket => {
                std::fs::write(dest, data)?;
                Ok(())
            }
            _ => Err(StoreError::NotFound(uri.to_string())),
        }
    }
}
