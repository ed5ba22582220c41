//! Local File Cache
//!
//! Keeps downloaded objects in per-entry temporary directories under a cache
//! root. Entries are bounded like any [`BoundedCache`]; removing an entry
//! deletes its file, deferred until the last outstanding [`FileLease`] is
//! dropped so readers never see a file vanish underneath them.

use std::fmt::Debug;
use std::fs;
use std::hash::Hash;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, info, warn};

use super::bounded::BoundedCache;
use crate::config::CacheConfig;
use crate::error::NodeError;
use crate::store::StoreError;

/// Name prefix of per-entry temp directories
const ENTRY_PREFIX: &str = "entry-";

/// Attempts before giving up on a file that keeps disappearing from disk
const MAX_ATTEMPTS: usize = 3;

#[derive(Debug, Default)]
struct LeaseState {
    leases: usize,
    evicted: bool,
    deleted: bool,
}

/// A temp file owned by one cache entry
#[derive(Debug)]
struct Backing {
    path: PathBuf,
    dir: PathBuf,
    state: Mutex<LeaseState>,
    deletions: Arc<AtomicU64>,
}

impl Backing {
    fn lock(&self) -> std::sync::MutexGuard<'_, LeaseState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Remove the file, and its directory if nothing else lives there
    fn delete(&self, state: &mut LeaseState) {
        if state.deleted {
            return;
        }
        state.deleted = true;

        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "Failed to delete cached file"),
        }
        // Fails harmlessly when other files share the directory.
        let _ = fs::remove_dir(&self.dir);

        self.deletions.fetch_add(1, Ordering::Relaxed);
        debug!(path = %self.path.display(), "Deleted cached file");
    }
}

/// Cache-side handle to a stored file
#[derive(Debug, Clone)]
pub struct CachedFile {
    backing: Arc<Backing>,
}

impl CachedFile {
    fn new(path: PathBuf, dir: PathBuf, deletions: Arc<AtomicU64>) -> Self {
        Self {
            backing: Arc::new(Backing {
                path,
                dir,
                state: Mutex::new(LeaseState::default()),
                deletions,
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.backing.path
    }

    /// Borrow the file; `None` once the entry has been evicted
    fn lease(&self) -> Option<FileLease> {
        let mut state = self.backing.lock();
        if state.evicted {
            return None;
        }
        state.leases += 1;
        Some(FileLease {
            backing: Arc::clone(&self.backing),
        })
    }

    /// Called once by the cache when the entry is removed
    fn evict(&self) {
        let mut state = self.backing.lock();
        state.evicted = true;
        if state.leases == 0 {
            self.backing.delete(&mut state);
        } else {
            debug!(
                path = %self.backing.path.display(),
                leases = state.leases,
                "Deferring deletion of leased cache file"
            );
        }
    }
}

/// Reader handle that keeps a cached file on disk while alive
#[derive(Debug)]
pub struct FileLease {
    backing: Arc<Backing>,
}

impl FileLease {
    pub fn path(&self) -> &Path {
        &self.backing.path
    }
}

impl Drop for FileLease {
    fn drop(&mut self) {
        let mut state = self.backing.lock();
        state.leases -= 1;
        if state.leases == 0 && state.evicted {
            self.backing.delete(&mut state);
        }
    }
}

/// Local disk cache for downloaded object content
pub struct FileCache<K> {
    /// Root directory for cached files
    cache_dir: PathBuf,
    entries: BoundedCache<K, CachedFile>,
    deletions: Arc<AtomicU64>,
}

impl<K> FileCache<K>
where
    K: Hash + Eq + Clone + Debug + Send + Sync + 'static,
{
    /// Create a file cache under the platform cache directory
    pub fn new(config: &CacheConfig) -> io::Result<Self> {
        let cache_dir = dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("resource-tree")
            .join("files");
        Self::with_dir(cache_dir, config)
    }

    /// Create a file cache rooted at `cache_dir`
    pub fn with_dir(cache_dir: PathBuf, config: &CacheConfig) -> io::Result<Self> {
        fs::create_dir_all(&cache_dir)?;

        let entries = BoundedCache::with_eviction_hook("file_cache", config, |_key: &K, value: Option<CachedFile>, _cause| {
            if let Some(file) = value {
                file.evict();
            }
        });

        let cache = Self {
            cache_dir,
            entries,
            deletions: Arc::new(AtomicU64::new(0)),
        };

        // Entries from a previous run are unreachable from this index.
        cache.cleanup();

        info!(
            cache_dir = %cache.cache_dir.display(),
            max_entries = config.max_entries,
            "File cache initialized"
        );

        Ok(cache)
    }

    /// Get a lease on the cached file for `key`, fetching it on a miss.
    ///
    /// `fetch` writes the object to the given path and returns `Ok(false)`
    /// if the object does not exist; that absence is cached. A cached entry
    /// whose file has disappeared from disk counts as a miss.
    pub fn get_or_fetch<F>(
        &self,
        key: &K,
        file_name: &str,
        fetch: F,
    ) -> Result<Option<FileLease>, NodeError>
    where
        F: Fn(&K, &Path) -> Result<bool, StoreError>,
    {
        for _ in 0..MAX_ATTEMPTS {
            let entry = self
                .entries
                .try_get_or_load(key, |k| self.populate(k, file_name, &fetch))?;

            let Some(file) = entry else {
                return Ok(None);
            };

            if let Some(lease) = file.lease() {
                if lease.path().exists() {
                    return Ok(Some(lease));
                }
                debug!(key = ?key, path = %lease.path().display(), "Cached file missing on disk, refetching");
            }
            self.discard_stale(key, &file);
        }

        Err(NodeError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("cached file for {:?} keeps disappearing", key),
        )))
    }

    /// Drop `stale` from the cache unless another caller already replaced it
    fn discard_stale(&self, key: &K, stale: &CachedFile) {
        if let Some(Some(current)) = self.entries.get(key) {
            if !Arc::ptr_eq(&current.backing, &stale.backing) {
                return;
            }
        }
        self.entries.invalidate(key);
    }

    /// Materialize the object for `key` at `dest`.
    ///
    /// The bytes are copied; the cache keeps its own file, so evicting the
    /// entry never touches `dest`.
    pub fn store_to<F>(
        &self,
        key: &K,
        file_name: &str,
        dest: &Path,
        fetch: F,
    ) -> Result<Option<PathBuf>, NodeError>
    where
        F: Fn(&K, &Path) -> Result<bool, StoreError>,
    {
        let Some(lease) = self.get_or_fetch(key, file_name, fetch)? else {
            return Ok(None);
        };

        if lease.path() != dest {
            if let Some(parent) = dest.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)?;
            }
            fs::copy(lease.path(), dest)?;
            debug!(key = ?key, dest = %dest.display(), "Copied cached file to destination");
        }

        Ok(Some(dest.to_path_buf()))
    }

    fn populate<F>(&self, key: &K, file_name: &str, fetch: &F) -> Result<Option<CachedFile>, StoreError>
    where
        F: Fn(&K, &Path) -> Result<bool, StoreError>,
    {
        let dir = tempfile::Builder::new()
            .prefix(ENTRY_PREFIX)
            .tempdir_in(&self.cache_dir)?;
        let path = dir.path().join(safe_file_name(file_name));

        // The temp dir removes itself on drop unless the fetch succeeds.
        if !fetch(key, &path)? {
            debug!(key = ?key, "Object absent, caching absence");
            return Ok(None);
        }

        let dir = dir.keep();
        debug!(key = ?key, local = %path.display(), "Stored file in cache");
        Ok(Some(CachedFile::new(path, dir, Arc::clone(&self.deletions))))
    }

    /// Invalidate a specific cached file
    pub fn invalidate(&self, key: &K) {
        self.entries.invalidate(key);
    }

    /// Remove every entry and its file; leased files go when released
    pub fn clear(&self) {
        self.entries.invalidate_all();
        self.entries.run_pending_tasks();
    }

    pub fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks();
    }

    /// Number of backing files deleted so far
    pub fn deleted_files(&self) -> u64 {
        self.deletions.load(Ordering::Relaxed)
    }

    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    pub fn log_metrics(&self) {
        self.entries.log_metrics();
    }

    /// Clean up entry directories left by previous runs
    pub fn cleanup(&self) {
        let Ok(read_dir) = fs::read_dir(&self.cache_dir) else {
            return;
        };
        for entry in read_dir.flatten() {
            let stale = entry.file_name().to_string_lossy().starts_with(ENTRY_PREFIX);
            if stale {
                let path = entry.path();
                debug!(path = %path.display(), "Removing stale cache entry");
                if let Err(e) = fs::remove_dir_all(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale cache entry");
                }
            }
        }
    }

    /// Get the cache directory path
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// File name for a cached object, free of separators
fn safe_file_name(name: &str) -> String {
    let safe = name.replace(['/', '\\', ':'], "_");
    if safe.is_empty() {
        "object".to_string()
    } else {
        safe
    }
}
