//! Caching layer
//!
//! Bounded, single-flight caches that keep remote backends practical by
//! limiting request rate and local disk usage.

pub mod bounded;
pub mod file_cache;

pub use bounded::BoundedCache;
pub use file_cache::{CachedFile, FileCache, FileLease};
pub use moka::notification::RemovalCause;
