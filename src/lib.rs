//! Resource tree
//!
//! Uniform, read-only navigation over hierarchical resources: local
//! directories, object-store buckets, and remote HTTP listings. Paths with
//! `*` wildcards expand to every matching concrete resource.

pub mod cache;
pub mod config;
pub mod error;
pub mod glob;
pub mod node;
pub mod path;
pub mod remote;
pub mod store;
pub mod strategy;
pub mod walk;

pub use config::{Config, ObjectStoreContext, RemoteContext, Settings};
pub use error::{ConfigError, NodeError};
pub use node::{create, Node, NodeFactory};
pub use strategy::{Filter, Labeler, Sorter};
pub use walk::{walk, WalkOptions};
