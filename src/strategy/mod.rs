//! Pluggable filter, sorter and labeler strategies
//!
//! Strategies work on nodes returned by [`Node::list_children`] and never
//! talk to a backend directly. Each keeps the configuration value it was
//! built from so callers can report or persist it.

pub mod filter;
pub mod labeler;
pub mod sorter;

use serde_json::Value;

use crate::error::ConfigError;
use crate::node::Node;

pub use filter::{
    filter_from_config, AllOf, AnyOf, CollectionFilter, LastModifiedLimitFilter, Not,
    RegexMatchOnNameFilter, RegexMatchOnPathFilter, WildcardMatchOnNameFilter,
};
pub use labeler::{labeler_from_config, CompositeLabeler, NameLabeler, RegexReplaceLabeler};
pub use sorter::{sorter_from_config, LastModifiedSorter, LexicographicByNameSorter};

/// Decides whether a node is kept
pub trait Filter: Send + Sync {
    fn accept(&self, node: &Node) -> bool;

    fn config(&self) -> &Value;
}

/// Reorders nodes in place
pub trait Sorter: Send + Sync {
    fn sort(&self, nodes: &mut [Node]);

    fn config(&self) -> &Value;
}

/// Produces a display label, or `None` to defer to the next labeler
pub trait Labeler: Send + Sync {
    fn label(&self, node: &Node) -> Option<String>;

    fn config(&self) -> &Value;
}

/// Strategies constructible from a single configuration value
pub trait FromConfig: Sized {
    fn from_config(config: Value) -> Result<Self, ConfigError>;
}

/// A string either given directly or under `key` in an object
pub(crate) fn string_field(config: &Value, key: &str) -> Result<String, ConfigError> {
    match config {
        Value::String(s) => Ok(s.clone()),
        Value::Object(map) => match map.get(key) {
            Some(Value::String(s)) => Ok(s.clone()),
            _ => Err(ConfigError::BadConfig(format!("missing string field '{}'", key))),
        },
        other => Err(ConfigError::BadConfig(format!(
            "expected a string or object, got {}",
            other
        ))),
    }
}

/// A boolean either given directly or under `key`; absent means `default`
pub(crate) fn bool_field(config: &Value, key: &str, default: bool) -> Result<bool, ConfigError> {
    match config {
        Value::Null => Ok(default),
        Value::Bool(b) => Ok(*b),
        Value::Object(map) => match map.get(key) {
            None | Some(Value::Null) => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(ConfigError::BadConfig(format!(
                "'{}' must be a boolean, got {}",
                key, other
            ))),
        },
        other => Err(ConfigError::BadConfig(format!(
            "expected a boolean or object, got {}",
            other
        ))),
    }
}
