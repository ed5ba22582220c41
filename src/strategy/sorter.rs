//! Node sorters
//!
//! Both sorters are stable: nodes with equal keys keep their listing order.

use std::cmp::Reverse;
use std::time::SystemTime;

use serde_json::{json, Value};

use super::{bool_field, FromConfig, Sorter};
use crate::error::ConfigError;
use crate::node::Node;

/// Orders nodes by name, byte-wise
pub struct LexicographicByNameSorter {
    increasing: bool,
    config: Value,
}

impl LexicographicByNameSorter {
    pub fn new(increasing: bool) -> Self {
        Self {
            increasing,
            config: json!({ "increasing": increasing }),
        }
    }
}

impl FromConfig for LexicographicByNameSorter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let increasing = bool_field(&config, "increasing", true)?;
        Ok(Self { increasing, config })
    }
}

impl Sorter for LexicographicByNameSorter {
    fn sort(&self, nodes: &mut [Node]) {
        nodes.sort_by(|a, b| {
            let order = a.name().cmp(b.name());
            if self.increasing {
                order
            } else {
                order.reverse()
            }
        });
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Orders nodes by modification time.
///
/// Nodes without a known time sort before all others when increasing.
pub struct LastModifiedSorter {
    increasing: bool,
    config: Value,
}

impl LastModifiedSorter {
    pub fn new(increasing: bool) -> Self {
        Self {
            increasing,
            config: json!({ "increasing": increasing }),
        }
    }
}

impl FromConfig for LastModifiedSorter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let increasing = bool_field(&config, "increasing", true)?;
        Ok(Self { increasing, config })
    }
}

impl Sorter for LastModifiedSorter {
    fn sort(&self, nodes: &mut [Node]) {
        let modified = |node: &Node| -> Option<SystemTime> { node.last_modified().ok().flatten() };
        if self.increasing {
            nodes.sort_by_cached_key(modified);
        } else {
            nodes.sort_by_cached_key(|node| Reverse(modified(node)));
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Build a sorter by kind name: `name` or `last-modified`
pub fn sorter_from_config(kind: &str, config: Value) -> Result<Box<dyn Sorter>, ConfigError> {
    let sorter: Box<dyn Sorter> = match kind {
        "name" => Box::new(LexicographicByNameSorter::from_config(config)?),
        "last-modified" => Box::new(LastModifiedSorter::from_config(config)?),
        other => {
            return Err(ConfigError::BadConfig(format!("unknown sorter kind: {}", other)));
        }
    };
    Ok(sorter)
}
