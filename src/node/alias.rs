//! Wildcard alias expansion
//!
//! A path containing `*` names every concrete path it matches. Only the
//! first wildcard segment is matched against a listing; whatever follows
//! it is appended to each match and, if it holds another wildcard,
//! expanded in turn.

use std::any::Any;
use std::collections::HashSet;
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{Node, NodeFactory, ResourceNode};
use crate::config::Config;
use crate::error::{ConfigError, NodeError};
use crate::glob::wildcard_match;
use crate::path::{self, WILDCARD};

/// Backend tag reported by alias nodes
pub const ALIAS_TAG: &str = "alias";

/// An alias path split around its first wildcard segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasSpec {
    /// Everything before the wildcard segment; never empty
    pub literal_prefix: String,
    /// The segment holding the first `*`
    pub wildcard_pattern: String,
    /// Segments after the wildcard one, if any
    pub remainder: Option<String>,
}

impl AliasSpec {
    pub fn parse(path: &str) -> Result<Self, ConfigError> {
        let Some(star) = path.find(WILDCARD) else {
            return Err(ConfigError::MalformedPath(format!("no wildcard in {}", path)));
        };

        let Some(segment_start) = path[..star].rfind('/') else {
            return Err(ConfigError::BadConfig(format!(
                "wildcard needs a literal prefix: {}",
                path
            )));
        };

        let literal_prefix = if segment_start == 0 {
            path::ROOT.to_string()
        } else {
            path[..segment_start].to_string()
        };

        let segment_end = path[star..].find('/').map(|idx| star + idx);
        let wildcard_pattern = path[segment_start + 1..segment_end.unwrap_or(path.len())].to_string();
        let remainder = segment_end
            .map(|end| path[end + 1..].to_string())
            .filter(|rest| !rest.is_empty());

        Ok(Self {
            literal_prefix,
            wildcard_pattern,
            remainder,
        })
    }
}

/// Expands alias paths into concrete nodes of one backend
pub struct AliasExpander<'a> {
    factory: &'a NodeFactory,
    backend: &'a str,
    config: &'a Config,
}

impl<'a> AliasExpander<'a> {
    pub fn new(factory: &'a NodeFactory, backend: &'a str, config: &'a Config) -> Self {
        Self {
            factory,
            backend,
            config,
        }
    }

    /// Build the literal prefix and check it is an existing collection
    pub fn resolve_prefix(&self, spec: &AliasSpec) -> Result<Node, ConfigError> {
        let prefix = self
            .factory
            .create(self.backend, &spec.literal_prefix, self.config.clone())?;

        match prefix.is_collection() {
            Ok(true) => Ok(prefix),
            Ok(false) => Err(ConfigError::BadConfig(format!(
                "alias prefix is not an existing collection: {}",
                spec.literal_prefix
            ))),
            Err(e) => Err(ConfigError::BadConfig(format!(
                "alias prefix {} could not be checked: {}",
                spec.literal_prefix, e
            ))),
        }
    }

    /// Every concrete node `alias_path` names, without duplicates
    pub fn expand(&self, alias_path: &str) -> Result<Vec<Node>, NodeError> {
        let spec = AliasSpec::parse(alias_path)?;
        let prefix = self.resolve_prefix(&spec)?;
        self.expand_resolved(&spec, &prefix)
    }

    /// Expand with an already resolved prefix
    pub fn expand_resolved(&self, spec: &AliasSpec, prefix: &Node) -> Result<Vec<Node>, NodeError> {
        let mut seen = HashSet::new();
        let mut expanded = Vec::new();
        self.expand_into(spec, prefix, &mut seen, &mut expanded)?;
        debug!(
            prefix = %prefix.path(),
            pattern = %spec.wildcard_pattern,
            count = expanded.len(),
            "Expanded alias"
        );
        Ok(expanded)
    }

    fn expand_into(
        &self,
        spec: &AliasSpec,
        prefix: &Node,
        seen: &mut HashSet<String>,
        expanded: &mut Vec<Node>,
    ) -> Result<(), NodeError> {
        let candidates = prefix.list_children(None)?;

        for candidate in candidates {
            if !wildcard_match(&spec.wildcard_pattern, candidate.name()) {
                continue;
            }

            let Some(remainder) = &spec.remainder else {
                if seen.insert(candidate.path().to_string()) {
                    expanded.push(candidate);
                }
                continue;
            };

            match candidate.is_collection() {
                Ok(true) => {}
                Ok(false) => continue,
                Err(e) => {
                    warn!(path = %candidate.path(), error = %e, "Skipping alias candidate");
                    continue;
                }
            }

            let composed = path::join(candidate.path(), remainder);
            if !seen.insert(composed.clone()) {
                continue;
            }

            if path::is_alias(&composed) {
                self.expand_nested(&composed, seen, expanded);
            } else {
                self.push_concrete(&composed, expanded);
            }
        }

        Ok(())
    }

    fn expand_nested(&self, composed: &str, seen: &mut HashSet<String>, expanded: &mut Vec<Node>) {
        let resolved = AliasSpec::parse(composed)
            .and_then(|spec| self.resolve_prefix(&spec).map(|prefix| (spec, prefix)));

        let (spec, prefix) = match resolved {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!(path = %composed, error = %e, "Alias branch has no matches");
                return;
            }
        };

        if let Err(e) = self.expand_into(&spec, &prefix, seen, expanded) {
            warn!(path = %composed, error = %e, "Skipping alias branch");
        }
    }

    fn push_concrete(&self, composed: &str, expanded: &mut Vec<Node>) {
        match self.factory.create(self.backend, composed, self.config.clone()) {
            Ok(node) => expanded.push(node),
            Err(e) => warn!(path = %composed, error = %e, "Skipping alias match"),
        }
    }
}

/// A wildcard path; its children are the concrete nodes it names
#[derive(Debug)]
pub struct AliasNode {
    path: String,
    name: String,
    backend: String,
    spec: AliasSpec,
    prefix: Node,
    factory: NodeFactory,
    config: Config,
}

impl AliasNode {
    /// Parse `path` and resolve its literal prefix. Fails if the prefix is
    /// not an existing collection.
    pub fn new(
        factory: &NodeFactory,
        backend: &str,
        path: String,
        config: Config,
    ) -> Result<Self, ConfigError> {
        let spec = AliasSpec::parse(&path)?;
        let prefix = AliasExpander::new(factory, backend, &config).resolve_prefix(&spec)?;
        let name = path::base_name(&path).to_string();

        Ok(Self {
            path,
            name,
            backend: backend.to_string(),
            spec,
            prefix,
            factory: factory.clone(),
            config,
        })
    }

    pub fn spec(&self) -> &AliasSpec {
        &self.spec
    }

    /// Backend the expanded nodes belong to
    pub fn target_backend(&self) -> &str {
        &self.backend
    }

    /// The concrete nodes this alias names
    pub fn expand(&self) -> Result<Vec<Node>, NodeError> {
        AliasExpander::new(&self.factory, &self.backend, &self.config)
            .expand_resolved(&self.spec, &self.prefix)
    }
}

impl ResourceNode for AliasNode {
    fn backend(&self) -> &'static str {
        ALIAS_TAG
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
        Ok(true)
    }

    fn is_collection(&self) -> Result<bool, NodeError> {
        Ok(true)
    }

    fn size(&self) -> Result<Option<u64>, NodeError> {
        Ok(None)
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, NodeError> {
        Ok(None)
    }

    fn parent(&self) -> Result<Option<Node>, ConfigError> {
        path::parent_path(&self.path)
            .map(|parent| self.factory.create(&self.backend, &parent, self.config.clone()))
            .transpose()
    }

    fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError> {
        self.factory.create(
            &self.backend,
            &path::join(&self.path, relative_path),
            self.config.clone(),
        )
    }

    fn children(&self) -> Result<Vec<Node>, NodeError> {
        self.expand()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
