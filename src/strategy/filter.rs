//! Node filters

use std::time::{Duration, SystemTime};

use regex::Regex;
use serde_json::{json, Value};

use super::{bool_field, string_field, Filter, FromConfig};
use crate::error::ConfigError;
use crate::glob::wildcard_match;
use crate::node::Node;

/// Compile `pattern` so it must match the whole input
fn anchored(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(&format!("^(?:{})$", pattern))
        .map_err(|e| ConfigError::BadConfig(format!("invalid regex '{}': {}", pattern, e)))
}

/// Accepts nodes whose name matches a `*` wildcard pattern
pub struct WildcardMatchOnNameFilter {
    pattern: String,
    config: Value,
}

impl WildcardMatchOnNameFilter {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            config: Value::String(pattern.to_string()),
        }
    }
}

impl FromConfig for WildcardMatchOnNameFilter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let pattern = string_field(&config, "pattern")?;
        Ok(Self { pattern, config })
    }
}

impl Filter for WildcardMatchOnNameFilter {
    fn accept(&self, node: &Node) -> bool {
        wildcard_match(&self.pattern, node.name())
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Accepts nodes whose whole name matches a regular expression
pub struct RegexMatchOnNameFilter {
    regex: Regex,
    config: Value,
}

impl FromConfig for RegexMatchOnNameFilter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let regex = anchored(&string_field(&config, "pattern")?)?;
        Ok(Self { regex, config })
    }
}

impl Filter for RegexMatchOnNameFilter {
    fn accept(&self, node: &Node) -> bool {
        self.regex.is_match(node.name())
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Accepts nodes whose whole path matches a regular expression
pub struct RegexMatchOnPathFilter {
    regex: Regex,
    config: Value,
}

impl FromConfig for RegexMatchOnPathFilter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let regex = anchored(&string_field(&config, "pattern")?)?;
        Ok(Self { regex, config })
    }
}

impl Filter for RegexMatchOnPathFilter {
    fn accept(&self, node: &Node) -> bool {
        self.regex.is_match(node.path())
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Keeps only collections, or only atomic nodes.
///
/// Nodes whose kind cannot be determined are rejected.
pub struct CollectionFilter {
    collections: bool,
    config: Value,
}

impl CollectionFilter {
    pub fn collections_only() -> Self {
        Self {
            collections: true,
            config: Value::Bool(true),
        }
    }

    pub fn atomic_only() -> Self {
        Self {
            collections: false,
            config: Value::Bool(false),
        }
    }
}

impl FromConfig for CollectionFilter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let collections = bool_field(&config, "collections", true)?;
        Ok(Self {
            collections,
            config,
        })
    }
}

impl Filter for CollectionFilter {
    fn accept(&self, node: &Node) -> bool {
        node.is_collection().is_ok_and(|c| c == self.collections)
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Accepts atomic nodes last modified at least `limit` ago.
///
/// Collections always pass; atomic nodes with no known modification time
/// are rejected.
pub struct LastModifiedLimitFilter {
    limit: Duration,
    config: Value,
}

impl LastModifiedLimitFilter {
    pub fn new(limit: Duration) -> Self {
        Self {
            limit,
            config: json!({ "limit_secs": limit.as_secs() }),
        }
    }
}

impl FromConfig for LastModifiedLimitFilter {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let secs = match &config {
            Value::Number(n) => n.as_u64(),
            Value::Object(map) => map.get("limit_secs").and_then(Value::as_u64),
            _ => None,
        }
        .ok_or_else(|| ConfigError::BadConfig(format!("expected limit_secs, got {}", config)))?;

        Ok(Self {
            limit: Duration::from_secs(secs),
            config,
        })
    }
}

impl Filter for LastModifiedLimitFilter {
    fn accept(&self, node: &Node) -> bool {
        if node.is_collection().unwrap_or(false) {
            return true;
        }
        match node.last_modified() {
            Ok(Some(modified)) => SystemTime::now()
                .duration_since(modified)
                .is_ok_and(|age| age >= self.limit),
            _ => false,
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Accepts nodes every inner filter accepts
pub struct AllOf {
    filters: Vec<Box<dyn Filter>>,
    config: Value,
}

impl AllOf {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        let config = Value::Array(filters.iter().map(|f| f.config().clone()).collect());
        Self { filters, config }
    }
}

impl Filter for AllOf {
    fn accept(&self, node: &Node) -> bool {
        self.filters.iter().all(|f| f.accept(node))
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Accepts nodes any inner filter accepts
pub struct AnyOf {
    filters: Vec<Box<dyn Filter>>,
    config: Value,
}

impl AnyOf {
    pub fn new(filters: Vec<Box<dyn Filter>>) -> Self {
        let config = Value::Array(filters.iter().map(|f| f.config().clone()).collect());
        Self { filters, config }
    }
}

impl Filter for AnyOf {
    fn accept(&self, node: &Node) -> bool {
        self.filters.iter().any(|f| f.accept(node))
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Inverts another filter
pub struct Not {
    filter: Box<dyn Filter>,
    config: Value,
}

impl Not {
    pub fn new(filter: Box<dyn Filter>) -> Self {
        let config = json!({ "not": filter.config().clone() });
        Self { filter, config }
    }
}

impl Filter for Not {
    fn accept(&self, node: &Node) -> bool {
        !self.filter.accept(node)
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Nested filter definitions: `[{"kind": "...", "config": ...}, ...]`
fn nested(config: &Value) -> Result<Vec<Box<dyn Filter>>, ConfigError> {
    let Value::Array(items) = config else {
        return Err(ConfigError::BadConfig(format!(
            "expected a list of filters, got {}",
            config
        )));
    };
    items.iter().map(nested_one).collect()
}

fn nested_one(item: &Value) -> Result<Box<dyn Filter>, ConfigError> {
    let kind = item
        .get("kind")
        .and_then(Value::as_str)
        .ok_or_else(|| ConfigError::BadConfig(format!("filter without kind: {}", item)))?;
    let config = item.get("config").cloned().unwrap_or(Value::Null);
    filter_from_config(kind, config)
}

/// Build a filter by kind name.
///
/// Kinds: `wildcard`, `regex`, `regex-path`, `collections`, `atomic`,
/// `last-modified`, and the combinators `all`, `any`, `not`.
pub fn filter_from_config(kind: &str, config: Value) -> Result<Box<dyn Filter>, ConfigError> {
    let filter: Box<dyn Filter> = match kind {
        "wildcard" => Box::new(WildcardMatchOnNameFilter::from_config(config)?),
        "regex" => Box::new(RegexMatchOnNameFilter::from_config(config)?),
        "regex-path" => Box::new(RegexMatchOnPathFilter::from_config(config)?),
        "collections" => Box::new(CollectionFilter::from_config(config)?),
        "atomic" => Box::new(CollectionFilter::atomic_only()),
        "last-modified" => Box::new(LastModifiedLimitFilter::from_config(config)?),
        "all" => Box::new(AllOf::new(nested(&config)?)),
        "any" => Box::new(AnyOf::new(nested(&config)?)),
        "not" => Box::new(Not::new(nested_one(&config)?)),
        other => {
            return Err(ConfigError::BadConfig(format!("unknown filter kind: {}", other)));
        }
    };
    Ok(filter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::node::create;
    use std::collections::HashSet;
    use std::fs;
    use tempfile::TempDir;

    fn fixture() -> (TempDir, Vec<Node>) {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("2023")).unwrap();
        fs::write(dir.path().join("a.nc"), b"a").unwrap();
        fs::write(dir.path().join("b.grib"), b"b").unwrap();
        let root = create("", &dir.path().to_string_lossy(), Config::new()).unwrap();
        let mut children = root.list_children(None).unwrap();
        children.sort_by(|a, b| a.name().cmp(b.name()));
        (dir, children)
    }

    fn names(nodes: &[Node], filter: &dyn Filter) -> Vec<String> {
        nodes
            .iter()
            .filter(|n| filter.accept(n))
            .map(|n| n.name().to_string())
            .collect()
    }

    #[test]
    fn test_wildcard_on_name() {
        let (_dir, nodes) = fixture();
        let filter = WildcardMatchOnNameFilter::new("*.nc");
        assert_eq!(names(&nodes, &filter), vec!["a.nc"]);
        assert_eq!(filter.config(), &Value::String("*.nc".to_string()));
    }

    #[test]
    fn test_regex_must_match_whole_name() {
        let (_dir, nodes) = fixture();
        let filter = RegexMatchOnNameFilter::from_config(json!("[ab]\\.nc")).unwrap();
        assert_eq!(names(&nodes, &filter), vec!["a.nc"]);

        let partial = RegexMatchOnNameFilter::from_config(json!({"pattern": "nc"})).unwrap();
        assert!(names(&nodes, &partial).is_empty());
    }

    #[test]
    fn test_regex_on_path() {
        let (_dir, nodes) = fixture();
        let filter = RegexMatchOnPathFilter::from_config(json!(".*/20[0-9]{2}")).unwrap();
        assert_eq!(names(&nodes, &filter), vec!["2023"]);
    }

    #[test]
    fn test_invalid_regex_is_bad_config() {
        assert!(matches!(
            RegexMatchOnNameFilter::from_config(json!("(")),
            Err(ConfigError::BadConfig(_))
        ));
    }

    #[test]
    fn test_collection_filters() {
        let (_dir, nodes) = fixture();
        assert_eq!(names(&nodes, &CollectionFilter::collections_only()), vec!["2023"]);
        assert_eq!(names(&nodes, &CollectionFilter::atomic_only()), vec!["a.nc", "b.grib"]);
    }

    #[test]
    fn test_last_modified_limit() {
        let (_dir, nodes) = fixture();
        let recent = LastModifiedLimitFilter::new(Duration::from_secs(3600));
        assert_eq!(names(&nodes, &recent), vec!["2023"]);

        let any_age = LastModifiedLimitFilter::from_config(json!({"limit_secs": 0})).unwrap();
        assert_eq!(names(&nodes, &any_age), vec!["2023", "a.nc", "b.grib"]);
    }

    #[test]
    fn test_combinators() {
        let (_dir, nodes) = fixture();
        let either = AnyOf::new(vec![
            Box::new(WildcardMatchOnNameFilter::new("*.nc")),
            Box::new(WildcardMatchOnNameFilter::new("*.grib")),
        ]);
        assert_eq!(names(&nodes, &either), vec!["a.nc", "b.grib"]);

        let neither = Not::new(Box::new(either));
        assert_eq!(names(&nodes, &neither), vec!["2023"]);

        let both = AllOf::new(vec![
            Box::new(CollectionFilter::atomic_only()),
            Box::new(WildcardMatchOnNameFilter::new("a*")),
        ]);
        assert_eq!(names(&nodes, &both), vec!["a.nc"]);
        assert_eq!(both.config(), &json!([false, "a*"]));
    }

    #[test]
    fn test_from_config_registry() {
        let (_dir, nodes) = fixture();
        let filter = filter_from_config(
            "all",
            json!([
                {"kind": "atomic"},
                {"kind": "not", "config": {"kind": "wildcard", "config": "*.grib"}}
            ]),
        )
        .unwrap();
        assert_eq!(names(&nodes, filter.as_ref()), vec!["a.nc"]);

        assert!(filter_from_config("bogus", Value::Null).is_err());
        assert!(filter_from_config("wildcard", json!(3)).is_err());
    }

    #[test]
    fn test_list_children_with_filter() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.nc"), b"a").unwrap();
        fs::write(dir.path().join("b.txt"), b"b").unwrap();
        let root = create("", &dir.path().to_string_lossy(), Config::new()).unwrap();

        let all: HashSet<Node> = root.list_children(None).unwrap().into_iter().collect();
        let filter = WildcardMatchOnNameFilter::new("*");
        let same: HashSet<Node> = root.list_children(Some(&filter)).unwrap().into_iter().collect();
        assert_eq!(all.len(), 2);
        assert_eq!(all, same);

        let nc = root
            .list_children(Some(&WildcardMatchOnNameFilter::new("*.nc")))
            .unwrap();
        assert_eq!(nc.len(), 1);
        assert_eq!(nc[0].name(), "a.nc");
    }
}
