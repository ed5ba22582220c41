//! Node labelers

use regex::Regex;
use serde_json::{json, Value};

use super::{bool_field, string_field, FromConfig, Labeler};
use crate::error::ConfigError;
use crate::node::Node;

/// Labels every node with its name
pub struct NameLabeler {
    config: Value,
}

impl NameLabeler {
    pub fn new() -> Self {
        Self { config: Value::Null }
    }
}

impl Default for NameLabeler {
    fn default() -> Self {
        Self::new()
    }
}

impl FromConfig for NameLabeler {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        Ok(Self { config })
    }
}

impl Labeler for NameLabeler {
    fn label(&self, node: &Node) -> Option<String> {
        Some(node.name().to_string())
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Rewrites the name (or path) with a regex substitution.
///
/// Nodes the pattern does not match get no label.
pub struct RegexReplaceLabeler {
    regex: Regex,
    substitution: String,
    on_path: bool,
    config: Value,
}

impl RegexReplaceLabeler {
    pub fn new(pattern: &str, substitution: &str, on_path: bool) -> Result<Self, ConfigError> {
        Self::from_config(json!({
            "pattern": pattern,
            "substitution": substitution,
            "on_path": on_path,
        }))
    }
}

impl FromConfig for RegexReplaceLabeler {
    fn from_config(config: Value) -> Result<Self, ConfigError> {
        let pattern = string_field(&config, "pattern")?;
        let substitution = string_field(&config, "substitution")?;
        let on_path = bool_field(&config, "on_path", false)?;
        let regex = Regex::new(&pattern)
            .map_err(|e| ConfigError::BadConfig(format!("invalid regex '{}': {}", pattern, e)))?;

        Ok(Self {
            regex,
            substitution,
            on_path,
            config,
        })
    }
}

impl Labeler for RegexReplaceLabeler {
    fn label(&self, node: &Node) -> Option<String> {
        let subject = if self.on_path { node.path() } else { node.name() };
        if !self.regex.is_match(subject) {
            return None;
        }
        Some(self.regex.replace(subject, self.substitution.as_str()).into_owned())
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Asks each labeler in turn and returns the first label produced
pub struct CompositeLabeler {
    labelers: Vec<Box<dyn Labeler>>,
    config: Value,
}

impl CompositeLabeler {
    pub fn new(labelers: Vec<Box<dyn Labeler>>) -> Self {
        let config = Value::Array(labelers.iter().map(|l| l.config().clone()).collect());
        Self { labelers, config }
    }
}

impl Labeler for CompositeLabeler {
    fn label(&self, node: &Node) -> Option<String> {
        self.labelers.iter().find_map(|l| l.label(node))
    }

    fn config(&self) -> &Value {
        &self.config
    }
}

/// Build a labeler by kind name: `name`, `regex-replace`, or `composite`
/// with a list of `{"kind": ..., "config": ...}` entries
pub fn labeler_from_config(kind: &str, config: Value) -> Result<Box<dyn Labeler>, ConfigError> {
    let labeler: Box<dyn Labeler> = match kind {
        "name" => Box::new(NameLabeler::from_config(config)?),
        "regex-replace" => Box::new(RegexReplaceLabeler::from_config(config)?),
        "composite" => {
            let items = match config {
                Value::Array(items) => items,
                other => {
                    return Err(ConfigError::BadConfig(format!(
                        "expected a list of labelers, got {}",
                        other
                    )));
                }
            };
            let labelers = items
                .into_iter()
                .map(|item| {
                    let kind = item
                        .get("kind")
                        .and_then(Value::as_str)
                        .ok_or_else(|| ConfigError::BadConfig(format!("labeler without kind: {}", item)))?
                        .to_string();
                    let config = item.get("config").cloned().unwrap_or(Value::Null);
                    labeler_from_config(&kind, config)
                })
                .collect::<Result<Vec<_>, _>>()?;
            Box::new(CompositeLabeler::new(labelers))
        }
        other => {
            return Err(ConfigError::BadConfig(format!("unknown labeler kind: {}", other)));
        }
    };
    Ok(labeler)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::node::create;

    struct Fixed(Option<&'static str>, Value);

    impl Labeler for Fixed {
        fn label(&self, _node: &Node) -> Option<String> {
            self.0.map(str::to_string)
        }

        fn config(&self) -> &Value {
            &self.1
        }
    }

    fn node(path: &str) -> Node {
        create("", path, Config::new()).unwrap()
    }

    #[test]
    fn test_name_labeler() {
        assert_eq!(NameLabeler::new().label(&node("/data/a.nc")), Some("a.nc".to_string()));
    }

    #[test]
    fn test_regex_replace_on_name() {
        let labeler = RegexReplaceLabeler::new(r"^model_(\d{8})\.nc$", "Run $1", false).unwrap();
        assert_eq!(
            labeler.label(&node("/data/model_20240101.nc")),
            Some("Run 20240101".to_string())
        );
        assert_eq!(labeler.label(&node("/data/readme.txt")), None);
    }

    #[test]
    fn test_regex_replace_on_path() {
        let labeler = RegexReplaceLabeler::from_config(json!({
            "pattern": r"^/data/(\w+)/.*$",
            "substitution": "$1 collection",
            "on_path": true,
        }))
        .unwrap();
        assert_eq!(labeler.label(&node("/data/gfs/x.nc")), Some("gfs collection".to_string()));
    }

    #[test]
    fn test_composite_takes_first_label() {
        let labeler = CompositeLabeler::new(vec![
            Box::new(Fixed(None, Value::Null)),
            Box::new(Fixed(Some("x"), json!("x"))),
            Box::new(Fixed(Some("y"), json!("y"))),
        ]);
        assert_eq!(labeler.label(&node("/a")), Some("x".to_string()));
        assert_eq!(labeler.config(), &json!([null, "x", "y"]));

        let empty = CompositeLabeler::new(vec![Box::new(Fixed(None, Value::Null))]);
        assert_eq!(empty.label(&node("/a")), None);
    }

    #[test]
    fn test_from_config_registry() {
        let labeler = labeler_from_config(
            "composite",
            json!([
                {"kind": "regex-replace", "config": {"pattern": "^(.*)\\.nc$", "substitution": "$1"}},
                {"kind": "name"}
            ]),
        )
        .unwrap();
        assert_eq!(labeler.label(&node("/d/a.nc")), Some("a".to_string()));
        assert_eq!(labeler.label(&node("/d/b.txt")), Some("b.txt".to_string()));

        assert!(labeler_from_config("regex-replace", json!({"pattern": "x"})).is_err());
        assert!(labeler_from_config("nope", Value::Null).is_err());
    }
}
