//! Local filesystem backend

use std::any::Any;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};

use super::{Backend, Node, ResourceNode};
use crate::config::Config;
use crate::error::{ConfigError, NodeError};
use crate::path;

const FILE_SCHEME: &str = "file://";

/// A file or directory on the local filesystem
#[derive(Debug)]
pub struct LocalFileNode {
    path: String,
    name: String,
    file: PathBuf,
    config: Config,
}

impl LocalFileNode {
    /// Filesystem location this node reads
    pub fn file(&self) -> &Path {
        &self.file
    }

    /// `Ok(None)` if nothing exists at the path
    fn stat(&self) -> Result<Option<fs::Metadata>, NodeError> {
        match fs::metadata(&self.file) {
            Ok(metadata) => Ok(Some(metadata)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn child(&self, name: &str) -> Result<Node, ConfigError> {
        Self::new(path::join(&self.path, name), self.config.clone()).map(Node::new)
    }
}

impl Backend for LocalFileNode {
    const TAG: &'static str = "file";

    fn new(normalized_path: String, config: Config) -> Result<Self, ConfigError> {
        if normalized_path.is_empty() {
            return Err(ConfigError::MalformedPath("empty path".to_string()));
        }

        let file = PathBuf::from(
            normalized_path
                .strip_prefix(FILE_SCHEME)
                .unwrap_or(&normalized_path),
        );
        let name = path::base_name(&normalized_path).to_string();

        Ok(Self {
            path: normalized_path,
            name,
            file,
            config,
        })
    }
}

impl ResourceNode for LocalFileNode {
    fn backend(&self) -> &'static str {
        Self::TAG
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
        Ok(self.stat()?.is_some())
    }

    fn is_collection(&self) -> Result<bool, NodeError> {
        Ok(self.stat()?.is_some_and(|m| m.is_dir()))
    }

    fn size(&self) -> Result<Option<u64>, NodeError> {
        Ok(self.stat()?.filter(|m| m.is_file()).map(|m| m.len()))
    }

    fn last_modified(&self) -> Result<Option<SystemTime>, NodeError> {
        match self.stat()? {
            Some(metadata) => Ok(metadata.modified().ok()),
            None => Ok(None),
        }
    }

    fn parent(&self) -> Result<Option<Node>, ConfigError> {
        path::parent_path(&self.path)
            .map(|parent| Self::new(parent, self.config.clone()).map(Node::new))
            .transpose()
    }

    fn descendant(&self, relative_path: &str) -> Result<Node, ConfigError> {
        self.child(relative_path)
    }

    fn children(&self) -> Result<Vec<Node>, NodeError> {
        let mut children = Vec::new();
        for entry in fs::read_dir(&self.file)? {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(path = %self.path, error = %e, "Skipping unreadable directory entry");
                    continue;
                }
            };

            let Ok(name) = entry.file_name().into_string() else {
                warn!(path = %self.path, name = ?entry.file_name(), "Skipping non-UTF-8 file name");
                continue;
            };

            match self.child(&name) {
                Ok(node) => children.push(node),
                Err(e) => warn!(path = %self.path, name = %name, error = %e, "Skipping child"),
            }
        }

        debug!(path = %self.path, count = children.len(), "Listed local directory");
        Ok(children)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn node(path: &Path) -> Node {
        let raw = path.to_string_lossy();
        Node::new(LocalFileNode::new(path::normalize(&raw), Config::new()).unwrap())
    }

    fn fixture() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("a.nc"), b"0123456789").unwrap();
        fs::write(dir.path().join("sub/b.nc"), b"b").unwrap();
        dir
    }

    #[test]
    fn test_directory_and_file_queries() {
        let dir = fixture();
        let root = node(dir.path());
        assert!(root.exists().unwrap());
        assert!(root.is_collection().unwrap());
        assert_eq!(root.size().unwrap(), None);

        let file = root.descendant("a.nc").unwrap();
        assert_eq!(file.name(), "a.nc");
        assert!(file.exists().unwrap());
        assert!(!file.is_collection().unwrap());
        assert_eq!(file.size().unwrap(), Some(10));
        assert!(file.last_modified().unwrap().is_some());
    }

    #[test]
    fn test_missing_path_is_not_an_error() {
        let dir = fixture();
        let missing = node(&dir.path().join("nope"));
        assert!(!missing.exists().unwrap());
        assert!(!missing.is_collection().unwrap());
        assert_eq!(missing.size().unwrap(), None);
        assert_eq!(missing.last_modified().unwrap(), None);
    }

    #[test]
    fn test_list_children() {
        let dir = fixture();
        let root = node(dir.path());
        let mut names: Vec<String> = root
            .list_children(None)
            .unwrap()
            .iter()
            .map(|c| c.name().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["a.nc", "sub"]);
    }

    #[test]
    fn test_list_children_of_file_is_illegal_state() {
        let dir = fixture();
        let file = node(&dir.path().join("a.nc"));
        assert!(matches!(file.list_children(None), Err(NodeError::IllegalState(_))));
    }

    #[test]
    fn test_parent_and_descendant_round_trip() {
        let dir = fixture();
        let root = node(dir.path());
        let nested = root.descendant("sub/b.nc").unwrap();
        assert_eq!(nested.name(), "b.nc");

        let parent = nested.parent().unwrap().unwrap();
        assert_eq!(parent.name(), "sub");
        assert_eq!(parent.parent().unwrap().unwrap(), root);
    }

    #[test]
    fn test_root_has_no_parent() {
        let root = Node::new(LocalFileNode::new("/".to_string(), Config::new()).unwrap());
        assert!(root.parent().unwrap().is_none());
        assert_eq!(root.descendant("tmp").unwrap().path(), "/tmp");
    }

    #[test]
    fn test_file_scheme_is_stripped() {
        let dir = fixture();
        let raw = format!("file://{}", dir.path().join("a.nc").display());
        let node = LocalFileNode::new(path::normalize(&raw), Config::new()).unwrap();
        assert_eq!(node.file(), dir.path().join("a.nc"));
        assert!(node.exists().unwrap());
    }

    #[test]
    fn test_empty_path_is_rejected() {
        assert!(matches!(
            LocalFileNode::new(String::new(), Config::new()),
            Err(ConfigError::MalformedPath(_))
        ));
    }
}
