//! Recursive traversal over node hierarchies.

use std::collections::HashSet;

use tracing::warn;

use crate::error::NodeError;
use crate::node::Node;
use crate::strategy::{Filter, Sorter};

/// Options for [`walk`].
#[derive(Default)]
pub struct WalkOptions<'a> {
    /// Maximum depth to recurse (None = unlimited, 0 = immediate children only).
    pub max_depth: Option<usize>,
    /// Only accepted nodes are visited; collections are descended regardless.
    pub filter: Option<&'a dyn Filter>,
    /// Applied to each collection's children before visiting them.
    pub sorter: Option<&'a dyn Sorter>,
}

/// Visit every node below `root`, depth first.
///
/// `visit` receives each node and its depth (0 for the root's children).
/// Failing to list `root` is an error; a collection further down that
/// cannot be listed is skipped with a warning.
pub fn walk<F>(root: &Node, options: &WalkOptions<'_>, mut visit: F) -> Result<(), NodeError>
where
    F: FnMut(&Node, usize),
{
    let mut seen = HashSet::new();
    seen.insert(root.clone());
    walk_level(root, 0, options, &mut seen, &mut visit)
}

fn walk_level<F>(
    parent: &Node,
    depth: usize,
    options: &WalkOptions<'_>,
    seen: &mut HashSet<Node>,
    visit: &mut F,
) -> Result<(), NodeError>
where
    F: FnMut(&Node, usize),
{
    let mut children = parent.list_children(None)?;
    if let Some(sorter) = options.sorter {
        sorter.sort(&mut children);
    }

    for child in children {
        if options.filter.map_or(true, |f| f.accept(&child)) {
            visit(&child, depth);
        }

        let descend = options.max_depth.map_or(true, |max| depth < max);
        if !descend || !seen.insert(child.clone()) {
            continue;
        }

        match child.is_collection() {
            Ok(true) => {
                if let Err(e) = walk_level(&child, depth + 1, options, seen, visit) {
                    warn!(path = %child.path(), error = %e, "Skipping unreadable collection");
                }
            }
            Ok(false) => {}
            Err(e) => warn!(path = %child.path(), error = %e, "Skipping node"),
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::node::create;
    use crate::strategy::{LexicographicByNameSorter, WildcardMatchOnNameFilter};
    use std::fs;
    use tempfile::TempDir;

    fn tree() -> (TempDir, Node) {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("b/deep")).unwrap();
        fs::write(dir.path().join("a.nc"), b"a").unwrap();
        fs::write(dir.path().join("b/c.nc"), b"c").unwrap();
        fs::write(dir.path().join("b/deep/d.nc"), b"d").unwrap();
        fs::write(dir.path().join("b/notes.txt"), b"n").unwrap();
        let root = create("", &dir.path().to_string_lossy(), Config::new()).unwrap();
        (dir, root)
    }

    fn collect(root: &Node, options: &WalkOptions<'_>) -> Vec<(String, usize)> {
        let mut visited = Vec::new();
        walk(root, options, |node, depth| visited.push((node.name().to_string(), depth))).unwrap();
        visited
    }

    #[test]
    fn test_walk_sorted_depth_first() {
        let (_dir, root) = tree();
        let sorter = LexicographicByNameSorter::new(true);
        let options = WalkOptions {
            sorter: Some(&sorter),
            ..Default::default()
        };
        assert_eq!(
            collect(&root, &options),
            vec![
                ("a.nc".to_string(), 0),
                ("b".to_string(), 0),
                ("c.nc".to_string(), 1),
                ("deep".to_string(), 1),
                ("d.nc".to_string(), 2),
                ("notes.txt".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_filter_does_not_stop_descent() {
        let (_dir, root) = tree();
        let sorter = LexicographicByNameSorter::new(true);
        let filter = WildcardMatchOnNameFilter::new("*.nc");
        let options = WalkOptions {
            filter: Some(&filter),
            sorter: Some(&sorter),
            ..Default::default()
        };
        let names: Vec<String> = collect(&root, &options).into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["a.nc", "c.nc", "d.nc"]);
    }

    #[test]
    fn test_max_depth() {
        let (_dir, root) = tree();
        let options = WalkOptions {
            max_depth: Some(0),
            ..Default::default()
        };
        let mut names: Vec<String> = collect(&root, &options).into_iter().map(|(n, _)| n).collect();
        names.sort();
        assert_eq!(names, vec!["a.nc", "b"]);
    }

    #[test]
    fn test_walk_of_file_fails() {
        let (dir, _root) = tree();
        let file = create("", &dir.path().join("a.nc").to_string_lossy(), Config::new()).unwrap();
        assert!(matches!(
            walk(&file, &WalkOptions::default(), |_, _| {}),
            Err(NodeError::IllegalState(_))
        ));
    }
}
