//! Path normalization
//!
//! Every node path goes through [`normalize`] before a backend sees it, so
//! backends can assume `/` separators and no trailing slash.

/// Root marker for local absolute paths
pub const ROOT: &str = "/";

/// Wildcard character that turns a path into an alias
pub const WILDCARD: char = '*';

/// Canonicalize separators and trailing slashes.
///
/// Backslashes become `/`, and trailing slashes are removed unless the path
/// is the root marker itself. `normalize(normalize(p)) == normalize(p)`.
pub fn normalize(path: &str) -> String {
    let mut normalized = path.replace('\\', "/");
    while normalized.len() > 1 && normalized.ends_with('/') {
        normalized.pop();
    }
    normalized
}

/// Whether a path names a set of paths rather than a single one
pub fn is_alias(path: &str) -> bool {
    path.contains(WILDCARD)
}

/// Last segment of a normalized path
pub fn base_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Parent of a normalized path, if it has one.
///
/// Stops at the root marker and at a `scheme://authority` boundary, so the
/// parent of `s3://bucket` is `None` rather than `s3:/`.
pub fn parent_path(path: &str) -> Option<String> {
    if path.is_empty() || path == ROOT {
        return None;
    }

    let idx = path.rfind('/')?;
    if idx == 0 {
        return Some(ROOT.to_string());
    }

    let parent = &path[..idx];
    if parent.ends_with('/') || parent.ends_with(':') {
        return None;
    }
    Some(parent.to_string())
}

/// Append a relative path to a normalized base path
pub fn join(base: &str, relative: &str) -> String {
    let relative = normalize(relative);
    let relative = relative.trim_start_matches('/');

    if relative.is_empty() {
        return base.to_string();
    }
    if base.is_empty() {
        return relative.to_string();
    }
    if base.ends_with('/') {
        format!("{}{}", base, relative)
    } else {
        format!("{}/{}", base, relative)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_normalize_separators_and_trailing_slash() {
        assert_eq!(normalize("C:\\data\\2023\\"), "C:/data/2023");
        assert_eq!(normalize("/root/2023/"), "/root/2023");
        assert_eq!(normalize("/root//"), "/root");
        assert_eq!(normalize("s3://bucket/data/"), "s3://bucket/data");
    }

    #[test]
    fn test_normalize_root_marker() {
        assert_eq!(normalize("/"), "/");
        assert_eq!(normalize("///"), "/");
        assert_eq!(normalize("\\"), "/");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_parent_path() {
        assert_eq!(parent_path("/root/2023/jan"), Some("/root/2023".to_string()));
        assert_eq!(parent_path("/root"), Some("/".to_string()));
        assert_eq!(parent_path("/"), None);
        assert_eq!(parent_path("relative"), None);
        assert_eq!(parent_path("s3://bucket/data/a.nc"), Some("s3://bucket/data".to_string()));
        assert_eq!(parent_path("s3://bucket/data"), Some("s3://bucket".to_string()));
        assert_eq!(parent_path("s3://bucket"), None);
    }

    #[test]
    fn test_base_name_and_join() {
        assert_eq!(base_name("/root/2023/jan"), "jan");
        assert_eq!(base_name("s3://bucket"), "bucket");
        assert_eq!(base_name("/"), "");

        assert_eq!(join("/root", "2023/jan/"), "/root/2023/jan");
        assert_eq!(join("/", "root"), "/root");
        assert_eq!(join("/root", ""), "/root");
        assert_eq!(join("s3://bucket", "data\\sub"), "s3://bucket/data/sub");
    }

    #[test]
    fn test_is_alias() {
        assert!(is_alias("/root/*/jan"));
        assert!(is_alias("/root/20*"));
        assert!(!is_alias("/root/2023/jan"));
    }

    proptest! {
        #[test]
        fn prop_normalize_idempotent(path in "[a-z/\\\\.:*]{0,24}") {
            let once = normalize(&path);
            prop_assert_eq!(normalize(&once), once.clone());
            prop_assert!(!once.contains('\\'));
            prop_assert!(once == ROOT || !once.ends_with('/'));
        }
    }
}
