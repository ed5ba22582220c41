//! Object-store resource identifiers of the form `s3://bucket/key`.

use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

/// URI scheme accepted for object-store paths
pub const SCHEME: &str = "s3";

/// Minimum bucket name length
pub const MIN_BUCKET_LEN: usize = 3;

const SCHEME_PREFIX: &str = "s3://";

/// Bucket plus optional key.
///
/// `s3://bucket` has no key, while `s3://bucket/` has the empty key; the
/// two print back to their original form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceUri {
    bucket: String,
    key: Option<String>,
}

impl ResourceUri {
    /// Build a URI from its parts, validating the bucket name
    pub fn new(bucket: &str, key: Option<&str>) -> Result<Self, ConfigError> {
        if bucket.chars().count() < MIN_BUCKET_LEN {
            return Err(ConfigError::BucketTooShort(bucket.to_string()));
        }
        if bucket.contains('/') {
            return Err(ConfigError::MalformedPath(format!(
                "bucket name contains '/': {}",
                bucket
            )));
        }
        Ok(Self {
            bucket: bucket.to_string(),
            key: key.map(String::from),
        })
    }

    /// Parse `s3://bucket[/key]`
    pub fn parse(uri: &str) -> Result<Self, ConfigError> {
        let rest = uri
            .strip_prefix(SCHEME_PREFIX)
            .ok_or_else(|| ConfigError::MalformedPath(format!("expected {}: {}", SCHEME_PREFIX, uri)))?;

        match rest.split_once('/') {
            Some((bucket, key)) => Self::new(bucket, Some(key)),
            None => Self::new(rest, None),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }

    /// True for `s3://bucket` and `s3://bucket/`
    pub fn is_bucket_root(&self) -> bool {
        self.key.as_deref().map_or(true, str::is_empty)
    }

    /// Last key segment, or the bucket name for the bucket root
    pub fn base_name(&self) -> &str {
        match self.key.as_deref().map(|k| k.trim_end_matches('/')) {
            Some(key) if !key.is_empty() => key.rsplit('/').next().unwrap_or(key),
            _ => &self.bucket,
        }
    }

    /// The enclosing virtual directory; `None` for the bucket root
    pub fn parent(&self) -> Option<ResourceUri> {
        if self.is_bucket_root() {
            return None;
        }
        let key = self.key.as_deref()?.trim_end_matches('/');
        let parent_key = key.rfind('/').map(|idx| key[..idx].to_string());
        Some(Self {
            bucket: self.bucket.clone(),
            key: parent_key,
        })
    }

    /// URI of a direct child named `name`
    pub fn child(&self, name: &str) -> ResourceUri {
        let key = match self.key.as_deref().map(|k| k.trim_end_matches('/')) {
            Some(key) if !key.is_empty() => format!("{}/{}", key, name),
            _ => name.to_string(),
        };
        Self {
            bucket: self.bucket.clone(),
            key: Some(key),
        }
    }

    /// Listing prefix for this URI treated as a virtual directory.
    ///
    /// The bucket root lists with no prefix; any other key gets exactly one
    /// trailing delimiter.
    pub fn directory_prefix(&self, delimiter: &str) -> ResourceUri {
        let key = match self.key.as_deref() {
            Some(key) if !key.is_empty() => {
                let key = key.trim_end_matches(delimiter);
                Some(format!("{}{}", key, delimiter))
            }
            _ => None,
        };
        Self {
            bucket: self.bucket.clone(),
            key,
        }
    }
}

impl fmt::Display for ResourceUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{}{}/{}", SCHEME_PREFIX, self.bucket, key),
            None => write!(f, "{}{}", SCHEME_PREFIX, self.bucket),
        }
    }
}

impl FromStr for ResourceUri {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
