//! B2 API wire types and their mapping onto listings and metadata.

use serde::{Deserialize, Deserializer, Serialize};
use std::time::{Duration, UNIX_EPOCH};

use crate::store::client::{Listing, Metadata, ObjectSummary};

/// Deserialize a number that might be encoded as a string or null.
/// B2 sometimes returns numeric fields as strings (e.g. "1536964279000")
/// and returns null for folder entries.
fn deserialize_flexible_u64<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de;

    struct FlexibleU64Visitor;

    impl<'de> de::Visitor<'de> for FlexibleU64Visitor {
        type Value = u64;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a u64, a string containing a u64, or null")
        }

        fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> {
            Ok(value)
        }

        fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
            u64::try_from(value).map_err(|_| de::Error::custom("negative value for u64"))
        }

        fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
            value.parse::<u64>().map_err(de::Error::custom)
        }

        fn visit_none<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }

        fn visit_unit<E: de::Error>(self) -> Result<u64, E> {
            Ok(0)
        }
    }

    deserializer.deserialize_any(FlexibleU64Visitor)
}

/// File or folder entry from b2_list_file_names
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileInfo {
    /// Full file path within the bucket
    pub file_name: String,
    #[serde(deserialize_with = "deserialize_flexible_u64")]
    pub content_length: u64,
    /// Upload timestamp in milliseconds since epoch
    #[serde(deserialize_with = "deserialize_flexible_u64")]
    pub upload_timestamp: u64,
    /// "upload", "folder", "hide" or "start"
    pub action: String,
    #[serde(default)]
    pub content_type: Option<String>,
}

impl FileInfo {
    /// Folder entries are synthesized by B2 for delimited listings
    pub fn is_directory(&self) -> bool {
        self.action == "folder" || self.file_name.ends_with('/')
    }

    pub fn to_metadata(&self) -> Metadata {
        Metadata {
            key: self.file_name.clone(),
            size: self.content_length,
            last_modified: UNIX_EPOCH + Duration::from_millis(self.upload_timestamp),
            content_type: self.content_type.clone(),
        }
    }
}

/// Response from b2_list_file_names
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFilesResponse {
    pub files: Vec<FileInfo>,
    /// Set when more results exist beyond this page
    pub next_file_name: Option<String>,
}

/// Request body for b2_list_file_names
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListFileNamesRequest {
    pub bucket_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delimiter: Option<String>,
    pub max_file_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_file_name: Option<String>,
}

/// Fold one page of B2 entries into a delimited listing.
///
/// A zero-byte marker named exactly `prefix` is dropped. Returns `None`
/// when nothing remains, i.e. the prefix is not a virtual directory.
pub fn to_listing(prefix: Option<&str>, files: Vec<FileInfo>) -> Option<Listing> {
    let mut listing = Listing::default();
    for file in files {
        if Some(file.file_name.as_str()) == prefix {
            continue;
        }
        if file.is_directory() {
            listing.common_prefixes.push(file.file_name);
        } else {
            listing.objects.push(ObjectSummary {
                last_modified: UNIX_EPOCH + Duration::from_millis(file.upload_timestamp),
                size: file.content_length,
                key: file.file_name,
            });
        }
    }

    if listing.is_empty() {
        None
    } else {
        Some(listing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, action: &str, size: u64) -> FileInfo {
        FileInfo {
            file_name: name.to_string(),
            content_length: size,
            upload_timestamp: 1536964279000,
            action: action.to_string(),
            content_type: None,
        }
    }

    #[test]
    fn test_deserialize_folder_entry() {
        let json = r#"{
            "fileName": "data/sub/",
            "contentLength": 0,
            "uploadTimestamp": 0,
            "action": "folder",
            "fileId": null,
            "contentType": null
        }"#;
        let info: FileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.file_name, "data/sub/");
        assert!(info.is_directory());
        assert_eq!(info.content_type, None);
    }

    #[test]
    fn test_deserialize_string_numbers() {
        let json = r#"{
            "fileName": "data/a.nc",
            "contentLength": "7",
            "uploadTimestamp": "1536964279000",
            "action": "upload",
            "contentSha1": "abc123"
        }"#;
        let info: FileInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.content_length, 7);
        assert_eq!(info.upload_timestamp, 1536964279000);
        assert!(!info.is_directory());
    }

    #[test]
    fn test_list_request_serialization() {
        let request = ListFileNamesRequest {
            bucket_id: "bucket-id".to_string(),
            prefix: Some("data/".to_string()),
            delimiter: Some("/".to_string()),
            max_file_count: 1000,
            start_file_name: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"bucketId\""));
        assert!(json.contains("\"maxFileCount\":1000"));
        assert!(!json.contains("startFileName"));
    }

    #[test]
    fn test_to_listing_splits_folders_and_objects() {
        let files = vec![
            file("data/", "upload", 0),
            file("data/a.nc", "upload", 12),
            file("data/sub/", "folder", 0),
        ];
        let listing = to_listing(Some("data/"), files).unwrap();
        assert_eq!(listing.common_prefixes, vec!["data/sub/".to_string()]);
        assert_eq!(listing.objects.len(), 1);
        assert_eq!(listing.objects[0].key, "data/a.nc");
        assert_eq!(listing.objects[0].size, 12);
    }

    #[test]
    fn test_to_listing_marker_only_is_absent() {
        assert!(to_listing(Some("data/"), vec![file("data/", "upload", 0)]).is_none());
        assert!(to_listing(Some("data/"), Vec::new()).is_none());
    }
}
