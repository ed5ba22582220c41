//! HTTP listing client
//!
//! A remote collection answers `GET <url>/` with a JSON document:
//! `{"entries": [{"name": "a.nc", "collection": false, "size": 12, "lastModified": 1700000000000}]}`.
//! A 404 means the URL is not a collection.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Runtime;
use tracing::debug;

use crate::store::StoreError;

/// One child in a remote listing
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteEntry {
    pub name: String,
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub size: Option<u64>,
    /// Milliseconds since the epoch
    #[serde(default)]
    pub last_modified: Option<u64>,
}

impl RemoteEntry {
    pub fn modified_time(&self) -> Option<SystemTime> {
        self.last_modified
            .map(|ms| UNIX_EPOCH + Duration::from_millis(ms))
    }
}

#[derive(Debug, Deserialize)]
struct ListingDocument {
    entries: Vec<RemoteEntry>,
}

/// Source of remote listings
pub trait ListingClient: Send + Sync {
    /// Children of the collection at `url`; `Ok(None)` if it is not one
    fn list(&self, url: &str) -> Result<Option<Vec<RemoteEntry>>, StoreError>;
}

/// Listing client speaking the JSON listing format over HTTP
pub struct HttpListingClient {
    runtime: Runtime,
    http_client: Client,
}

impl HttpListingClient {
    pub fn new(timeout: Duration) -> Result<Self, StoreError> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("listing-client")
            .enable_all()
            .build()?;
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            runtime,
            http_client,
        })
    }

    async fn fetch_listing(&self, url: &str) -> Result<Option<Vec<RemoteEntry>>, StoreError> {
        let url = format!("{}/", url.trim_end_matches('/'));
        debug!(url = %url, "Fetching remote listing");

        let response = self
            .http_client
            .get(&url)
            .header("Accept", "application/json")
            .send()
            .await?;

        let status = response.status().as_u16();
        if status == 404 {
            return Ok(None);
        }
        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let document: ListingDocument = response.json().await?;
        debug!(url = %url, count = document.entries.len(), "Fetched remote listing");
        Ok(Some(document.entries))
    }
}

impl ListingClient for HttpListingClient {
    fn list(&self, url: &str) -> Result<Option<Vec<RemoteEntry>>, StoreError> {
        self.runtime.block_on(self.fetch_listing(url))
    }
}
