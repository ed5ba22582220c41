//! Backblaze B2 API Client
//!
//! Implements [`ObjectStoreClient`] for a single B2 bucket. Requests are
//! issued on a private tokio runtime and the trait methods block on them, so
//! the client can be called from any plain thread.

use std::io::Write;
use std::path::Path;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use base64::Engine;
use reqwest::Client;
use serde::Deserialize;
use tokio::runtime::Runtime;
use tracing::{debug, error, info, warn};

use super::types::{to_listing, ListFileNamesRequest, ListFilesResponse};
use crate::store::client::{Listing, Metadata, ObjectStoreClient, DEFAULT_PAGE_SIZE};
use crate::store::errors::StoreError;
use crate::store::uri::ResourceUri;

/// B2 API base URL for authorization (v3 for nested apiInfo structure)
const B2_AUTH_URL: &str = "https://api.backblazeb2.com/b2api/v3/b2_authorize_account";

/// Maximum number of retries for retryable errors
const MAX_RETRIES: u32 = 3;

/// Auth state that can be refreshed (interior mutability)
struct AuthState {
    auth_token: String,
    api_url: String,
    download_url: String,
}

/// Response from b2_authorize_account API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AuthorizeAccountResponse {
    account_id: String,
    authorization_token: String,
    api_info: ApiInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiInfo {
    storage_api: StorageApiInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StorageApiInfo {
    api_url: String,
    download_url: String,
}

/// Response from b2_list_buckets API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListBucketsResponse {
    buckets: Vec<BucketInfo>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BucketInfo {
    bucket_id: String,
    bucket_name: String,
}

/// B2 client bound to one bucket
pub struct B2Client {
    runtime: Arc<Runtime>,
    http_client: Client,
    auth_state: Arc<RwLock<AuthState>>,
    /// Stored credentials for re-authorization
    key_id: String,
    key: String,
    bucket_id: String,
    bucket_name: String,
    page_size: u32,
}

impl B2Client {
    /// Authorize with B2 and create a client for the named bucket
    ///
    /// # Arguments
    /// * `key_id` - B2 application key ID
    /// * `key` - B2 application key
    /// * `bucket_name` - Name of the bucket to access
    /// * `timeout` - Per-request timeout; a timed-out request is an error
    pub fn authorize(
        key_id: &str,
        key: &str,
        bucket_name: &str,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        info!(bucket = bucket_name, "Authorizing with B2 API...");

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("b2-client")
            .enable_all()
            .build()?;

        let http_client = Client::builder().timeout(timeout).build()?;

        let auth = runtime.block_on(authorize_account(&http_client, key_id, key))?;
        let api_url = auth.api_info.storage_api.api_url;
        let download_url = auth.api_info.storage_api.download_url;
        debug!(api_url = %api_url, download_url = %download_url, "B2 authorization successful");

        let bucket_id = runtime.block_on(lookup_bucket_id(
            &http_client,
            &api_url,
            &auth.authorization_token,
            &auth.account_id,
            bucket_name,
        ))?;

        info!(bucket_name = bucket_name, bucket_id = %bucket_id, "B2 client ready");

        Ok(Self {
            runtime: Arc::new(runtime),
            http_client,
            auth_state: Arc::new(RwLock::new(AuthState {
                auth_token: auth.authorization_token,
                api_url,
                download_url,
            })),
            key_id: key_id.to_string(),
            key: key.to_string(),
            bucket_id,
            bucket_name: bucket_name.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
        })
    }

    fn auth_token(&self) -> String {
        self.read_auth(|s| s.auth_token.clone())
    }

    fn api_url(&self) -> String {
        self.read_auth(|s| s.api_url.clone())
    }

    fn download_url(&self) -> String {
        self.read_auth(|s| s.download_url.clone())
    }

    fn read_auth<T>(&self, f: impl FnOnce(&AuthState) -> T) -> T {
        let state = self.auth_state.read().unwrap_or_else(|e| e.into_inner());
        f(&state)
    }

    /// Refresh the auth token by re-authorizing with B2
    async fn refresh_auth(&self) -> Result<(), StoreError> {
        info!("Refreshing B2 auth token...");

        let auth = authorize_account(&self.http_client, &self.key_id, &self.key).await?;

        let mut state = self.auth_state.write().unwrap_or_else(|e| e.into_inner());
        state.auth_token = auth.authorization_token;
        state.api_url = auth.api_info.storage_api.api_url;
        state.download_url = auth.api_info.storage_api.download_url;

        info!("B2 auth token refreshed successfully");
        Ok(())
    }

    /// Execute an operation with retry logic and exponential backoff
    async fn with_retry<F, Fut, T>(&self, operation: &str, path: &str, f: F) -> Result<T, StoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, StoreError>>,
    {
        let backoff_ms = [500u64, 1000, 2000];

        let mut attempt = 0;
        loop {
            let err = match f().await {
                Ok(result) => return Ok(result),
                Err(e) => e,
            };

            if !err.is_retryable() || attempt == MAX_RETRIES {
                debug!(operation = operation, path = path, error = %err, "B2 operation failed");
                return Err(err);
            }

            if matches!(err, StoreError::AuthExpired) && attempt == 0 {
                warn!(operation = operation, "Auth expired, refreshing token...");
                if let Err(refresh_err) = self.refresh_auth().await {
                    error!(error = %refresh_err, "Failed to refresh auth token");
                }
            }

            let delay = backoff_ms.get(attempt as usize).copied().unwrap_or(2000);
            warn!(
                operation = operation,
                path = path,
                attempt = attempt + 1,
                max = MAX_RETRIES,
                delay_ms = delay,
                error = %err,
                "Retrying B2 operation"
            );
            tokio::time::sleep(Duration::from_millis(delay)).await;
            attempt += 1;
        }
    }

    /// Fetch a single page of b2_list_file_names
    async fn list_file_names(
        &self,
        prefix: Option<&str>,
        delimiter: Option<&str>,
        start_file_name: Option<&str>,
        max_file_count: u32,
    ) -> Result<ListFilesResponse, StoreError> {
        let url = format!("{}/b2api/v2/b2_list_file_names", self.api_url());
        let request = ListFileNamesRequest {
            bucket_id: self.bucket_id.clone(),
            prefix: prefix.map(String::from),
            delimiter: delimiter.map(String::from),
            max_file_count,
            start_file_name: start_file_name.map(String::from),
        };

        debug!(prefix = ?prefix, delimiter = ?delimiter, "Listing files from B2");

        let response = self
            .http_client
            .post(&url)
            .header("Authorization", self.auth_token())
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        Ok(response.json().await?)
    }

    /// Download object bytes into `dest`, replacing it atomically
    async fn download_file(&self, file_name: &str, dest: &Path) -> Result<(), StoreError> {
        let encoded_name = urlencoding::encode(file_name);
        let url = format!(
            "{}/file/{}/{}",
            self.download_url(),
            self.bucket_name,
            encoded_name
        );

        debug!(file = file_name, url = %url, "Downloading file from B2");

        let response = self
            .http_client
            .get(&url)
            .header("Authorization", self.auth_token())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::from_status(status, &body));
        }

        let bytes = response.bytes().await?;

        let parent = dest.parent().unwrap_or(Path::new("."));
        let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
        tmp.write_all(&bytes)?;
        tmp.persist(dest).map_err(|e| StoreError::Io(e.error))?;

        info!(file = file_name, size = bytes.len(), "Downloaded file from B2");
        Ok(())
    }

    fn check_bucket(&self, uri: &ResourceUri) -> Result<(), StoreError> {
        if uri.bucket() != self.bucket_name {
            return Err(StoreError::Forbidden(format!(
                "client is bound to bucket '{}', not '{}'",
                self.bucket_name,
                uri.bucket()
            )));
        }
        Ok(())
    }
}

impl ObjectStoreClient for B2Client {
    fn get_metadata(&self, uri: &ResourceUri) -> Result<Option<Metadata>, StoreError> {
        self.check_bucket(uri)?;
        let Some(key) = uri.key().filter(|k| !k.is_empty()) else {
            return Ok(None);
        };

        // B2 has no lookup by name; the exact key sorts first under its own prefix.
        let page = self.runtime.block_on(self.with_retry("get_metadata", key, || {
            self.list_file_names(Some(key), None, Some(key), 1)
        }))?;

        Ok(page
            .files
            .into_iter()
            .find(|f| f.file_name == key)
            .map(|f| f.to_metadata()))
    }

    fn list(&self, uri: &ResourceUri, delimiter: &str) -> Result<Option<Listing>, StoreError> {
        self.check_bucket(uri)?;
        let prefix = uri.key().filter(|k| !k.is_empty());
        let path = prefix.unwrap_or_default();

        let page = self.runtime.block_on(self.with_retry("list", path, || {
            self.list_file_names(prefix, Some(delimiter), None, self.page_size)
        }))?;

        if page.next_file_name.is_some() {
            debug!(prefix = path, page_size = self.page_size, "Listing truncated at page size");
        }

        Ok(to_listing(prefix, page.files))
    }

    fn fetch(&self, uri: &ResourceUri, dest: &Path) -> Result<(), StoreError> {
        self.check_bucket(uri)?;
        let key = uri
            .key()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| StoreError::NotFound(uri.to_string()))?;

        self.runtime
            .block_on(self.with_retry("fetch", key, || self.download_file(key, dest)))
    }
}

/// Call b2_authorize_account with Basic auth credentials
async fn authorize_account(
    http_client: &Client,
    key_id: &str,
    key: &str,
) -> Result<AuthorizeAccountResponse, StoreError> {
    let credentials = format!("{}:{}", key_id, key);
    let encoded = base64::engine::general_purpose::STANDARD.encode(credentials);
    let auth_header = format!("Basic {}", encoded);

    let response = http_client
        .get(B2_AUTH_URL)
        .header("Authorization", &auth_header)
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::from_status(status, &body));
    }

    Ok(response.json().await?)
}

/// Look up bucket ID from bucket name
async fn lookup_bucket_id(
    http_client: &Client,
    api_url: &str,
    auth_token: &str,
    account_id: &str,
    bucket_name: &str,
) -> Result<String, StoreError> {
    let url = format!("{}/b2api/v2/b2_list_buckets", api_url);

    let response = http_client
        .post(&url)
        .header("Authorization", auth_token)
        .json(&serde_json::json!({
            "accountId": account_id,
            "bucketName": bucket_name
        }))
        .send()
        .await?;

    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(StoreError::from_status(status, &body));
    }

    let list_response: ListBucketsResponse = response.json().await?;

    list_response
        .buckets
        .into_iter()
        .find(|b| b.bucket_name == bucket_name)
        .map(|b| b.bucket_id)
        .ok_or_else(|| StoreError::NotFound(format!("bucket '{}'", bucket_name)))
}
