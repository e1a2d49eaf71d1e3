//! Azure Blob Storage REST client
//!
//! Only the three calls the scanner needs are implemented: List Blobs
//! (following continuation markers), Get Blob and Put Blob.

use std::sync::Arc;

use chrono::Utc;
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use tracing::debug;

use sparkscan_types::BlobItem;

use crate::listing::collect_pages;
use crate::{BlobError, BlobStore, ClientSecretCredential, parse_list_response};

/// Public-cloud blob endpoint domain
pub const DEFAULT_BLOB_ENDPOINT_SUFFIX: &str = "blob.core.windows.net";

/// Oldest service version that accepts bearer tokens is 2017-11-09
const STORAGE_API_VERSION: &str = "2021-08-06";

/// Account-level handle that hands out container clients
pub struct AzureBlobService {
    http: reqwest::Client,
    account_url: Url,
    credential: Arc<ClientSecretCredential>,
}

impl AzureBlobService {
    /// Build a client for `https://{account_name}.{endpoint_suffix}`
    pub fn new(
        account_name: &str,
        endpoint_suffix: &str,
        credential: ClientSecretCredential,
        http: reqwest::Client,
    ) -> Result<Self, BlobError> {
        let endpoint = format!("https://{}.{}", account_name, endpoint_suffix);
        let account_url = Url::parse(&endpoint).map_err(|e| BlobError::InvalidEndpoint {
            endpoint: endpoint.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            http,
            account_url,
            credential: Arc::new(credential),
        })
    }

    pub fn account_url(&self) -> &Url {
        &self.account_url
    }

    /// Client scoped to one container. Containers share the credential and
    /// its token cache.
    pub fn container(&self, name: &str) -> Result<AzureContainer, BlobError> {
        let container_url = append_path(&self.account_url, [name])?;
        Ok(AzureContainer {
            http: self.http.clone(),
            credential: Arc::clone(&self.credential),
            container_url,
        })
    }
}

/// One blob container
pub struct AzureContainer {
    http: reqwest::Client,
    credential: Arc<ClientSecretCredential>,
    container_url: Url,
}

impl AzureContainer {
    pub fn url(&self) -> &Url {
        &self.container_url
    }

    /// URL of a blob; each `/`-separated segment of the name is encoded
    pub fn blob_url(&self, name: &str) -> Result<Url, BlobError> {
        append_path(&self.container_url, name.split('/'))
    }

    fn list_url(&self, prefix: Option<&str>, marker: Option<&str>) -> Url {
        let mut url = self.container_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("restype", "container");
            query.append_pair("comp", "list");
            if let Some(prefix) = prefix {
                query.append_pair("prefix", prefix);
            }
            if let Some(marker) = marker {
                query.append_pair("marker", marker);
            }
        }
        url
    }

    async fn send(
        &self,
        operation: &'static str,
        target: &str,
        request: RequestBuilder,
    ) -> Result<Response, BlobError> {
        let token = self.credential.token().await?;
        let response = request
            .bearer_auth(token)
            .header("x-ms-version", STORAGE_API_VERSION)
            .header(
                "x-ms-date",
                Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            )
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            self.credential.invalidate();
        }

        let body = response.text().await.unwrap_or_default();
        Err(BlobError::Status {
            operation,
            target: target.to_string(),
            status,
            body,
        })
    }
}

impl BlobStore for AzureContainer {
    async fn list_blobs(&self, prefix: Option<&str>) -> Result<Vec<BlobItem>, BlobError> {
        let blobs = collect_pages(|marker| async move {
            let url = self.list_url(prefix, marker.as_deref());
            let target = url.to_string();
            let response = self.send("list blobs", &target, self.http.get(url)).await?;
            let body = response.text().await?;
            parse_list_response(&body)
        })
        .await?;

        debug!(container = %self.container_url, prefix = ?prefix, count = blobs.len(), "listed blobs");
        Ok(blobs)
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let url = self.blob_url(name)?;
        let response = self.send("download", name, self.http.get(url)).await?;
        let bytes = response.bytes().await?;
        debug!(blob = %name, bytes = bytes.len(), "downloaded blob");
        Ok(bytes.to_vec())
    }

    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<(), BlobError> {
        let url = self.blob_url(name)?;
        let size = content.len();
        let request = self
            .http
            .put(url)
            .header("x-ms-blob-type", "BlockBlob")
            .header("content-type", "application/x-ndjson")
            .body(content);
        self.send("upload", name, request).await?;
        debug!(blob = %name, bytes = size, "uploaded blob");
        Ok(())
    }

    fn describe(&self) -> String {
        self.container_url.to_string()
    }
}

fn append_path<'a>(
    base: &Url,
    segments: impl IntoIterator<Item = &'a str>,
) -> Result<Url, BlobError> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| BlobError::InvalidEndpoint {
            endpoint: base.to_string(),
            reason: "cannot be a base URL".to_string(),
        })?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}
