use std::future::Future;

use sparkscan_types::BlobItem;

use crate::BlobError;

/// A single container of named objects
pub trait BlobStore {
    /// List objects, optionally restricted to names starting with `prefix`.
    /// Items come back in the order the backend returns them.
    fn list_blobs(
        &self,
        prefix: Option<&str>,
    ) -> impl Future<Output = Result<Vec<BlobItem>, BlobError>> + Send;

    /// Fetch the full content of an object
    fn download(&self, name: &str) -> impl Future<Output = Result<Vec<u8>, BlobError>> + Send;

    /// Create or replace an object
    fn upload(
        &self,
        name: &str,
        content: Vec<u8>,
    ) -> impl Future<Output = Result<(), BlobError>> + Send;

    /// Human-readable location, for log messages
    fn describe(&self) -> String;
}
