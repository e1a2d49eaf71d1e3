//! Blob storage client for sparkscan
//!
//! This crate provides the object-storage collaborator used by the scanner:
//! a container-scoped `BlobStore` trait, an Azure Blob implementation
//! authenticated with a client-credential flow, and a local-directory store.

mod azure;
mod credential;
mod error;
mod listing;
mod local;
mod store;

pub use azure::{AzureBlobService, AzureContainer, DEFAULT_BLOB_ENDPOINT_SUFFIX};
pub use credential::{AccessToken, ClientSecretCredential, DEFAULT_AUTHORITY_HOST};
pub use error::BlobError;
pub use listing::{ListPage, parse_list_response};
pub use local::LocalStore;
pub use store::BlobStore;

// Re-export types used in our public API
pub use sparkscan_types::BlobItem;
