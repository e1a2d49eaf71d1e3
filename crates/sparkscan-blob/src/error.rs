use std::path::PathBuf;

use reqwest::StatusCode;

/// Errors raised by blob storage operations
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    #[error("invalid endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint { endpoint: String, reason: String },

    #[error("token request for tenant {tenant_id} failed ({status}): {body}")]
    Auth {
        tenant_id: String,
        status: StatusCode,
        body: String,
    },

    #[error("{operation} `{target}` failed ({status}): {body}")]
    Status {
        operation: &'static str,
        target: String,
        status: StatusCode,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("malformed listing response: {0}")]
    InvalidListing(String),

    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BlobError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BlobError::Io {
            path: path.into(),
            source,
        }
    }
}
