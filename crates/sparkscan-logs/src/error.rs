use sparkscan_blob::BlobError;

/// Errors that abort a scan
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error(transparent)]
    Blob(#[from] BlobError),

    #[error("{blob} is not valid UTF-8: {source}")]
    Utf8 {
        blob: String,
        source: std::str::Utf8Error,
    },

    #[error("{blob} line {line}: invalid JSON event: {source}")]
    Decode {
        blob: String,
        line: usize,
        source: serde_json::Error,
    },

    #[error("failed to write output: {0}")]
    Output(#[from] std::io::Error),
}
