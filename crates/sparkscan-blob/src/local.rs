use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::debug;

use sparkscan_types::BlobItem;

use crate::{BlobError, BlobStore};

/// A directory tree exposed as a container. Object names are the
/// `/`-joined paths relative to the root.
#[derive(Clone, Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, name: &str) -> PathBuf {
        name.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    fn walk(&self, dir: &Path, prefix: &str, out: &mut Vec<BlobItem>) -> Result<(), BlobError> {
        let mut entries = fs::read_dir(dir)
            .map_err(|e| BlobError::io(dir, e))?
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| BlobError::io(dir, e))?;
        entries.sort_by_key(|e| e.file_name());

        for entry in entries {
            let path = entry.path();
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = if prefix.is_empty() {
                file_name
            } else {
                format!("{}/{}", prefix, file_name)
            };

            let metadata = entry.metadata().map_err(|e| BlobError::io(&path, e))?;
            if metadata.is_dir() {
                self.walk(&path, &name, out)?;
            } else if metadata.is_file() {
                out.push(BlobItem {
                    name,
                    size: Some(metadata.len()),
                    last_modified: metadata.modified().ok().map(DateTime::<Utc>::from),
                });
            }
        }
        Ok(())
    }
}

impl BlobStore for LocalStore {
    async fn list_blobs(&self, prefix: Option<&str>) -> Result<Vec<BlobItem>, BlobError> {
        let mut blobs = Vec::new();
        if self.root.is_dir() {
            self.walk(&self.root, "", &mut blobs)?;
        }
        if let Some(prefix) = prefix {
            blobs.retain(|b| b.name.starts_with(prefix));
        }
        debug!(root = %self.root.display(), prefix = ?prefix, count = blobs.len(), "listed files");
        Ok(blobs)
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, BlobError> {
        let path = self.path_for(name);
        tokio::fs::read(&path)
            .await
            .map_err(|e| BlobError::io(&path, e))
    }

    async fn upload(&self, name: &str, content: Vec<u8>) -> Result<(), BlobError> {
        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| BlobError::io(parent, e))?;
        }
        tokio::fs::write(&path, content)
            .await
            .map_err(|e| BlobError::io(&path, e))
    }

    fn describe(&self) -> String {
        self.root.display().to_string()
    }
}
