//! JSON file backend
//!
//! Layout: `<base>/<namespace>/{successes,failures,learnings}.json`.
//! Directories are created on first write. Each file is written to a
//! sibling temp file and renamed over the old one, so a crash mid-write
//! leaves the previous contents in place.

use super::{validate_namespace, Collection, CollectionStore};
use crate::error::{CasebookError, Result};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Collections stored as JSON files under a base directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    base_path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(base_path: P) -> Self {
        Self {
            base_path: base_path.as_ref().to_path_buf(),
        }
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Path of a collection file
    pub fn collection_path(&self, namespace: &str, collection: Collection) -> PathBuf {
        self.base_path
            .join(namespace)
            .join(format!("{}.json", collection.file_stem()))
    }
}

#[async_trait]
impl CollectionStore for JsonFileStore {
    async fn read(&self, namespace: &str, collection: Collection) -> Result<Option<String>> {
        validate_namespace(namespace)?;
        let path = self.collection_path(namespace, collection);

        match fs::read_to_string(&path).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CasebookError::StorageRead {
                namespace: namespace.to_string(),
                collection: collection.to_string(),
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }

    async fn write(&self, namespace: &str, collection: Collection, contents: String) -> Result<()> {
        validate_namespace(namespace)?;
        let path = self.collection_path(namespace, collection);
        let write_err = |e: std::io::Error| CasebookError::StorageWrite {
            namespace: namespace.to_string(),
            collection: collection.to_string(),
            message: format!("{}: {}", path.display(), e),
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let tmp_path = path.with_extension("json.tmp");
        let written = match fs::write(&tmp_path, contents).await {
            Ok(()) => fs::rename(&tmp_path, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(write_err(e));
        }

        debug!("Wrote {}", path.display());
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let mut entries = match fs::read_dir(&self.base_path).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut namespaces = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_dir() {
                if let Some(name) = entry.file_name().to_str() {
                    namespaces.push(name.to_string());
                }
            }
        }

        namespaces.sort();
        Ok(namespaces)
    }
}
