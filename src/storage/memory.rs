//! In-memory backend
//!
//! Keeps serialized collections in a map. Useful for ephemeral agents and
//! for tests, which can make individual collections fail on write or read.

use super::{Collection, CollectionStore};
use crate::error::{CasebookError, Result};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::RwLock;

type Key = (String, Collection);

/// Map-backed collection store
#[derive(Debug, Default)]
pub struct InMemoryStore {
    files: RwLock<HashMap<Key, String>>,
    failing_writes: RwLock<HashSet<Key>>,
    failing_reads: RwLock<HashSet<Key>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a collection with raw text, bypassing encoding
    pub fn insert_raw(&self, namespace: &str, collection: Collection, contents: impl Into<String>) {
        if let Ok(mut files) = self.files.write() {
            files.insert((namespace.to_string(), collection), contents.into());
        }
    }

    /// Raw text currently stored for a collection
    pub fn raw(&self, namespace: &str, collection: Collection) -> Option<String> {
        self.files
            .read()
            .ok()?
            .get(&(namespace.to_string(), collection))
            .cloned()
    }

    /// Make every later write of this collection fail
    pub fn fail_writes(&self, namespace: &str, collection: Collection) {
        if let Ok(mut failing) = self.failing_writes.write() {
            failing.insert((namespace.to_string(), collection));
        }
    }

    /// Make every later read of this collection fail
    pub fn fail_reads(&self, namespace: &str, collection: Collection) {
        if let Ok(mut failing) = self.failing_reads.write() {
            failing.insert((namespace.to_string(), collection));
        }
    }

    fn is_failing(set: &RwLock<HashSet<Key>>, key: &Key) -> bool {
        set.read().map(|s| s.contains(key)).unwrap_or(false)
    }
}

#[async_trait]
impl CollectionStore for InMemoryStore {
    async fn read(&self, namespace: &str, collection: Collection) -> Result<Option<String>> {
        let key = (namespace.to_string(), collection);
        if Self::is_failing(&self.failing_reads, &key) {
            return Err(CasebookError::StorageRead {
                namespace: namespace.to_string(),
                collection: collection.to_string(),
                message: "injected read failure".to_string(),
            });
        }

        Ok(self.raw(namespace, collection))
    }

    async fn write(&self, namespace: &str, collection: Collection, contents: String) -> Result<()> {
        let key = (namespace.to_string(), collection);
        if Self::is_failing(&self.failing_writes, &key) {
            return Err(CasebookError::StorageWrite {
                namespace: namespace.to_string(),
                collection: collection.to_string(),
                message: "injected write failure".to_string(),
            });
        }

        let mut files = self.files.write().map_err(|_| CasebookError::StorageWrite {
            namespace: namespace.to_string(),
            collection: collection.to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        files.insert(key, contents);
        Ok(())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let files = match self.files.read() {
            Ok(files) => files,
            Err(_) => return Ok(Vec::new()),
        };
        let names: BTreeSet<String> = files.keys().map(|(ns, _)| ns.clone()).collect();
        Ok(names.into_iter().collect())
    }
}
