//! Storage layer for the Casebook memory engine
//!
//! Each namespace owns three independently persisted collections
//! (successes, failures, learnings). Backends only move serialized text
//! around; decoding, retention, and the degrade-on-failure policy live in
//! [`EntryStore`].

pub mod codec;
pub mod entry_store;
pub mod json_file;
pub mod memory;

pub use entry_store::{trim_entries, EntryStore, SaveReport};
pub use json_file::JsonFileStore;
pub use memory::InMemoryStore;

use crate::error::{CasebookError, Result};
use async_trait::async_trait;

/// One of the three persisted collections of a namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Successes,
    Failures,
    Learnings,
}

impl Collection {
    /// File stem on disk; also the field name accepted by the wrapped shape
    pub fn file_stem(&self) -> &'static str {
        match self {
            Collection::Successes => "successes",
            Collection::Failures => "failures",
            Collection::Learnings => "learnings",
        }
    }

    pub fn all() -> [Collection; 3] {
        [
            Collection::Successes,
            Collection::Failures,
            Collection::Learnings,
        ]
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.file_stem())
    }
}

/// Raw persistence for serialized collections
#[async_trait]
pub trait CollectionStore: Send + Sync {
    /// Read a collection's serialized form, `None` if it was never written
    async fn read(&self, namespace: &str, collection: Collection) -> Result<Option<String>>;

    /// Replace a collection's serialized form
    async fn write(&self, namespace: &str, collection: Collection, contents: String) -> Result<()>;

    /// Namespaces that have anything stored
    async fn namespaces(&self) -> Result<Vec<String>>;
}

/// Reject namespace names that are empty or could escape the storage root
pub fn validate_namespace(namespace: &str) -> Result<()> {
    if namespace.trim().is_empty() {
        return Err(CasebookError::InvalidNamespace(
            "namespace cannot be empty".to_string(),
        ));
    }

    if namespace == "." || namespace == ".." {
        return Err(CasebookError::InvalidNamespace(namespace.to_string()));
    }

    if namespace.contains(['/', '\\', '\0']) {
        return Err(CasebookError::InvalidNamespace(format!(
            "'{}' contains a path separator",
            namespace
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("writer").is_ok());
        assert!(validate_namespace("seo-agent_2").is_ok());

        assert!(validate_namespace("").is_err());
        assert!(validate_namespace("   ").is_err());
        assert!(validate_namespace("..").is_err());
        assert!(validate_namespace("../etc").is_err());
        assert!(validate_namespace("a\\b").is_err());
    }

    #[test]
    fn test_collection_file_stems() {
        let stems: Vec<_> = Collection::all().iter().map(|c| c.file_stem()).collect();
        assert_eq!(stems, vec!["successes", "failures", "learnings"]);
    }
}
