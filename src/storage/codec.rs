//! On-disk shape of a collection
//!
//! Collections are written as a bare JSON array. Some writers wrap the
//! array in an object keyed by the collection name
//! (`{ "successes": [...] }`); both decode to the same `Vec`.

use super::Collection;
use crate::error::{CasebookError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Either accepted layout of a persisted collection
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum CollectionFile<T> {
    Bare(Vec<T>),
    Wrapped(HashMap<String, serde_json::Value>),
}

impl<T: DeserializeOwned> CollectionFile<T> {
    /// Collapse to the canonical array form
    ///
    /// A wrapped object without a field named after the collection is an
    /// error; the entry store turns it into an empty collection.
    pub fn into_records(self, namespace: &str, collection: Collection) -> Result<Vec<T>> {
        match self {
            CollectionFile::Bare(records) => Ok(records),
            CollectionFile::Wrapped(mut fields) => {
                let value = fields
                    .remove(collection.file_stem())
                    .ok_or_else(|| CasebookError::StorageRead {
                        namespace: namespace.to_string(),
                        collection: collection.to_string(),
                        message: format!(
                            "object has no '{}' field",
                            collection.file_stem()
                        ),
                    })?;
                Ok(serde_json::from_value(value)?)
            }
        }
    }
}

/// Decode a collection from its serialized text
pub fn decode<T: DeserializeOwned>(
    namespace: &str,
    collection: Collection,
    contents: &str,
) -> Result<Vec<T>> {
    let file: CollectionFile<T> =
        serde_json::from_str(contents).map_err(|e| CasebookError::StorageRead {
            namespace: namespace.to_string(),
            collection: collection.to_string(),
            message: e.to_string(),
        })?;
    file.into_records(namespace, collection)
}

/// Encode a collection as a pretty-printed bare array
pub fn encode<T: Serialize>(records: &[T]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}
