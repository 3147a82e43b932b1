//! Persistent entry store
//!
//! Loads and saves the three collections of a namespace through a
//! [`CollectionStore`], applying retention on save. Storage failures stop
//! here: an unreadable collection loads as empty and a failed write is
//! reported in the [`SaveReport`], both with a log line. Memory lookups must
//! never fail the task that asked for them.
//!
//! Each load-mutate-save sequence holds a per-namespace async mutex, so
//! concurrent writers to one namespace cannot lose each other's updates.

use super::codec;
use super::{validate_namespace, Collection, CollectionStore};
use crate::error::Result;
use crate::types::{CaseEntry, Feedback, Learning, NamespaceMemory, Outcome, RecordId, TaskContext};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, error, info, warn};

/// Keep the `max` most recent entries by timestamp
///
/// Lists within the limit are left untouched, order included. Longer lists
/// are sorted newest first (stable on equal timestamps) and truncated.
/// Returns how many entries were dropped.
pub fn trim_entries(entries: &mut Vec<CaseEntry>, max: usize) -> usize {
    if entries.len() <= max {
        return 0;
    }

    entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    let dropped = entries.len() - max;
    entries.truncate(max);
    dropped
}

/// What happened during a save
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveReport {
    /// Collections whose write failed; the others were still written
    pub failed: Vec<Collection>,

    /// Entries removed by retention across successes and failures
    pub trimmed: usize,
}

impl SaveReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Namespace-partitioned store of case entries and learnings
pub struct EntryStore {
    backend: Arc<dyn CollectionStore>,
    max_entries: usize,
    locks: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl EntryStore {
    pub fn new(backend: Arc<dyn CollectionStore>, max_entries: usize) -> Self {
        Self {
            backend,
            max_entries,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    pub fn backend(&self) -> &Arc<dyn CollectionStore> {
        &self.backend
    }

    /// Serialize load-mutate-save sequences on one namespace
    ///
    /// Invalid namespace names are rejected before any lock is created for
    /// them.
    pub async fn lock_namespace(&self, namespace: &str) -> Result<OwnedMutexGuard<()>> {
        validate_namespace(namespace)?;
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|p| p.into_inner());
            locks.entry(namespace.to_string()).or_default().clone()
        };
        Ok(lock.lock_owned().await)
    }

    /// Load everything stored for a namespace
    ///
    /// Missing or unreadable collections load as empty. Stats are computed
    /// from what was loaded.
    pub async fn load(&self, namespace: &str) -> NamespaceMemory {
        let successes: Vec<CaseEntry> = self.load_collection(namespace, Collection::Successes).await;
        let failures: Vec<CaseEntry> = self.load_collection(namespace, Collection::Failures).await;
        let mut learnings: Vec<Learning> =
            self.load_collection(namespace, Collection::Learnings).await;
        learnings.iter_mut().for_each(Learning::normalize);

        debug!(
            "Loaded namespace '{}': {} successes, {} failures, {} learnings",
            namespace,
            successes.len(),
            failures.len(),
            learnings.len()
        );

        NamespaceMemory::new(namespace, successes, failures, learnings)
    }

    /// Trim and write all three collections of a namespace
    ///
    /// Retention applies to successes and failures only; learnings are kept
    /// indefinitely. Each collection is written independently: one failing
    /// does not stop or undo the others. The trimmed view is left in
    /// `memory` whether or not the writes succeeded.
    pub async fn save(&self, memory: &mut NamespaceMemory) -> SaveReport {
        let mut report = SaveReport {
            trimmed: trim_entries(&mut memory.successes, self.max_entries)
                + trim_entries(&mut memory.failures, self.max_entries),
            ..Default::default()
        };
        if report.trimmed > 0 {
            debug!(
                "Retention dropped {} entries from namespace '{}'",
                report.trimmed, memory.namespace
            );
        }
        memory.refresh_stats();

        let namespace = memory.namespace.as_str();
        let writes = [
            (
                Collection::Successes,
                self.write_collection(namespace, Collection::Successes, &memory.successes)
                    .await,
            ),
            (
                Collection::Failures,
                self.write_collection(namespace, Collection::Failures, &memory.failures)
                    .await,
            ),
            (
                Collection::Learnings,
                self.write_collection(namespace, Collection::Learnings, &memory.learnings)
                    .await,
            ),
        ];

        for (collection, result) in writes {
            if let Err(e) = result {
                error!("Failed to save {} for '{}': {}", collection, namespace, e);
                report.failed.push(collection);
            }
        }

        report
    }

    /// Append a new case entry to the namespace and save
    pub async fn record_outcome(
        &self,
        namespace: &str,
        query_text: &str,
        context: TaskContext,
        details: &str,
        outcome: Outcome,
        feedback: Option<Feedback>,
    ) -> CaseEntry {
        let entry = CaseEntry::new(query_text, context, details, outcome, feedback);
        let _guard = match self.lock_namespace(namespace).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Not recording {} for '{}': {}", outcome, namespace, e);
                return entry;
            }
        };
        let mut memory = self.load(namespace).await;

        match outcome {
            Outcome::Success => memory.successes.push(entry.clone()),
            Outcome::Failure => memory.failures.push(entry.clone()),
        }
        self.save(&mut memory).await;

        info!("[{}] Recorded {}: {}", namespace, outcome, query_text);
        entry
    }

    /// Create or reinforce the learning stored under `pattern_key`
    ///
    /// A new pattern starts at confidence 0.5 with one occurrence. A known
    /// one gains 0.1 confidence (capped at 1.0), one occurrence, a fresh
    /// `last_seen`, and the given example ids.
    pub async fn add_learning(
        &self,
        namespace: &str,
        pattern_key: &str,
        description: &str,
        recommendation_text: &str,
        example_ids: Vec<RecordId>,
    ) -> Learning {
        let _guard = match self.lock_namespace(namespace).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Not recording learning '{}' for '{}': {}", pattern_key, namespace, e);
                return Learning::new(pattern_key, description, recommendation_text, example_ids);
            }
        };
        let mut memory = self.load(namespace).await;

        let learning = match memory
            .learnings
            .iter_mut()
            .find(|l| l.pattern_key == pattern_key)
        {
            Some(existing) => {
                existing.reinforce(example_ids);
                existing.clone()
            }
            None => {
                let learning =
                    Learning::new(pattern_key, description, recommendation_text, example_ids);
                memory.learnings.push(learning.clone());
                learning
            }
        };
        self.save(&mut memory).await;

        info!(
            "[{}] Learning '{}' now at confidence {:.2} ({} occurrences)",
            namespace, pattern_key, learning.confidence, learning.occurrence_count
        );
        learning
    }

    /// Namespaces that have anything stored, empty if the backend fails
    pub async fn list_namespaces(&self) -> Vec<String> {
        self.backend.namespaces().await.unwrap_or_else(|e| {
            warn!("Failed to list namespaces: {}", e);
            Vec::new()
        })
    }

    async fn load_collection<T: DeserializeOwned>(
        &self,
        namespace: &str,
        collection: Collection,
    ) -> Vec<T> {
        self.read_collection(namespace, collection)
            .await
            .unwrap_or_else(|e| {
                warn!("Treating {} of '{}' as empty: {}", collection, namespace, e);
                Vec::new()
            })
    }

    /// Read and decode one collection, surfacing every failure
    pub async fn read_collection<T: DeserializeOwned>(
        &self,
        namespace: &str,
        collection: Collection,
    ) -> Result<Vec<T>> {
        validate_namespace(namespace)?;
        match self.backend.read(namespace, collection).await? {
            Some(contents) => codec::decode(namespace, collection, &contents),
            None => Ok(Vec::new()),
        }
    }

    async fn write_collection<T: Serialize + Sync>(
        &self,
        namespace: &str,
        collection: Collection,
        records: &[T],
    ) -> Result<()> {
        validate_namespace(namespace)?;
        let contents = codec::encode(records)?;
        self.backend.write(namespace, collection, contents).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;
    use chrono::{Duration, Utc};

    fn entry_at(query: &str, minutes_ago: i64) -> CaseEntry {
        let mut entry = CaseEntry::new(query, TaskContext::default(), "", Outcome::Success, None);
        entry.timestamp = Utc::now() - Duration::minutes(minutes_ago);
        entry
    }

    fn store_with(max_entries: usize) -> (Arc<InMemoryStore>, EntryStore) {
        let backend = Arc::new(InMemoryStore::new());
        let store = EntryStore::new(backend.clone(), max_entries);
        (backend, store)
    }

    #[test]
    fn test_trim_within_limit_is_untouched() {
        let mut entries = vec![entry_at("old", 10), entry_at("new", 1)];
        let dropped = trim_entries(&mut entries, 2);
        assert_eq!(dropped, 0);
        assert_eq!(entries[0].query_text, "old");
    }

    #[test]
    fn test_trim_keeps_most_recent() {
        let mut entries = vec![
            entry_at("oldest", 30),
            entry_at("newest", 1),
            entry_at("middle", 15),
        ];
        let dropped = trim_entries(&mut entries, 2);
        assert_eq!(dropped, 1);
        let kept: Vec<_> = entries.iter().map(|e| e.query_text.as_str()).collect();
        assert_eq!(kept, vec!["newest", "middle"]);
    }

    #[tokio::test]
    async fn test_load_missing_namespace_is_empty() {
        let (_, store) = store_with(10);
        let memory = store.load("nobody").await;
        assert!(memory.successes.is_empty());
        assert!(memory.failures.is_empty());
        assert!(memory.learnings.is_empty());
        assert_eq!(memory.stats.total_tasks, 0);
    }

    #[tokio::test]
    async fn test_corrupt_collection_degrades_alone() {
        let (backend, store) = store_with(10);
        store
            .record_outcome("writer", "draft intro", TaskContext::default(), "", Outcome::Failure, None)
            .await;
        backend.insert_raw("writer", Collection::Successes, "{ definitely not json");

        let memory = store.load("writer").await;
        assert!(memory.successes.is_empty());
        assert_eq!(memory.failures.len(), 1);
    }

    #[tokio::test]
    async fn test_unreadable_collection_degrades() {
        let (backend, store) = store_with(10);
        backend.fail_reads("writer", Collection::Learnings);

        let result: Result<Vec<Learning>> =
            store.read_collection("writer", Collection::Learnings).await;
        assert!(result.is_err());
        assert!(store.load("writer").await.learnings.is_empty());
    }

    #[tokio::test]
    async fn test_write_failure_does_not_block_other_collections() {
        let (backend, store) = store_with(10);
        backend.fail_writes("writer", Collection::Successes);

        let mut memory = NamespaceMemory::new(
            "writer",
            vec![entry_at("a", 1)],
            vec![entry_at("b", 2)],
            vec![Learning::new("k", "d", "r", vec![])],
        );
        let report = store.save(&mut memory).await;

        assert_eq!(report.failed, vec![Collection::Successes]);
        assert!(!report.is_complete());
        assert!(backend.raw("writer", Collection::Successes).is_none());
        assert!(backend.raw("writer", Collection::Failures).is_some());
        assert!(backend.raw("writer", Collection::Learnings).is_some());
    }

    #[tokio::test]
    async fn test_save_trims_entries_not_learnings() {
        let (_, store) = store_with(2);
        let learnings: Vec<_> = (0..5)
            .map(|i| Learning::new(format!("pattern {}", i), "d", "r", vec![]))
            .collect();
        let mut memory = NamespaceMemory::new(
            "writer",
            (0..4).map(|i| entry_at("s", i)).collect(),
            (0..3).map(|i| entry_at("f", i)).collect(),
            learnings,
        );

        let report = store.save(&mut memory).await;
        assert_eq!(report.trimmed, 3);
        assert_eq!(memory.stats.total_tasks, 4);

        let reloaded = store.load("writer").await;
        assert_eq!(reloaded.successes.len(), 2);
        assert_eq!(reloaded.failures.len(), 2);
        assert_eq!(reloaded.learnings.len(), 5);
    }

    #[tokio::test]
    async fn test_add_learning_reinforces_existing_pattern() {
        let (_, store) = store_with(10);
        let first = store
            .add_learning("writer", "avoid:passive voice", "d", "Avoid passive voice", vec![RecordId::from("t1")])
            .await;
        let second = store
            .add_learning("writer", "avoid:passive voice", "ignored", "ignored", vec![RecordId::from("t2")])
            .await;

        assert_eq!(first.id, second.id);
        assert_eq!(second.occurrence_count, 2);
        assert_eq!(second.confidence, 0.6);
        assert_eq!(second.recommendation_text, "Avoid passive voice");
        assert_eq!(
            second.example_entry_ids,
            vec![RecordId::from("t1"), RecordId::from("t2")]
        );

        let memory = store.load("writer").await;
        assert_eq!(memory.learnings.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_records_are_not_lost() {
        let (_, store) = store_with(100);
        let store = Arc::new(store);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .record_outcome(
                            "writer",
                            &format!("task number {}", i),
                            TaskContext::default(),
                            "",
                            Outcome::Success,
                            None,
                        )
                        .await
                })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.load("writer").await.successes.len(), 8);
    }

    #[tokio::test]
    async fn test_invalid_namespace_is_not_written() {
        let (backend, store) = store_with(10);
        store
            .record_outcome("../escape", "task", TaskContext::default(), "", Outcome::Success, None)
            .await;
        assert!(backend.namespaces().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_namespaces_get_no_lock() {
        let (_, store) = store_with(10);
        for namespace in ["", "..", "a/b", "c\\d"] {
            store
                .record_outcome(namespace, "task", TaskContext::default(), "", Outcome::Success, None)
                .await;
            let learning = store.add_learning(namespace, "pattern", "d", "r", vec![]).await;
            assert_eq!(learning.occurrence_count, 1);
            assert!(store.lock_namespace(namespace).await.is_err());
        }
        assert!(store.locks.lock().unwrap().is_empty());

        store
            .record_outcome("writer", "task", TaskContext::default(), "", Outcome::Success, None)
            .await;
        assert_eq!(store.locks.lock().unwrap().len(), 1);
    }
}
