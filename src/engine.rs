//! Casebook facade
//!
//! The API the agent loop talks to. Reads go through the lookup cache
//! first and fall back to loading the namespace and ranking it; writes go
//! straight to the entry store. No call here fails because of storage: the
//! worst case is an empty answer and a log line.
//!
//! Writes do not invalidate cached lookups. A similar-case query may keep
//! answering from cache for up to its TTL after a new outcome is recorded.

use crate::cache::{CacheStats, TtlCache};
use crate::config::CasebookConfig;
use crate::error::Result;
use crate::retrieval::RankingPolicy;
use crate::storage::{Collection, CollectionStore, EntryStore, InMemoryStore, JsonFileStore, SaveReport};
use crate::types::{
    CaseEntry, Feedback, Learning, MemoryStats, NamespaceMemory, Outcome, RecordId, TaskContext,
};
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, error};

/// Values held by the lookup cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedLookup {
    SimilarCases(Vec<CaseEntry>),
    Recommendations(Vec<String>),
}

/// Cache key for a similar-case lookup
pub fn similar_key(namespace: &str, query: &str, limit: usize) -> String {
    format!("similar:{}:{}:{}", namespace, query, limit)
}

/// Cache key for a recommendation lookup
pub fn recommendations_key(namespace: &str, query: &str) -> String {
    format!("recommendations:{}:{}", namespace, query)
}

/// Case-based memory with cached similarity lookups
pub struct Casebook {
    store: EntryStore,
    cache: TtlCache<CachedLookup>,
    policy: RankingPolicy,
    config: CasebookConfig,
}

impl Casebook {
    /// Engine storing JSON files under `config.base_path`
    pub fn new(config: CasebookConfig) -> Result<Self> {
        let backend = Arc::new(JsonFileStore::new(&config.base_path));
        Self::with_backend(config, backend)
    }

    /// Engine over any collection store
    pub fn with_backend(config: CasebookConfig, backend: Arc<dyn CollectionStore>) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            store: EntryStore::new(backend, config.max_entries),
            cache: TtlCache::new(config.cache.default_ttl, config.cache.capacity),
            policy: config.retrieval.ranking_policy(),
            config,
        })
    }

    /// Engine that keeps everything in process memory
    pub fn in_memory() -> Self {
        let config = CasebookConfig::default();
        Self {
            store: EntryStore::new(Arc::new(InMemoryStore::new()), config.max_entries),
            cache: TtlCache::new(config.cache.default_ttl, config.cache.capacity),
            policy: config.retrieval.ranking_policy(),
            config,
        }
    }

    pub fn config(&self) -> &CasebookConfig {
        &self.config
    }

    pub fn store(&self) -> &EntryStore {
        &self.store
    }

    /// Load a namespace, bypassing the cache
    pub async fn load(&self, namespace: &str) -> NamespaceMemory {
        self.store.load(namespace).await
    }

    /// Save a namespace, applying retention
    ///
    /// An invalid namespace name writes nothing and reports every
    /// collection as failed.
    pub async fn save(&self, memory: &mut NamespaceMemory) -> SaveReport {
        let _guard = match self.store.lock_namespace(&memory.namespace).await {
            Ok(guard) => guard,
            Err(e) => {
                error!("Not saving '{}': {}", memory.namespace, e);
                return SaveReport {
                    failed: Collection::all().to_vec(),
                    trimmed: 0,
                };
            }
        };
        self.store.save(memory).await
    }

    pub async fn record_success(
        &self,
        namespace: &str,
        query: &str,
        context: TaskContext,
        details: &str,
        feedback: Option<Feedback>,
    ) -> CaseEntry {
        self.record_outcome(namespace, query, context, details, Outcome::Success, feedback)
            .await
    }

    pub async fn record_failure(
        &self,
        namespace: &str,
        query: &str,
        context: TaskContext,
        details: &str,
        feedback: Option<Feedback>,
    ) -> CaseEntry {
        self.record_outcome(namespace, query, context, details, Outcome::Failure, feedback)
            .await
    }

    /// Record a task outcome; returns the stored entry
    pub async fn record_outcome(
        &self,
        namespace: &str,
        query: &str,
        context: TaskContext,
        details: &str,
        outcome: Outcome,
        feedback: Option<Feedback>,
    ) -> CaseEntry {
        self.store
            .record_outcome(namespace, query, context, details, outcome, feedback)
            .await
    }

    /// Create or reinforce a learning
    pub async fn add_learning(
        &self,
        namespace: &str,
        pattern_key: &str,
        description: &str,
        recommendation_text: &str,
        example_ids: Vec<RecordId>,
    ) -> Learning {
        self.store
            .add_learning(namespace, pattern_key, description, recommendation_text, example_ids)
            .await
    }

    /// Past cases most similar to `query`, best first
    pub async fn get_similar_cases(&self, namespace: &str, query: &str, limit: usize) -> Vec<CaseEntry> {
        let key = similar_key(namespace, query, limit);
        if let Some(CachedLookup::SimilarCases(cases)) = self.cache.get(&key) {
            debug!("Cache hit: {}", key);
            return cases;
        }
        debug!("Cache miss: {}", key);

        let memory = self.store.load(namespace).await;
        let cases: Vec<CaseEntry> = self
            .policy
            .rank_cases(query, memory.all_entries(), limit)
            .into_iter()
            .map(|scored| scored.entry)
            .collect();

        self.cache.set(
            key,
            CachedLookup::SimilarCases(cases.clone()),
            Some(self.config.cache.similar_ttl),
        );
        cases
    }

    /// Similar cases using the configured default limit
    pub async fn get_similar_cases_default(&self, namespace: &str, query: &str) -> Vec<CaseEntry> {
        self.get_similar_cases(namespace, query, self.config.retrieval.default_limit)
            .await
    }

    /// Recommendation texts of confident learnings matching `query`
    pub async fn get_recommendations(&self, namespace: &str, query: &str) -> Vec<String> {
        let key = recommendations_key(namespace, query);
        if let Some(CachedLookup::Recommendations(recommendations)) = self.cache.get(&key) {
            debug!("Cache hit: {}", key);
            return recommendations;
        }
        debug!("Cache miss: {}", key);

        let memory = self.store.load(namespace).await;
        let recommendations = self.policy.recommendations(query, &memory.learnings);

        self.cache.set(
            key,
            CachedLookup::Recommendations(recommendations.clone()),
            Some(self.config.cache.recommendations_ttl),
        );
        recommendations
    }

    /// Learnings confident enough to apply unprompted, most confident first
    pub async fn high_confidence_learnings(&self, namespace: &str) -> Vec<Learning> {
        let threshold = self.config.retrieval.high_confidence_threshold;
        let mut learnings: Vec<Learning> = self
            .store
            .load(namespace)
            .await
            .learnings
            .into_iter()
            .filter(|l| l.confidence > threshold)
            .collect();

        learnings.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        learnings
    }

    /// Freshly computed totals for a namespace
    pub async fn get_stats(&self, namespace: &str) -> MemoryStats {
        self.store.load(namespace).await.stats
    }

    pub fn get_cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
    }

    /// Namespaces with stored data
    pub async fn namespaces(&self) -> Vec<String> {
        self.store.list_namespaces().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Complexity;

    #[tokio::test]
    async fn test_stats_scenario() {
        let casebook = Casebook::in_memory();
        for i in 0..3 {
            casebook
                .record_success("writer", &format!("write article {}", i), TaskContext::default(), "ok", None)
                .await;
        }
        for i in 0..2 {
            casebook
                .record_failure("writer", &format!("write review {}", i), TaskContext::default(), "bad", None)
                .await;
        }

        let stats = casebook.get_stats("writer").await;
        assert_eq!(stats.total_tasks, 5);
        assert!((stats.success_rate - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_similar_cases_ranking() {
        let casebook = Casebook::in_memory();
        let context = TaskContext::new(Complexity::Low).with_areas(["auth"]);
        casebook
            .record_success("writer", "update color palette", TaskContext::default(), "", None)
            .await;
        casebook
            .record_failure("writer", "fix login button bug", context, "flaky test", None)
            .await;

        let cases = casebook.get_similar_cases("writer", "fix login bug", 5).await;
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].query_text, "fix login button bug");
        assert_eq!(cases[0].outcome, Outcome::Failure);
    }

    #[tokio::test]
    async fn test_lookups_are_cached() {
        let casebook = Casebook::in_memory();
        casebook
            .record_success("writer", "fix login button", TaskContext::default(), "", None)
            .await;

        let first = casebook.get_similar_cases("writer", "login button", 5).await;
        assert_eq!(casebook.get_cache_stats().size, 1);

        // Served from cache until the TTL lapses, even after a new record
        casebook
            .record_success("writer", "login button styling", TaskContext::default(), "", None)
            .await;
        let second = casebook.get_similar_cases("writer", "login button", 5).await;
        assert_eq!(first, second);
        assert_eq!(casebook.get_cache_stats().hits, 1);

        // A different limit is a different key
        let third = casebook.get_similar_cases("writer", "login button", 4).await;
        assert_eq!(third.len(), 2);

        casebook.clear_cache();
        assert_eq!(casebook.get_cache_stats().size, 0);
        assert_eq!(casebook.get_similar_cases("writer", "login button", 5).await.len(), 2);
    }

    #[tokio::test]
    async fn test_recommendations_require_confidence() {
        let casebook = Casebook::in_memory();
        casebook
            .add_learning("writer", "avoid:passive voice", "d", "Avoid passive voice", vec![])
            .await;
        assert!(casebook
            .get_recommendations("writer", "passive voice")
            .await
            .is_empty());

        casebook.clear_cache();
        casebook
            .add_learning("writer", "avoid:passive voice", "d", "Avoid passive voice", vec![])
            .await;
        assert_eq!(
            casebook.get_recommendations("writer", "passive voice").await,
            vec!["Avoid passive voice".to_string()]
        );
    }

    #[tokio::test]
    async fn test_high_confidence_learnings() {
        let casebook = Casebook::in_memory();
        for _ in 0..4 {
            casebook.add_learning("writer", "strong", "d", "r1", vec![]).await;
        }
        for _ in 0..3 {
            casebook.add_learning("writer", "middling", "d", "r2", vec![]).await;
        }
        casebook.add_learning("writer", "weak", "d", "r3", vec![]).await;

        let learnings = casebook.high_confidence_learnings("writer").await;
        let keys: Vec<_> = learnings.iter().map(|l| l.pattern_key.as_str()).collect();
        assert_eq!(keys, vec!["strong"]);
    }

    #[tokio::test]
    async fn test_huge_configured_ttls_do_not_panic() {
        let mut config = CasebookConfig::default();
        config.cache.similar_ttl = std::time::Duration::from_secs(u64::MAX);
        config.cache.recommendations_ttl = std::time::Duration::from_secs(u64::MAX);
        let casebook = Casebook::with_backend(config, Arc::new(InMemoryStore::new())).unwrap();

        casebook
            .record_success("writer", "fix login button", TaskContext::default(), "", None)
            .await;
        assert_eq!(casebook.get_similar_cases("writer", "login button", 5).await.len(), 1);
        assert!(casebook.get_recommendations("writer", "login button").await.is_empty());
        assert_eq!(casebook.get_cache_stats().size, 2);
    }

    #[tokio::test]
    async fn test_default_limit_is_applied() {
        let casebook = Casebook::in_memory();
        for i in 0..7 {
            casebook
                .record_success("writer", &format!("login button fix {}", i), TaskContext::default(), "", None)
                .await;
        }

        let cases = casebook.get_similar_cases_default("writer", "login button").await;
        assert_eq!(cases.len(), casebook.config().retrieval.default_limit);
        assert_eq!(cases.len(), 5);
    }

    #[tokio::test]
    async fn test_save_under_invalid_namespace_reports_failure() {
        let casebook = Casebook::in_memory();
        let mut memory = NamespaceMemory::empty("../outside");

        let report = casebook.save(&mut memory).await;
        assert!(!report.is_complete());
        assert_eq!(report.failed, Collection::all().to_vec());
        assert!(casebook.namespaces().await.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_config_is_rejected() {
        let mut config = CasebookConfig::default();
        config.max_entries = 0;
        assert!(Casebook::with_backend(config, Arc::new(InMemoryStore::new())).is_err());
    }
}
