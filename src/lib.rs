//! Casebook - Case-Based Memory for Task-Executing Agents
//!
//! Agents record what happened on each task and ask, before the next one,
//! which past tasks looked similar and what they have learned. Casebook
//! provides:
//! - Namespace-partitioned storage of successes, failures, and learnings
//! - Keyword (Jaccard) similarity retrieval of past cases
//! - Confidence-weighted learnings reinforced by repeated observations
//! - A TTL and capacity bounded cache in front of lookups
//!
//! # Architecture
//!
//! - **Types**: Case entries, learnings, namespace aggregates
//! - **Storage**: Collection backends and the entry store with retention
//! - **Retrieval**: Keyword extraction, similarity, and ranking policy
//! - **Cache**: Lazy-expiry LRU cache for lookup results
//! - **Engine**: The `Casebook` facade used by the agent loop
//! - **Feedback**: Turns user feedback into learnings
//!
//! Storage problems never surface to the caller. Unreadable data loads as
//! empty and failed writes are logged, because memory is an aid to the
//! agent's task and must not be the reason it fails.
//!
//! # Example
//!
//! ```no_run
//! use casebook::{Casebook, CasebookConfig, TaskContext};
//!
//! # async fn example() -> casebook::Result<()> {
//! let casebook = Casebook::new(CasebookConfig::with_base_path(".agents/memory"))?;
//!
//! // Record an outcome
//! let entry = casebook
//!     .record_success("writer", "fix login button bug", TaskContext::default(), "patched handler", None)
//!     .await;
//!
//! // Learn from it
//! casebook
//!     .add_learning("writer", "login flow", "Login bugs hide in handlers", "Check the submit handler first", vec![entry.id])
//!     .await;
//!
//! // Recall before the next task
//! let similar = casebook.get_similar_cases("writer", "fix login bug", 5).await;
//! let advice = casebook.get_recommendations("writer", "login flow issue").await;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod feedback;
pub mod retrieval;
pub mod storage;
pub mod types;

// Re-export commonly used types
pub use cache::{CacheStats, TtlCache};
pub use config::CasebookConfig;
pub use engine::{CachedLookup, Casebook};
pub use error::{CasebookError, Result};
pub use feedback::{FeedbackCollector, FeedbackPatterns, UserFeedback};
pub use retrieval::{extract_keywords, similarity, RankingPolicy, ScoredEntry};
pub use storage::{
    trim_entries, Collection, CollectionStore, EntryStore, InMemoryStore, JsonFileStore,
    SaveReport,
};
pub use types::{
    CaseEntry, Complexity, Feedback, Learning, MemoryStats, NamespaceMemory, Outcome, RecordId,
    TaskContext,
};
