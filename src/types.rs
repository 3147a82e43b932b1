//! Core data types for the Casebook memory engine
//!
//! This module defines the records persisted per namespace: case entries
//! (one recorded task outcome each), learnings (aggregated, confidence-scored
//! patterns), and the in-memory aggregate of a namespace. Field names on disk
//! are camelCase; aliases accept the field names used by older writers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Confidence assigned to a learning on its first observation
pub const INITIAL_CONFIDENCE: f64 = 0.5;

/// Confidence gained each time a learning is observed again
pub const CONFIDENCE_STEP: f64 = 0.1;

/// Unique identifier for case entries and learnings
///
/// New ids are UUID v7, so they sort by creation time. Ids written by other
/// tools are kept verbatim as opaque strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl RecordId {
    /// Create a new time-ordered id
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RecordId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for RecordId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Rough size of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Low,
    #[default]
    Medium,
    High,
}

impl std::fmt::Display for Complexity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Complexity::Low => write!(f, "low"),
            Complexity::Medium => write!(f, "medium"),
            Complexity::High => write!(f, "high"),
        }
    }
}

/// Whether a recorded task succeeded
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success)
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Success => write!(f, "success"),
            Outcome::Failure => write!(f, "failure"),
        }
    }
}

/// Where a task happened: touched files, area tags, and its complexity
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskContext {
    #[serde(default)]
    pub files: Vec<String>,

    #[serde(default)]
    pub areas: Vec<String>,

    #[serde(default)]
    pub complexity: Complexity,
}

impl TaskContext {
    pub fn new(complexity: Complexity) -> Self {
        Self {
            files: Vec::new(),
            areas: Vec::new(),
            complexity,
        }
    }

    pub fn with_files<I, S>(mut self, files: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.files = files.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_areas<I, S>(mut self, areas: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.areas = areas.into_iter().map(Into::into).collect();
        self
    }
}

/// Feedback a user attached to a recorded task
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub satisfied: bool,

    #[serde(default)]
    pub likes: Vec<String>,

    #[serde(default)]
    pub dislikes: Vec<String>,

    #[serde(default)]
    pub suggestions: Vec<String>,
}

/// One recorded task outcome
///
/// Entries are never edited after creation. They leave their namespace only
/// through retention trimming when the namespace is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseEntry {
    #[serde(default)]
    pub id: RecordId,

    /// Missing timestamps decode as the Unix epoch, so such entries are the
    /// first to go under retention
    #[serde(default)]
    pub timestamp: DateTime<Utc>,

    /// Task description used for similarity matching
    #[serde(alias = "taskDescription")]
    pub query_text: String,

    #[serde(default)]
    pub context: TaskContext,

    #[serde(alias = "result")]
    pub outcome: Outcome,

    #[serde(default)]
    pub details: String,

    #[serde(default, alias = "userFeedback", skip_serializing_if = "Option::is_none")]
    pub feedback: Option<Feedback>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

impl CaseEntry {
    /// Create a new entry stamped with a fresh id and the current time
    pub fn new(
        query_text: impl Into<String>,
        context: TaskContext,
        details: impl Into<String>,
        outcome: Outcome,
        feedback: Option<Feedback>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            timestamp: Utc::now(),
            query_text: query_text.into(),
            context,
            outcome,
            details: details.into(),
            feedback,
            metadata: None,
        }
    }
}

/// A pattern aggregated from repeated observations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Learning {
    #[serde(default)]
    pub id: RecordId,

    /// Key under which repeated observations merge
    #[serde(alias = "pattern")]
    pub pattern_key: String,

    #[serde(default)]
    pub description: String,

    #[serde(alias = "recommendation")]
    pub recommendation_text: String,

    /// Always within [0, 1]; never decreases
    #[serde(default = "default_confidence")]
    pub confidence: f64,

    #[serde(default = "default_occurrences", alias = "occurrences")]
    pub occurrence_count: u32,

    #[serde(default = "Utc::now")]
    pub last_seen: DateTime<Utc>,

    /// Ids of case entries that illustrate this pattern. Lookup only: the
    /// entries may since have been trimmed away.
    #[serde(default, alias = "examples")]
    pub example_entry_ids: Vec<RecordId>,
}

fn default_confidence() -> f64 {
    INITIAL_CONFIDENCE
}

fn default_occurrences() -> u32 {
    1
}

impl Learning {
    /// Create a learning on the first observation of its pattern
    pub fn new(
        pattern_key: impl Into<String>,
        description: impl Into<String>,
        recommendation_text: impl Into<String>,
        example_entry_ids: Vec<RecordId>,
    ) -> Self {
        Self {
            id: RecordId::new(),
            pattern_key: pattern_key.into(),
            description: description.into(),
            recommendation_text: recommendation_text.into(),
            confidence: INITIAL_CONFIDENCE,
            occurrence_count: 1,
            last_seen: Utc::now(),
            example_entry_ids,
        }
    }

    /// Record another observation of this pattern
    pub fn reinforce(&mut self, example_entry_ids: impl IntoIterator<Item = RecordId>) {
        self.occurrence_count = self.occurrence_count.saturating_add(1);
        self.last_seen = Utc::now();
        self.confidence = (self.confidence + CONFIDENCE_STEP).min(1.0);
        self.example_entry_ids.extend(example_entry_ids);
    }

    /// Pull values written by other tools back inside the documented domain
    pub(crate) fn normalize(&mut self) {
        if !self.confidence.is_finite() {
            self.confidence = INITIAL_CONFIDENCE;
        }
        self.confidence = self.confidence.clamp(0.0, 1.0);
        self.occurrence_count = self.occurrence_count.max(1);
    }
}

/// Derived statistics of a namespace, recomputed on every load
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryStats {
    pub total_tasks: usize,

    /// successes / total, or 0 when nothing has been recorded
    pub success_rate: f64,

    pub last_updated: DateTime<Utc>,
}

/// Everything stored for one namespace
#[derive(Debug, Clone)]
pub struct NamespaceMemory {
    pub namespace: String,
    pub successes: Vec<CaseEntry>,
    pub failures: Vec<CaseEntry>,
    pub learnings: Vec<Learning>,
    pub stats: MemoryStats,
}

impl NamespaceMemory {
    pub fn new(
        namespace: impl Into<String>,
        successes: Vec<CaseEntry>,
        failures: Vec<CaseEntry>,
        learnings: Vec<Learning>,
    ) -> Self {
        let mut memory = Self {
            namespace: namespace.into(),
            successes,
            failures,
            learnings,
            stats: MemoryStats {
                total_tasks: 0,
                success_rate: 0.0,
                last_updated: Utc::now(),
            },
        };
        memory.refresh_stats();
        memory
    }

    /// Empty memory for a namespace nothing has been recorded in
    pub fn empty(namespace: impl Into<String>) -> Self {
        Self::new(namespace, Vec::new(), Vec::new(), Vec::new())
    }

    pub fn refresh_stats(&mut self) {
        let total_tasks = self.successes.len() + self.failures.len();
        let success_rate = if total_tasks > 0 {
            self.successes.len() as f64 / total_tasks as f64
        } else {
            0.0
        };

        self.stats = MemoryStats {
            total_tasks,
            success_rate,
            last_updated: Utc::now(),
        };
    }

    /// Successes followed by failures, in stored order
    pub fn all_entries(&self) -> impl Iterator<Item = &CaseEntry> {
        self.successes.iter().chain(self.failures.iter())
    }

    pub fn find_learning(&self, pattern_key: &str) -> Option<&Learning> {
        self.learnings.iter().find(|l| l.pattern_key == pattern_key)
    }
}
