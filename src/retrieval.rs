//! Keyword similarity retrieval
//!
//! Relevance is the Jaccard similarity of keyword sets: lowercase the text,
//! turn everything but ASCII letters, digits, underscores and whitespace
//! into spaces, split on whitespace, and keep tokens longer than three
//! characters. Accented letters are separators, so "notícia" contributes
//! only its short ASCII fragments, which are then dropped. No stemming, no embeddings. Corpora
//! are bounded by retention, so a linear scan per query is acceptable.

use crate::types::{CaseEntry, Learning};
use once_cell::sync::Lazy;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Minimum similarity for a case or learning to count as relevant
pub const RELEVANCE_THRESHOLD: f64 = 0.3;

/// Minimum confidence for a learning to be recommended
pub const CONFIDENCE_THRESHOLD: f64 = 0.5;

static NON_WORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9_\s]").expect("non-word pattern is valid"));

/// Extract matching keywords from free text
///
/// Tokens of three characters or fewer are dropped, so "fix login bug"
/// yields only `["login"]`. Empty or whitespace-only input yields no
/// keywords.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    NON_WORD
        .replace_all(&lowered, " ")
        .split_whitespace()
        .filter(|word| word.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of two keyword lists, treated as sets
///
/// Symmetric, within [0, 1], and 0 when both sets are empty.
pub fn similarity(a: &[String], b: &[String]) -> f64 {
    let set_a: HashSet<&str> = a.iter().map(String::as_str).collect();
    let set_b: HashSet<&str> = b.iter().map(String::as_str).collect();

    let union = set_a.union(&set_b).count();
    if union == 0 {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    intersection as f64 / union as f64
}

/// A case entry together with its relevance to a query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredEntry {
    pub entry: CaseEntry,
    pub score: f64,
}

/// Thresholds applied when ranking
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankingPolicy {
    pub relevance_threshold: f64,
    pub confidence_threshold: f64,
}

impl Default for RankingPolicy {
    fn default() -> Self {
        Self {
            relevance_threshold: RELEVANCE_THRESHOLD,
            confidence_threshold: CONFIDENCE_THRESHOLD,
        }
    }
}

impl RankingPolicy {
    /// Rank entries by similarity of their query text to `query`
    ///
    /// Entries scoring at or below the relevance threshold are dropped, the
    /// rest sorted by descending score (ties keep input order) and truncated
    /// to `limit`.
    pub fn rank_cases<'a, I>(&self, query: &str, entries: I, limit: usize) -> Vec<ScoredEntry>
    where
        I: IntoIterator<Item = &'a CaseEntry>,
    {
        let keywords = extract_keywords(query);

        let mut scored: Vec<ScoredEntry> = entries
            .into_iter()
            .map(|entry| ScoredEntry {
                score: similarity(&keywords, &extract_keywords(&entry.query_text)),
                entry: entry.clone(),
            })
            .filter(|s| s.score > self.relevance_threshold)
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        scored.truncate(limit);
        scored
    }

    /// Learnings whose pattern matches `query`, most confident first
    ///
    /// A learning qualifies when its pattern key scores above the relevance
    /// threshold and its confidence is above the confidence threshold.
    /// Ordering is by confidence, not by score.
    pub fn rank_learnings<'a>(&self, query: &str, learnings: &'a [Learning]) -> Vec<&'a Learning> {
        let keywords = extract_keywords(query);

        let mut matching: Vec<&Learning> = learnings
            .iter()
            .filter(|learning| {
                let score = similarity(&keywords, &extract_keywords(&learning.pattern_key));
                score > self.relevance_threshold && learning.confidence > self.confidence_threshold
            })
            .collect();

        matching.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(Ordering::Equal)
        });
        matching
    }

    /// Recommendation texts of the learnings matching `query`
    pub fn recommendations(&self, query: &str, learnings: &[Learning]) -> Vec<String> {
        self.rank_learnings(query, learnings)
            .into_iter()
            .map(|l| l.recommendation_text.clone())
            .collect()
    }
}
