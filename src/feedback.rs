//! User feedback collection
//!
//! Turns explicit feedback on a finished task into learnings:
//! - dislikes on an unsatisfying task become `avoid:` patterns
//! - likes on a satisfying task become `repeat:` patterns
//! - every suggestion becomes a `suggestion:` pattern
//!
//! Repeated feedback reinforces the same pattern, so the things users keep
//! asking for rise in confidence until they are recommended.

use crate::engine::Casebook;
use crate::types::{Learning, RecordId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write;
use std::sync::Arc;
use tracing::info;

/// Pattern prefix for things to stop doing
pub const AVOID_PREFIX: &str = "avoid:";

/// Pattern prefix for things to keep doing
pub const REPEAT_PREFIX: &str = "repeat:";

/// Pattern prefix for user suggestions
pub const SUGGESTION_PREFIX: &str = "suggestion:";

/// How many entries each feedback pattern list keeps
const TOP_PATTERNS: usize = 5;

/// Feedback a user gave on one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserFeedback {
    /// Id of the task (usually its case entry) the feedback is about
    pub task_id: RecordId,
    pub namespace: String,
    pub satisfied: bool,
    #[serde(default)]
    pub likes: Vec<String>,
    #[serde(default)]
    pub dislikes: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

/// Most reinforced feedback themes of a namespace
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedbackPatterns {
    pub common_likes: Vec<String>,
    pub common_dislikes: Vec<String>,
    pub common_suggestions: Vec<String>,
}

/// Records feedback as learnings in a [`Casebook`]
pub struct FeedbackCollector {
    casebook: Arc<Casebook>,
}

impl FeedbackCollector {
    pub fn new(casebook: Arc<Casebook>) -> Self {
        Self { casebook }
    }

    /// Store the learnings implied by `feedback`
    ///
    /// Returns how many learnings were created or reinforced.
    pub async fn provide_feedback(&self, feedback: &UserFeedback) -> usize {
        let namespace = feedback.namespace.as_str();
        let examples = || vec![feedback.task_id.clone()];
        let mut touched = 0;

        if !feedback.satisfied {
            for dislike in &feedback.dislikes {
                self.casebook
                    .add_learning(
                        namespace,
                        &format!("{}{}", AVOID_PREFIX, dislike),
                        &format!("User disliked: {}", dislike),
                        &format!("Avoid: {}", dislike),
                        examples(),
                    )
                    .await;
                touched += 1;
            }
        }

        if feedback.satisfied {
            for like in &feedback.likes {
                self.casebook
                    .add_learning(
                        namespace,
                        &format!("{}{}", REPEAT_PREFIX, like),
                        &format!("User liked: {}", like),
                        &format!("Keep doing: {}", like),
                        examples(),
                    )
                    .await;
                touched += 1;
            }
        }

        for suggestion in &feedback.suggestions {
            self.casebook
                .add_learning(
                    namespace,
                    &format!("{}{}", SUGGESTION_PREFIX, suggestion),
                    &format!("User suggested: {}", suggestion),
                    &format!("Consider: {}", suggestion),
                    examples(),
                )
                .await;
            touched += 1;
        }

        info!(
            "[{}] Feedback on {} produced {} learnings",
            namespace, feedback.task_id, touched
        );
        touched
    }

    /// The most reinforced likes, dislikes, and suggestions
    pub async fn feedback_patterns(&self, namespace: &str) -> FeedbackPatterns {
        let memory = self.casebook.load(namespace).await;

        FeedbackPatterns {
            common_likes: top_patterns(&memory.learnings, REPEAT_PREFIX),
            common_dislikes: top_patterns(&memory.learnings, AVOID_PREFIX),
            common_suggestions: top_patterns(&memory.learnings, SUGGESTION_PREFIX),
        }
    }

    /// Plain-text summary of a namespace's feedback
    pub async fn feedback_report(&self, namespace: &str) -> String {
        let patterns = self.feedback_patterns(namespace).await;
        let stats = self.casebook.get_stats(namespace).await;

        let mut report = String::new();
        let _ = writeln!(report, "Feedback report: {}", namespace);
        let _ = writeln!(report);
        let _ = writeln!(report, "Total tasks: {}", stats.total_tasks);
        let _ = writeln!(report, "Success rate: {:.1}%", stats.success_rate * 100.0);

        for (title, items) in [
            ("What users like most", &patterns.common_likes),
            ("What users dislike", &patterns.common_dislikes),
            ("Recurring suggestions", &patterns.common_suggestions),
        ] {
            if items.is_empty() {
                continue;
            }
            let _ = writeln!(report);
            let _ = writeln!(report, "{}:", title);
            for (i, item) in items.iter().enumerate() {
                let _ = writeln!(report, "  {}. {}", i + 1, item);
            }
        }

        report
    }
}

/// Up to five learnings under `prefix`, most occurrences first, prefix removed
fn top_patterns(learnings: &[Learning], prefix: &str) -> Vec<String> {
    let mut matching: Vec<&Learning> = learnings
        .iter()
        .filter(|l| l.pattern_key.starts_with(prefix))
        .collect();
    matching.sort_by(|a, b| b.occurrence_count.cmp(&a.occurrence_count));

    matching
        .into_iter()
        .take(TOP_PATTERNS)
        .map(|l| l.pattern_key[prefix.len()..].trim_start().to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn owned(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn feedback(satisfied: bool, likes: &[&str], dislikes: &[&str], suggestions: &[&str]) -> UserFeedback {
        UserFeedback {
            task_id: RecordId::from("task-1"),
            namespace: "writer".to_string(),
            satisfied,
            likes: owned(likes),
            dislikes: owned(dislikes),
            suggestions: owned(suggestions),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_unsatisfied_feedback_records_dislikes_only() {
        let casebook = Arc::new(Casebook::in_memory());
        let collector = FeedbackCollector::new(casebook.clone());

        let touched = collector
            .provide_feedback(&feedback(false, &["tone"], &["passive voice"], &["shorter intro"]))
            .await;
        assert_eq!(touched, 2);

        let memory = casebook.load("writer").await;
        let avoid = memory.find_learning("avoid:passive voice").unwrap();
        assert_eq!(avoid.recommendation_text, "Avoid: passive voice");
        assert_eq!(avoid.example_entry_ids, vec![RecordId::from("task-1")]);
        assert!(memory.find_learning("repeat:tone").is_none());
        assert!(memory.find_learning("suggestion:shorter intro").is_some());
    }

    #[tokio::test]
    async fn test_repeated_feedback_reinforces() {
        let casebook = Arc::new(Casebook::in_memory());
        let collector = FeedbackCollector::new(casebook.clone());

        let unhappy = feedback(false, &[], &["passive voice"], &[]);
        collector.provide_feedback(&unhappy).await;
        collector.provide_feedback(&unhappy).await;

        let memory = casebook.load("writer").await;
        let learning = memory.find_learning("avoid:passive voice").unwrap();
        assert_eq!(learning.occurrence_count, 2);
        assert_eq!(learning.confidence, 0.6);
    }

    #[tokio::test]
    async fn test_patterns_ranked_by_occurrences() {
        let casebook = Arc::new(Casebook::in_memory());
        let collector = FeedbackCollector::new(casebook.clone());

        collector.provide_feedback(&feedback(true, &["clear headlines"], &[], &[])).await;
        for _ in 0..3 {
            collector.provide_feedback(&feedback(true, &["short paragraphs"], &[], &[])).await;
        }
        for i in 0..7 {
            let idea = format!("idea {}", i);
            collector
                .provide_feedback(&feedback(true, &[], &[], &[idea.as_str()]))
                .await;
        }

        let patterns = collector.feedback_patterns("writer").await;
        assert_eq!(
            patterns.common_likes,
            vec!["short paragraphs".to_string(), "clear headlines".to_string()]
        );
        assert!(patterns.common_dislikes.is_empty());
        assert_eq!(patterns.common_suggestions.len(), 5);
    }

    #[tokio::test]
    async fn test_report() {
        let casebook = Arc::new(Casebook::in_memory());
        let collector = FeedbackCollector::new(casebook.clone());
        casebook
            .record_success("writer", "write intro", Default::default(), "", None)
            .await;
        collector.provide_feedback(&feedback(false, &[], &["jargon"], &[])).await;

        let report = collector.feedback_report("writer").await;
        assert!(report.contains("Total tasks: 1"));
        assert!(report.contains("Success rate: 100.0%"));
        assert!(report.contains("What users dislike:\n  1. jargon"));
        assert!(!report.contains("What users like most"));
    }
}
