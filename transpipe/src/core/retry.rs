//! Retry conditions evaluated over workspace state after every attempt.
//!
//! Condition kinds form a closed set. Configured kinds deserialize from tagged
//! TOML tables; [`RetryCondition::Custom`] wraps an injected predicate and only
//! exists in code.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::core::workspace::SharedWorkspace;

static SCORE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Score\s*[:\-]?\s*(\d+)").expect("score pattern is valid"));

/// Predicate over the workspace that returns `true` when a retry is needed.
pub type RetryPredicate = dyn Fn(&SharedWorkspace) -> bool + Send + Sync;

/// Condition backed by caller-supplied logic.
#[derive(Clone)]
pub struct CustomCheck {
    pub name: String,
    pub message: String,
    predicate: Arc<RetryPredicate>,
}

impl CustomCheck {
    pub fn new(
        name: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Fn(&SharedWorkspace) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            predicate: Arc::new(predicate),
        }
    }
}

impl fmt::Debug for CustomCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomCheck")
            .field("name", &self.name)
            .field("message", &self.message)
            .finish_non_exhaustive()
    }
}

impl PartialEq for CustomCheck {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name && self.message == other.message
    }
}

impl Eq for CustomCheck {}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RetryCondition {
    /// No retry only when every phrase appears (case-insensitive) in the value.
    /// A missing or empty value needs a retry.
    CleanPhrases {
        workspace_key: String,
        phrases: Vec<String>,
        message: String,
    },
    /// Retry when the first `Score: N` in the value is below `min_score`.
    /// A value without a score is indeterminate and does not retry.
    ScoreThreshold {
        workspace_key: String,
        min_score: i64,
        message: String,
    },
    /// Retry when any phrase appears (case-insensitive) in the value.
    /// A missing value does not retry.
    FailurePhrases {
        workspace_key: String,
        phrases: Vec<String>,
        message: String,
    },
    #[serde(skip)]
    Custom(CustomCheck),
}

impl RetryCondition {
    pub fn custom(
        name: impl Into<String>,
        message: impl Into<String>,
        predicate: impl Fn(&SharedWorkspace) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::Custom(CustomCheck::new(name, message, predicate))
    }

    /// Workspace key the condition inspects; `None` for custom predicates.
    pub fn workspace_key(&self) -> Option<&str> {
        match self {
            Self::CleanPhrases { workspace_key, .. }
            | Self::ScoreThreshold { workspace_key, .. }
            | Self::FailurePhrases { workspace_key, .. } => Some(workspace_key),
            Self::Custom(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::CleanPhrases { message, .. }
            | Self::ScoreThreshold { message, .. }
            | Self::FailurePhrases { message, .. } => message,
            Self::Custom(check) => &check.message,
        }
    }

    /// `true` when this condition asks for a retry.
    pub fn fires(&self, workspace: &SharedWorkspace) -> bool {
        match self {
            Self::CleanPhrases {
                workspace_key,
                phrases,
                ..
            } => {
                let Some(text) = non_empty(workspace, workspace_key) else {
                    return true;
                };
                let text = text.to_lowercase();
                phrases
                    .iter()
                    .any(|phrase| !text.contains(&phrase.to_lowercase()))
            }
            Self::ScoreThreshold {
                workspace_key,
                min_score,
                ..
            } => non_empty(workspace, workspace_key)
                .and_then(extract_score)
                .is_some_and(|score| score < *min_score),
            Self::FailurePhrases {
                workspace_key,
                phrases,
                ..
            } => {
                let Some(text) = non_empty(workspace, workspace_key) else {
                    return false;
                };
                let text = text.to_lowercase();
                phrases
                    .iter()
                    .any(|phrase| text.contains(&phrase.to_lowercase()))
            }
            Self::Custom(check) => (check.predicate)(workspace),
        }
    }
}

/// Combined verdict of all conditions for one attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetryDecision {
    /// Messages of the conditions that fired, in configuration order.
    pub triggered: Vec<String>,
}

impl RetryDecision {
    pub fn should_retry(&self) -> bool {
        !self.triggered.is_empty()
    }

    /// Feedback written back to the workspace for the next attempt.
    pub fn feedback(&self) -> String {
        self.triggered.join("; ")
    }
}

/// Evaluate every condition; a retry is needed if any fires.
pub fn evaluate(conditions: &[RetryCondition], workspace: &SharedWorkspace) -> RetryDecision {
    RetryDecision {
        triggered: conditions
            .iter()
            .filter(|condition| condition.fires(workspace))
            .map(|condition| condition.message().to_string())
            .collect(),
    }
}

/// First integer following a case-insensitive `Score` label.
pub fn extract_score(text: &str) -> Option<i64> {
    SCORE_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

fn non_empty<'a>(workspace: &'a SharedWorkspace, key: &str) -> Option<&'a str> {
    workspace.read(key).filter(|text| !text.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::workspace::AccessPolicy;

    fn clean_condition() -> RetryCondition {
        RetryCondition::CleanPhrases {
            workspace_key: "validation_results".to_string(),
            phrases: vec![
                "syntax errors: none".to_string(),
                "compilation issues: none".to_string(),
            ],
            message: "validation errors detected".to_string(),
        }
    }

    fn score_condition() -> RetryCondition {
        RetryCondition::ScoreThreshold {
            workspace_key: "critic_review".to_string(),
            min_score: 7,
            message: "low critic score".to_string(),
        }
    }

    fn ws_with(key: &str, value: &str) -> SharedWorkspace {
        let mut ws = SharedWorkspace::new("test", AccessPolicy::default());
        ws.write(key, value, "Agent");
        ws
    }

    #[test]
    fn all_clean_phrases_present_means_no_retry() {
        let ws = ws_with(
            "validation_results",
            "Syntax Errors: None\nCompilation Issues: None",
        );
        assert!(!clean_condition().fires(&ws));
    }

    #[test]
    fn one_clean_phrase_missing_means_retry() {
        let ws = ws_with(
            "validation_results",
            "syntax errors: none\ncompilation issues: missing import",
        );
        assert!(clean_condition().fires(&ws));
    }

    #[test]
    fn missing_or_empty_validation_is_fail_safe() {
        let ws = SharedWorkspace::new("test", AccessPolicy::default());
        assert!(clean_condition().fires(&ws));
        assert!(clean_condition().fires(&ws_with("validation_results", "  ")));
    }

    #[test]
    fn score_below_minimum_retries() {
        assert!(score_condition().fires(&ws_with("critic_review", "score: 5/10")));
        assert!(!score_condition().fires(&ws_with("critic_review", "Score - 8")));
        assert!(!score_condition().fires(&ws_with("critic_review", "SCORE 7")));
    }

    #[test]
    fn unparsable_or_missing_score_is_indeterminate() {
        assert!(!score_condition().fires(&ws_with("critic_review", "looks fine")));
        let ws = SharedWorkspace::new("test", AccessPolicy::default());
        assert!(!score_condition().fires(&ws));
    }

    #[test]
    fn extract_score_takes_first_match() {
        assert_eq!(extract_score("Score: 4 then score: 9"), Some(4));
        assert_eq!(extract_score("no number"), None);
    }

    #[test]
    fn failure_phrases_detect_test_failures() {
        let condition = RetryCondition::FailurePhrases {
            workspace_key: "test_results".to_string(),
            phrases: vec!["fail".to_string(), "error".to_string()],
            message: "tests failed".to_string(),
        };
        assert!(condition.fires(&ws_with("test_results", "2 passed, 1 FAILED")));
        assert!(!condition.fires(&ws_with("test_results", "2 passed")));
        let empty = SharedWorkspace::new("test", AccessPolicy::default());
        assert!(!condition.fires(&empty));
    }

    #[test]
    fn evaluate_concatenates_triggered_messages() {
        let mut ws = ws_with("critic_review", "Score: 3");
        ws.write("validation_results", "syntax errors: none", "Code_Validator");
        let conditions = vec![
            clean_condition(),
            score_condition(),
            RetryCondition::custom("never", "never fires", |_| false),
        ];

        let decision = evaluate(&conditions, &ws);
        assert!(decision.should_retry());
        assert_eq!(
            decision.feedback(),
            "validation errors detected; low critic score"
        );
    }

    #[test]
    fn custom_predicate_sees_workspace() {
        let condition = RetryCondition::custom("needs-code", "no code", |ws| {
            ws.read("translated_code").is_none()
        });
        let ws = SharedWorkspace::new("test", AccessPolicy::default());
        assert!(condition.fires(&ws));
        assert_eq!(condition.workspace_key(), None);
        assert!(!evaluate(&[], &ws).should_retry());
    }
}
