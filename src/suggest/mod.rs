//! Suggestion sources
//!
//! A suggestion source turns one context bundle into candidate test cases.
//! The vision/LLM provider sits behind the same [`SuggestionSource`]
//! capability as the offline providers here, so the orchestrator never
//! needs to know which one it is talking to.
//!
//! - [`RuleBasedSource`]: deterministic baseline cases from the bundle
//! - [`ReplaySource`]: recorded answers, structured or as suggestion text

pub mod replay;
pub mod rule_based;
pub mod text_format;

pub use replay::ReplaySource;
pub use rule_based::RuleBasedSource;

use crate::error::SuggestionError;
use crate::generate::bundle::ContextBundle;
use crate::model::TestType;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Raw candidate as returned by a suggestion source
///
/// Only `title` and a non-empty `steps` list are required by validation;
/// `type` and `priority` are free strings checked by the orchestrator.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CandidateRecord {
    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub steps: Vec<String>,

    #[serde(default, alias = "expected_result", alias = "expectedResult")]
    pub expected: Vec<String>,

    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub test_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,

    /// Entity ids the source claims this case covers
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<String>,

    /// Free-form element names ("password field"); resolved against
    /// component ids and names, unmatched names are ignored
    #[serde(default, alias = "covered_elements", skip_serializing_if = "Vec::is_empty")]
    pub elements: Vec<String>,
}

impl CandidateRecord {
    pub fn new(title: impl Into<String>, test_type: TestType, priority: &str) -> Self {
        Self {
            title: title.into(),
            test_type: Some(test_type.as_str().to_string()),
            priority: Some(priority.to_string()),
            ..Default::default()
        }
    }

    pub fn step(mut self, step: impl Into<String>) -> Self {
        self.steps.push(step.into());
        self
    }

    pub fn expect(mut self, expected: impl Into<String>) -> Self {
        self.expected.push(expected.into());
        self
    }

    pub fn covering(mut self, id: impl Into<String>) -> Self {
        self.covers.push(id.into());
        self
    }
}

/// One call to a suggestion source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SuggestionRequest {
    pub scope: String,
    pub bundle: ContextBundle,
    /// Test types the caller wants; sources should stay within them
    pub test_types: Vec<TestType>,
    /// Bundle rendered as prompt text for text-based providers
    pub prompt: String,
}

impl SuggestionRequest {
    pub fn wants(&self, test_type: TestType) -> bool {
        self.test_types.contains(&test_type)
    }
}

/// Capability to suggest candidate test cases for one bundle
///
/// Implementations must report retryable conditions (timeouts, rate
/// limits) as [`SuggestionError::Transient`] and rejected bundles as
/// [`SuggestionError::Terminal`].
#[async_trait]
pub trait SuggestionSource: Send + Sync {
    /// Short provider name for logs
    fn name(&self) -> &str;

    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> std::result::Result<Vec<CandidateRecord>, SuggestionError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_candidate_record_accepts_loose_shapes() {
        let record: CandidateRecord = serde_json::from_value(json!({
            "title": "Valid login",
            "type": "FUNC",
            "steps": ["enter valid user/pass", "click login"],
            "expected_result": ["redirected to dashboard"]
        }))
        .unwrap();
        assert_eq!(record.test_type.as_deref(), Some("FUNC"));
        assert_eq!(record.expected, vec!["redirected to dashboard"]);
        assert!(record.priority.is_none());

        let bare: CandidateRecord = serde_json::from_value(json!({})).unwrap();
        assert!(bare.title.is_empty());
    }

    #[test]
    fn test_builder() {
        let record = CandidateRecord::new("Password too long", TestType::Bound, "P1")
            .step("enter password of 51 chars")
            .expect("error shown")
            .covering("pwd-maxlen");
        assert_eq!(record.steps.len(), 1);
        assert_eq!(record.covers, vec!["pwd-maxlen"]);
        assert_eq!(record.test_type.as_deref(), Some("BOUND"));
    }
}
