//! Recorded suggestion answers
//!
//! A replay file maps scopes to the answer a provider gave earlier, either
//! as structured records or as raw suggestion text:
//!
//! ```yaml
//! Login:
//!   - title: Valid login
//!     type: FUNC
//!     steps: [enter valid user/pass, click login]
//!     expected: [redirected to dashboard]
//! /pets: |
//!   TC-001: List pets
//!   Type: FUNC
//!   Steps:
//!   1. GET /pets
//! "*": []
//! ```
//!
//! `*` answers any scope without an entry of its own.

use super::text_format::parse_suggestion_text;
use super::{CandidateRecord, SuggestionRequest, SuggestionSource};
use crate::error::{Error, Result, SuggestionError};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Scope key matching every scope
pub const WILDCARD_SCOPE: &str = "*";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ReplayEntry {
    Records(Vec<CandidateRecord>),
    Text(String),
}

/// Provider answering from recorded responses
#[derive(Debug, Clone, Default)]
pub struct ReplaySource {
    by_scope: BTreeMap<String, Vec<CandidateRecord>>,
}

impl ReplaySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the answer for one scope
    pub fn with_records(mut self, scope: impl Into<String>, records: Vec<CandidateRecord>) -> Self {
        self.by_scope.insert(scope.into(), records);
        self
    }

    /// Record the answer for one scope as suggestion text
    pub fn with_text(self, scope: impl Into<String>, text: &str) -> Self {
        self.with_records(scope, parse_suggestion_text(text))
    }

    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let raw: BTreeMap<String, ReplayEntry> = serde_norway::from_str(yaml)?;
        let by_scope = raw
            .into_iter()
            .map(|(scope, entry)| {
                let records = match entry {
                    ReplayEntry::Records(records) => records,
                    ReplayEntry::Text(text) => parse_suggestion_text(&text),
                };
                (scope, records)
            })
            .collect();
        Ok(Self { by_scope })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_yaml(&content)
    }

    pub fn scopes(&self) -> impl Iterator<Item = &str> {
        self.by_scope.keys().map(String::as_str)
    }
}

#[async_trait]
impl SuggestionSource for ReplaySource {
    fn name(&self) -> &str {
        "replay"
    }

    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> std::result::Result<Vec<CandidateRecord>, SuggestionError> {
        let records = self
            .by_scope
            .get(&request.scope)
            .or_else(|| self.by_scope.get(WILDCARD_SCOPE))
            .cloned()
            .unwrap_or_default();
        Ok(records)
    }
}
