//! Run diagnostics
//!
//! Skipped, retried and failed items are collected here instead of being
//! raised. A run always completes with best-effort output plus this list.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What happened
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// A source could not be read at all
    SourceParseFailed,
    /// A component-tree node of an unmapped type was ignored
    DroppedNode,
    /// An entity id was declared twice; the later one was ignored
    DuplicateEntity,
    /// A candidate failed minimal-shape validation and was skipped
    InvalidCandidate,
    /// Unrecognized test type, defaulted to FUNC
    UnknownTestType,
    /// Unrecognized priority, defaulted to P1
    UnknownPriority,
    /// A referenced id did not resolve and was tagged orphan
    OrphanReference,
    /// A transient suggestion-source failure was retried
    Retried,
    /// A unit produced no candidates because its source call failed
    UnitFailed,
}

/// One diagnostic entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    /// Screen/endpoint scope or source id the entry relates to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Offending item (node id, candidate title, reference id)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            scope: None,
            subject: None,
            message: message.into(),
        }
    }

    pub fn in_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    pub fn about(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:?}]", self.kind)?;
        if let Some(scope) = &self.scope {
            write!(f, " {}", scope)?;
        }
        if let Some(subject) = &self.subject {
            write!(f, " ({})", subject)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Count entries of one kind
pub fn count_kind(diagnostics: &[Diagnostic], kind: DiagnosticKind) -> usize {
    diagnostics.iter().filter(|d| d.kind == kind).count()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_scope_and_subject() {
        let d = Diagnostic::new(DiagnosticKind::DroppedNode, "unmapped node type VECTOR")
            .in_scope("figma")
            .about("12:7");
        assert_eq!(
            d.to_string(),
            "[DroppedNode] figma (12:7): unmapped node type VECTOR"
        );
    }

    #[test]
    fn test_count_kind() {
        let list = vec![
            Diagnostic::new(DiagnosticKind::Retried, "a"),
            Diagnostic::new(DiagnosticKind::Retried, "b"),
            Diagnostic::new(DiagnosticKind::UnitFailed, "c"),
        ];
        assert_eq!(count_kind(&list, DiagnosticKind::Retried), 2);
        assert_eq!(count_kind(&list, DiagnosticKind::OrphanReference), 0);
    }
}
