//! Candidate validation and coverage matching
//!
//! Turns a raw [`CandidateRecord`] into a [`TestCase`]: minimal-shape
//! checks, type/priority defaulting and structural `covers` population.

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::generate::bundle::ContextBundle;
use crate::model::{
    CasePriority, Covers, DomainModel, EntityFamily, TestCase, TestType,
};
use crate::suggest::CandidateRecord;
use crate::util::{contains_word, normalize_title, short_hash};
use serde_json::Value;
use std::collections::BTreeSet;

/// Where a candidate came from; decides how `covers` is matched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Returned by the suggestion source: ids are matched in the text
    Suggested,
    /// Vision observation: only explicit references count
    Observed,
}

/// Per-unit inputs shared by every candidate of the unit
pub struct UnitScope<'a> {
    pub scope: &'a str,
    pub bundle: &'a ContextBundle,
    pub source_fingerprint: &'a str,
    /// Context ids already resolved against the model
    pub context_covers: &'a Covers,
}

/// Fingerprint used to recognise the same case across runs
pub fn case_fingerprint(test_type: TestType, title: &str) -> String {
    short_hash(&format!("{}|{}", test_type, normalize_title(title)))
}

/// Sort explicit ids into families; unknown ids become orphans
pub fn resolve_ids<'i>(
    model: &DomainModel,
    ids: impl IntoIterator<Item = &'i String>,
    covers: &mut Covers,
) -> BTreeSet<String> {
    let mut orphans = BTreeSet::new();
    for id in ids {
        let id = id.trim();
        if id.is_empty() {
            continue;
        }
        match model.classify_id(id) {
            Some(EntityFamily::Requirement) => {
                covers.requirement_ids.insert(id.to_string());
            }
            Some(EntityFamily::Component) => {
                covers.component_ids.insert(id.to_string());
            }
            Some(EntityFamily::Constraint) => {
                covers.constraint_ids.insert(id.to_string());
            }
            None => {
                covers.orphan_ids.insert(id.to_string());
                orphans.insert(id.to_string());
            }
        }
    }
    orphans
}

/// Validate one record; `None` when it is skipped
///
/// Diagnostics for skipped candidates, defaulted types or priorities and
/// orphan references are appended to `diagnostics`. The returned case has
/// an empty id; ids are assigned when units are merged.
pub fn validate_candidate(
    record: &CandidateRecord,
    origin: Origin,
    unit: &UnitScope<'_>,
    model: &DomainModel,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<TestCase> {
    let title = record.title.split_whitespace().collect::<Vec<_>>().join(" ");
    let steps: Vec<String> = clean_lines(&record.steps);
    let subject = if title.is_empty() {
        "(untitled)".to_string()
    } else {
        title.clone()
    };

    if title.is_empty() || steps.is_empty() {
        let reason = if title.is_empty() {
            "candidate has no title"
        } else {
            "candidate has no steps"
        };
        diagnostics.push(
            Diagnostic::new(DiagnosticKind::InvalidCandidate, reason)
                .in_scope(unit.scope)
                .about(subject),
        );
        return None;
    }

    let test_type = match record.test_type.as_deref().map(str::trim) {
        None | Some("") => TestType::Func,
        Some(raw) => TestType::parse(raw).unwrap_or_else(|| {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnknownTestType,
                    format!("unknown test type '{}', using FUNC", raw),
                )
                .in_scope(unit.scope)
                .about(subject.clone()),
            );
            TestType::Func
        }),
    };

    let priority = match record.priority.as_deref().map(str::trim) {
        None | Some("") => CasePriority::P1,
        Some(raw) => CasePriority::parse(raw).unwrap_or_else(|| {
            diagnostics.push(
                Diagnostic::new(
                    DiagnosticKind::UnknownPriority,
                    format!("unknown priority '{}', using P1", raw),
                )
                .in_scope(unit.scope)
                .about(subject.clone()),
            );
            CasePriority::P1
        }),
    };

    let mut case = TestCase {
        id: String::new(),
        fingerprint: case_fingerprint(test_type, &title),
        title,
        test_type,
        priority,
        steps,
        expected: clean_lines(&record.expected),
        covers: Covers::default(),
        source_fingerprint: unit.source_fingerprint.to_string(),
        scope: unit.scope.to_string(),
    };

    let mut covers = unit.context_covers.clone();
    let orphans = resolve_ids(model, &record.covers, &mut covers);
    for orphan in orphans {
        diagnostics.push(
            Diagnostic::new(
                DiagnosticKind::OrphanReference,
                format!("'{}' does not match any requirement, component or constraint", orphan),
            )
            .in_scope(unit.scope)
            .about(case.title.clone()),
        );
    }
    resolve_elements(model, &record.elements, &mut covers);
    if origin == Origin::Suggested {
        match_text(&case, unit.bundle, model, &mut covers);
    }
    case.covers = covers;
    Some(case)
}

fn clean_lines(lines: &[String]) -> Vec<String> {
    lines
        .iter()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Element names match a component id or its `name` property
fn resolve_elements(model: &DomainModel, elements: &[String], covers: &mut Covers) {
    for element in elements {
        let element = element.trim();
        if element.is_empty() {
            continue;
        }
        let hit = model.components().iter().find(|c| {
            c.id.eq_ignore_ascii_case(element)
                || c.properties
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| name.eq_ignore_ascii_case(element))
        });
        if let Some(component) = hit {
            covers.component_ids.insert(component.id.clone());
        }
    }
}

/// Ids mentioned anywhere in the case text, plus the unit's value-bearing
/// constraints (enum, range, format, length) whose target field is
/// mentioned as a word. Presence constraints (`required`, `unique`) need
/// their id or an explicit reference.
fn match_text(case: &TestCase, bundle: &ContextBundle, model: &DomainModel, covers: &mut Covers) {
    let text = case.searchable_text();
    for requirement in model.requirements() {
        if contains_word(&text, &requirement.id) {
            covers.requirement_ids.insert(requirement.id.clone());
        }
    }
    for component in model.components() {
        if contains_word(&text, &component.id) {
            covers.component_ids.insert(component.id.clone());
        }
    }
    for constraint in model.constraints() {
        if contains_word(&text, &constraint.id) {
            covers.constraint_ids.insert(constraint.id.clone());
        }
    }
    // naming a field only says something about its value domain
    for constraint in bundle
        .constraints()
        .filter(|c| c.kind.needs_value_classes())
    {
        if contains_word(&text, constraint.target_field()) {
            covers.constraint_ids.insert(constraint.id.clone());
        }
    }
}
