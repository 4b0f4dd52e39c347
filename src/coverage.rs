//! Coverage matrices
//!
//! Inverts every case's `covers` into requirement, component and
//! constraint matrices. Value-bearing constraints (enum, range, format,
//! minLength, maxLength) additionally classify each covering case as a
//! valid-value or invalid-value/boundary case; they are complete only when
//! both classes are present.

use crate::error::{Error, Result};
use crate::model::{Constraint, ConstraintKind, DomainModel, TestCase, TestType};
use crate::util::contains_word;
use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

/// What a covering case does to a constraint's value domain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ValueClass {
    /// Exercises an accepted value
    Valid,
    /// Exercises a rejected or out-of-bounds value
    Invalid,
    Undetermined,
}

/// Coverage of one constraint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintCoverage {
    pub kind: ConstraintKind,
    /// Covering case id → class (all `undetermined` when the kind has no
    /// value classes)
    pub cases: BTreeMap<String, ValueClass>,
    pub complete: bool,
}

impl ConstraintCoverage {
    pub fn is_covered(&self) -> bool {
        !self.cases.is_empty()
    }

    pub fn has(&self, class: ValueClass) -> bool {
        self.cases.values().any(|c| *c == class)
    }

    /// Classes still needed for completeness
    pub fn missing_classes(&self) -> Vec<ValueClass> {
        if self.complete {
            return Vec::new();
        }
        if !self.kind.needs_value_classes() {
            // only coverage itself is missing
            return Vec::new();
        }
        [ValueClass::Valid, ValueClass::Invalid]
            .into_iter()
            .filter(|class| !self.has(*class))
            .collect()
    }
}

/// Entity → covering case ids
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageMatrices {
    pub requirements: BTreeMap<String, BTreeSet<String>>,
    pub components: BTreeMap<String, BTreeSet<String>>,
    pub constraints: BTreeMap<String, ConstraintCoverage>,
    /// Orphan id → cases that reference it
    pub orphans: BTreeMap<String, BTreeSet<String>>,
}

impl CoverageMatrices {
    pub fn uncovered_requirements(&self) -> Vec<&str> {
        uncovered(&self.requirements)
    }

    pub fn uncovered_components(&self) -> Vec<&str> {
        uncovered(&self.components)
    }

    /// Constraints that are not completely covered
    pub fn incomplete_constraints(&self) -> impl Iterator<Item = (&str, &ConstraintCoverage)> {
        self.constraints
            .iter()
            .filter(|(_, c)| !c.complete)
            .map(|(id, c)| (id.as_str(), c))
    }
}

fn uncovered(matrix: &BTreeMap<String, BTreeSet<String>>) -> Vec<&str> {
    matrix
        .iter()
        .filter(|(_, cases)| cases.is_empty())
        .map(|(id, _)| id.as_str())
        .collect()
}

/// Build all matrices from the final case set
///
/// Fails only when a case references an id that is neither in the model
/// nor tagged orphan; that is an upstream bug, not bad input.
pub fn analyze_coverage(model: &DomainModel, cases: &[TestCase]) -> Result<CoverageMatrices> {
    let mut matrices = CoverageMatrices {
        requirements: model
            .requirements()
            .iter()
            .map(|r| (r.id.clone(), BTreeSet::new()))
            .collect(),
        components: model
            .components()
            .iter()
            .map(|c| (c.id.clone(), BTreeSet::new()))
            .collect(),
        constraints: model
            .constraints()
            .iter()
            .map(|c| {
                let coverage = ConstraintCoverage {
                    kind: c.kind,
                    cases: BTreeMap::new(),
                    complete: false,
                };
                (c.id.clone(), coverage)
            })
            .collect(),
        orphans: BTreeMap::new(),
    };

    for case in cases {
        for id in &case.covers.requirement_ids {
            matrices
                .requirements
                .get_mut(id)
                .ok_or_else(|| unresolved(case, "requirement", id))?
                .insert(case.id.clone());
        }
        for id in &case.covers.component_ids {
            matrices
                .components
                .get_mut(id)
                .ok_or_else(|| unresolved(case, "component", id))?
                .insert(case.id.clone());
        }
        for id in &case.covers.constraint_ids {
            let constraint = model
                .constraint(id)
                .ok_or_else(|| unresolved(case, "constraint", id))?;
            let class = classify_case(constraint, case);
            if let Some(coverage) = matrices.constraints.get_mut(id) {
                coverage.cases.insert(case.id.clone(), class);
            }
        }
        for id in &case.covers.orphan_ids {
            matrices
                .orphans
                .entry(id.clone())
                .or_default()
                .insert(case.id.clone());
        }
    }

    for coverage in matrices.constraints.values_mut() {
        coverage.complete = if coverage.kind.needs_value_classes() {
            coverage.has(ValueClass::Valid) && coverage.has(ValueClass::Invalid)
        } else {
            coverage.is_covered()
        };
    }

    tracing::debug!(
        requirements = matrices.requirements.len(),
        components = matrices.components.len(),
        constraints = matrices.constraints.len(),
        "coverage computed"
    );
    Ok(matrices)
}

fn unresolved(case: &TestCase, family: &str, id: &str) -> Error {
    Error::CoverageComputation(format!(
        "case {} covers unknown {} '{}' that was not tagged orphan",
        case.id, family, id
    ))
}

/// Wording in `expected` that marks a rejected value
const INVALID_MARKERS: &[&str] = &[
    "error",
    "invalid",
    "reject",
    "not accepted",
    "not allowed",
    "fail",
    "denied",
    "too long",
    "too short",
    "exceed",
    "out of range",
    "is required",
    "must be",
    "cannot",
    "blocked",
    "prevent",
    "warning",
];

/// Words in `expected` that mark an accepted value
const VALID_MARKERS: &[&str] = &[
    "accepted",
    "accepts",
    "success",
    "successful",
    "successfully",
    "saved",
    "valid",
    "submitted",
    "created",
    "updated",
    "redirected",
    "proceeds",
    "allowed",
    "displayed",
];

/// Words that cancel a marker right after them ("no error shown")
const NEGATIONS: &[&str] = &[
    "no", "not", "never", "without", "nor", "don't", "doesn't", "isn't", "aren't", "wasn't",
];

/// Whether `marker` occurs in `text` without a negation among the two
/// words before it
fn mentions(text: &str, marker: &str, whole_word: bool) -> bool {
    text.match_indices(marker).any(|(start, _)| {
        let before = &text[..start];
        if whole_word {
            let end = start + marker.len();
            let open = before.chars().next_back().is_none_or(|c| !c.is_alphanumeric());
            let close = text[end..].chars().next().is_none_or(|c| !c.is_alphanumeric());
            if !(open && close) {
                return false;
            }
        }
        !before
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .filter(|w| !w.is_empty())
            .rev()
            .take(2)
            .any(|w| NEGATIONS.contains(&w))
    })
}

fn number_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\b\d+(?:\.\d+)?\b").expect("valid number regex"))
}

/// Classify one covering case against a value-bearing constraint
///
/// Checked in order: error wording in `expected` (unless negated, as in
/// "no error shown"), numeric evidence in the
/// title and steps (length and range kinds), NEG type, accepting wording or
/// an allowed enum value. Anything else is undetermined.
pub fn classify_case(constraint: &Constraint, case: &TestCase) -> ValueClass {
    if !constraint.kind.needs_value_classes() {
        return ValueClass::Undetermined;
    }

    let expected = case.expected.join("\n").to_lowercase();
    if INVALID_MARKERS.iter().any(|m| mentions(&expected, m, false)) {
        return ValueClass::Invalid;
    }

    let mut action = case.title.clone();
    for step in &case.steps {
        action.push('\n');
        action.push_str(step);
    }
    if let Some(class) = numeric_evidence(constraint, &action) {
        return class;
    }

    if case.test_type == TestType::Neg {
        return ValueClass::Invalid;
    }

    if VALID_MARKERS.iter().any(|m| mentions(&expected, m, true)) {
        return ValueClass::Valid;
    }
    if constraint.kind == ConstraintKind::Enum
        && constraint
            .enum_values()
            .iter()
            .any(|v| contains_word(&action, v))
    {
        return ValueClass::Valid;
    }
    ValueClass::Undetermined
}

fn numeric_evidence(constraint: &Constraint, text: &str) -> Option<ValueClass> {
    let (min, max) = match constraint.kind {
        ConstraintKind::MinLength => (constraint.number_param("min"), None),
        ConstraintKind::MaxLength => (None, constraint.number_param("max")),
        ConstraintKind::Range => (constraint.number_param("min"), constraint.number_param("max")),
        _ => return None,
    };
    if min.is_none() && max.is_none() {
        return None;
    }

    let numbers: Vec<f64> = number_regex()
        .find_iter(text)
        .filter_map(|m| m.as_str().parse().ok())
        .collect();
    if numbers.is_empty() {
        return None;
    }
    let outside = numbers.iter().any(|n| {
        min.is_some_and(|min| *n < min) || max.is_some_and(|max| *n > max)
    });
    Some(if outside {
        ValueClass::Invalid
    } else {
        ValueClass::Valid
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        CasePriority, Component, ComponentType, Covers, Requirement, RequirementPriority,
        SourceKind,
    };
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    fn case(id: &str, test_type: TestType, steps: &[&str], expected: &[&str]) -> TestCase {
        TestCase {
            id: id.into(),
            title: "password case".into(),
            test_type,
            priority: CasePriority::P1,
            steps: steps.iter().map(|s| s.to_string()).collect(),
            expected: expected.iter().map(|s| s.to_string()).collect(),
            covers: Covers::default(),
            fingerprint: String::new(),
            source_fingerprint: String::new(),
            scope: "Login".into(),
        }
    }

    fn model() -> DomainModel {
        let mut model = DomainModel::new();
        model.add_requirement(Requirement {
            id: "REQ-1".into(),
            text: "must support login".into(),
            priority: RequirementPriority::Must,
            source_type: SourceKind::RequirementText,
        });
        model.add_component(Component::new("btn-login", "Login", ComponentType::Button));
        model.add_constraint(
            Constraint::new("pwd-maxlen", "password", ConstraintKind::MaxLength).with_param("max", 50),
        );
        model.add_constraint(Constraint::new("pwd-required", "password", ConstraintKind::Required));
        model
    }

    fn max_len() -> Constraint {
        Constraint::new("pwd-maxlen", "password", ConstraintKind::MaxLength).with_param("max", 50)
    }

    #[rstest]
    #[case(TestType::Bound, &["enter password of 51 chars"], &["error shown"], ValueClass::Invalid)]
    #[case(TestType::Bound, &["enter password of 51 chars"], &[], ValueClass::Invalid)]
    #[case(TestType::Bound, &["enter password of 50 chars"], &["Value is accepted"], ValueClass::Valid)]
    #[case(TestType::Neg, &["paste a huge password"], &[], ValueClass::Invalid)]
    #[case(TestType::Func, &["type a password"], &["login succeeds and user is redirected"], ValueClass::Valid)]
    #[case(TestType::Func, &["type a password"], &["invalid password message"], ValueClass::Invalid)]
    #[case(TestType::Func, &["type a password"], &["page reloads"], ValueClass::Undetermined)]
    fn test_classify_max_length(
        #[case] test_type: TestType,
        #[case] steps: &[&str],
        #[case] expected: &[&str],
        #[case] class: ValueClass,
    ) {
        let c = case("TC-0001", test_type, steps, expected);
        assert_eq!(classify_case(&max_len(), &c), class);
    }

    #[rstest]
    #[case(&["Profile saved, no error shown"], ValueClass::Valid)]
    #[case(&["Form submits without errors"], ValueClass::Undetermined)]
    #[case(&["Value should not be rejected"], ValueClass::Undetermined)]
    #[case(&["Error shown: value is not accepted"], ValueClass::Invalid)]
    #[case(&["Password is not accepted"], ValueClass::Invalid)]
    #[case(&["Save is not successful"], ValueClass::Undetermined)]
    fn test_negated_markers_do_not_count(#[case] expected: &[&str], #[case] class: ValueClass) {
        let c = case("TC-0001", TestType::Func, &["type a password"], expected);
        assert_eq!(classify_case(&max_len(), &c), class);
    }

    #[test]
    fn test_classify_enum_by_allowed_value() {
        let role = Constraint::new("role-enum", "role", ConstraintKind::Enum)
            .with_param("values", serde_json::json!(["admin", "viewer"]));
        let c = case("TC-0001", TestType::Func, &["select admin"], &["page reloads"]);
        assert_eq!(classify_case(&role, &c), ValueClass::Valid);
        let c = case("TC-0002", TestType::Neg, &["send role=root"], &["page reloads"]);
        assert_eq!(classify_case(&role, &c), ValueClass::Invalid);
    }

    #[test]
    fn test_scenario_matrices() {
        let mut valid = case(
            "TC-0001",
            TestType::Func,
            &["enter valid user/pass", "click login"],
            &["redirected to dashboard"],
        );
        valid.covers.requirement_ids.insert("REQ-1".into());
        let mut too_long = case(
            "TC-0002",
            TestType::Bound,
            &["enter password of 51 chars"],
            &["error shown"],
        );
        too_long.covers.requirement_ids.insert("REQ-1".into());
        too_long.covers.constraint_ids.insert("pwd-maxlen".into());

        let matrices = analyze_coverage(&model(), &[valid, too_long]).unwrap();
        assert_eq!(matrices.requirements["REQ-1"].len(), 2);
        assert_eq!(matrices.uncovered_components(), vec!["btn-login"]);

        let pwd = &matrices.constraints["pwd-maxlen"];
        assert_eq!(pwd.cases.len(), 1);
        assert_eq!(pwd.cases["TC-0002"], ValueClass::Invalid);
        assert!(!pwd.complete);
        assert_eq!(pwd.missing_classes(), vec![ValueClass::Valid]);

        let incomplete: Vec<_> = matrices.incomplete_constraints().map(|(id, _)| id).collect();
        assert_eq!(incomplete, vec!["pwd-maxlen", "pwd-required"]);
    }

    #[test]
    fn test_max_length_complete_with_both_sides() {
        let mut under = case("TC-0001", TestType::Bound, &["enter password of 50 chars"], &[]);
        under.covers.constraint_ids.insert("pwd-maxlen".into());
        let mut over = case("TC-0002", TestType::Bound, &["enter password of 51 chars"], &[]);
        over.covers.constraint_ids.insert("pwd-maxlen".into());
        let mut required = case("TC-0003", TestType::Neg, &["leave password empty"], &[]);
        required.covers.constraint_ids.insert("pwd-required".into());

        let matrices = analyze_coverage(&model(), &[under, over, required]).unwrap();
        assert!(matrices.constraints["pwd-maxlen"].complete);
        assert!(matrices.constraints["pwd-required"].complete);
        assert_eq!(matrices.incomplete_constraints().count(), 0);
    }

    fn value_model() -> DomainModel {
        let mut model = DomainModel::new();
        model.add_constraint(
            Constraint::new("role-enum", "role", ConstraintKind::Enum)
                .with_param("values", serde_json::json!(["admin", "viewer"])),
        );
        model.add_constraint(
            Constraint::new("age-range", "age", ConstraintKind::Range)
                .with_param("min", 18)
                .with_param("max", 120),
        );
        model
    }

    fn covering(id: &str, test_type: TestType, step: &str, constraint: &str) -> TestCase {
        let mut c = case(id, test_type, &[step], &[]);
        c.covers.constraint_ids.insert(constraint.into());
        c
    }

    #[test]
    fn test_enum_needs_in_set_and_out_of_set_cases() {
        let model = value_model();
        let in_set = covering("TC-0001", TestType::Func, "select admin", "role-enum");
        let out_of_set = covering("TC-0002", TestType::Neg, "send role=root", "role-enum");

        let matrices = analyze_coverage(&model, &[in_set.clone()]).unwrap();
        let role = &matrices.constraints["role-enum"];
        assert!(role.is_covered());
        assert!(!role.complete);
        assert_eq!(role.missing_classes(), vec![ValueClass::Invalid]);

        let matrices = analyze_coverage(&model, &[out_of_set.clone()]).unwrap();
        let role = &matrices.constraints["role-enum"];
        assert!(!role.complete);
        assert_eq!(role.missing_classes(), vec![ValueClass::Valid]);

        let matrices = analyze_coverage(&model, &[in_set, out_of_set]).unwrap();
        let role = &matrices.constraints["role-enum"];
        assert!(role.complete);
        assert!(role.missing_classes().is_empty());
    }

    #[test]
    fn test_range_needs_inside_and_outside_values() {
        let model = value_model();
        let inside = covering("TC-0001", TestType::Bound, "enter age 30", "age-range");
        let below = covering("TC-0002", TestType::Bound, "enter age 17", "age-range");
        let above = covering("TC-0003", TestType::Bound, "enter age 121", "age-range");

        let matrices = analyze_coverage(&model, &[inside.clone()]).unwrap();
        let age = &matrices.constraints["age-range"];
        assert!(!age.complete);
        assert_eq!(age.missing_classes(), vec![ValueClass::Invalid]);

        let matrices = analyze_coverage(&model, &[below.clone(), above]).unwrap();
        let age = &matrices.constraints["age-range"];
        assert_eq!(age.cases["TC-0002"], ValueClass::Invalid);
        assert_eq!(age.cases["TC-0003"], ValueClass::Invalid);
        assert!(!age.complete);
        assert_eq!(age.missing_classes(), vec![ValueClass::Valid]);

        let matrices = analyze_coverage(&model, &[inside, below]).unwrap();
        assert!(matrices.constraints["age-range"].complete);
    }

    #[test]
    fn test_orphans_are_collected() {
        let mut c = case("TC-0001", TestType::Func, &["x"], &[]);
        c.covers.orphan_ids.insert("REQ-404".into());
        let matrices = analyze_coverage(&model(), &[c]).unwrap();
        assert_eq!(matrices.orphans["REQ-404"].len(), 1);
    }

    #[test]
    fn test_unresolved_id_is_fatal() {
        let mut c = case("TC-0001", TestType::Func, &["x"], &[]);
        c.covers.requirement_ids.insert("REQ-404".into());
        let err = analyze_coverage(&model(), &[c]).unwrap_err();
        assert!(matches!(err, Error::CoverageComputation(_)));
    }
}
