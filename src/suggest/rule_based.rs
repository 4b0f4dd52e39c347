//! Deterministic baseline provider
//!
//! Produces the cases a tester would write first, straight from the bundle:
//! one per requirement and UI component, valid/invalid/unauthorized calls
//! per endpoint, and a valid/invalid pair per constraint. Useful offline and
//! as a floor under an LLM provider.

use super::{CandidateRecord, SuggestionRequest, SuggestionSource};
use crate::error::SuggestionError;
use crate::generate::bundle::ContextBundle;
use crate::model::{
    value_to_plain_string, Component, ComponentType, Constraint, ConstraintKind, Flow,
    Requirement, RequirementPriority, TestType,
};
use crate::util::contains_word;
use async_trait::async_trait;
use serde_json::Value;

/// Offline provider deriving cases from the bundle alone
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedSource;

impl RuleBasedSource {
    pub fn new() -> Self {
        Self
    }

    /// Candidates for one request, restricted to the requested test types
    pub fn candidates(&self, request: &SuggestionRequest) -> Vec<CandidateRecord> {
        let bundle = &request.bundle;
        let mut out = Vec::new();

        for requirement in &bundle.requirements {
            if requirement.priority != RequirementPriority::Wont
                && belongs_here(bundle, &requirement.text)
            {
                out.push(requirement_case(requirement));
            }
        }
        for component in &bundle.components {
            match component.component_type {
                ComponentType::Endpoint => out.extend(endpoint_cases(component)),
                _ => out.push(component_case(component)),
            }
        }
        for constraint in bundle.constraints() {
            if owned_here(bundle, constraint) || belongs_here(bundle, &constraint.target_id) {
                out.extend(constraint_cases(constraint));
            }
        }
        for flow in &bundle.flows {
            if belongs_here(bundle, &flow.steps.join(" ")) {
                out.push(flow_case(flow));
            }
        }

        out.retain(|c| {
            c.test_type
                .as_deref()
                .and_then(TestType::parse)
                .is_some_and(|t| request.wants(t))
        });
        out
    }
}

#[async_trait]
impl SuggestionSource for RuleBasedSource {
    fn name(&self) -> &str {
        "rule-based"
    }

    async fn suggest(
        &self,
        request: &SuggestionRequest,
    ) -> std::result::Result<Vec<CandidateRecord>, SuggestionError> {
        Ok(self.candidates(request))
    }
}

/// Requirements, flows and unowned constraints are shared by every unit; a
/// unit only writes cases for the ones that mention its scope or one of its
/// components, unless it has no components at all.
fn belongs_here(bundle: &ContextBundle, text: &str) -> bool {
    if bundle.components.is_empty() {
        return true;
    }
    contains_word(text, &bundle.scope)
        || bundle
            .components
            .iter()
            .any(|c| contains_word(text, &c.id) || contains_word(text, &component_label(c)))
}

fn owned_here(bundle: &ContextBundle, constraint: &Constraint) -> bool {
    let prefix = constraint.target_id.rsplit_once('.').map(|(p, _)| p);
    bundle.components.iter().any(|c| {
        c.constraints.contains(&constraint.id)
            || c.id == constraint.target_id
            || prefix == Some(c.id.as_str())
    })
}

fn component_label(component: &Component) -> String {
    component
        .properties
        .get("name")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .unwrap_or(&component.id)
        .to_string()
}

fn requirement_case(requirement: &Requirement) -> CandidateRecord {
    let priority = match requirement.priority {
        RequirementPriority::Must => "P0",
        RequirementPriority::Should => "P1",
        RequirementPriority::Could | RequirementPriority::Wont => "P2",
    };
    let summary: String = requirement.text.chars().take(60).collect();
    CandidateRecord::new(
        format!("Verify {}: {}", requirement.id, summary),
        TestType::Func,
        priority,
    )
    .step(format!("Set up the preconditions for {}", requirement.id))
    .step(format!("Exercise the behaviour: {}", requirement.text))
    .expect(format!("Behaviour matches {}", requirement.id))
    .covering(&requirement.id)
}

fn component_case(component: &Component) -> CandidateRecord {
    let label = component_label(component);
    let screen = &component.screen_id;
    let (action, expected) = match component.component_type {
        ComponentType::Button => (format!("Click {}", label), format!("{} action completes", label)),
        ComponentType::Input => (
            format!("Enter a valid value in {}", label),
            "Value is accepted".to_string(),
        ),
        ComponentType::Dropdown => (
            format!("Select an option from {}", label),
            "Selected option is shown".to_string(),
        ),
        ComponentType::Checkbox => (
            format!("Toggle {}", label),
            format!("{} changes state", label),
        ),
        ComponentType::Text => (
            format!("Read {}", label),
            format!("{} is displayed", label),
        ),
        ComponentType::Endpoint | ComponentType::Other => (
            format!("Interact with {}", label),
            format!("{} responds", label),
        ),
    };
    CandidateRecord::new(format!("Verify {} on {}", label, screen), TestType::Func, "P1")
        .step(format!("Open {}", screen))
        .step(action)
        .expect(expected)
        .covering(&component.id)
}

fn endpoint_cases(endpoint: &Component) -> Vec<CandidateRecord> {
    let prop = |key: &str| {
        endpoint
            .properties
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let method = prop("method");
    let path = if prop("path").is_empty() {
        endpoint.screen_id.clone()
    } else {
        prop("path")
    };
    let secured = endpoint
        .properties
        .get("secured")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let mut cases = vec![
        CandidateRecord::new(format!("{} {} - Valid Request", method, path), TestType::Func, "P0")
            .step(format!("Prepare valid request data for {} {}", method, path))
            .step(format!("Send {} request to {}", method, path))
            .expect("Response status is 200/201")
            .expect("Request succeeds with valid data")
            .covering(&endpoint.id),
        CandidateRecord::new(format!("{} {} - Invalid Request", method, path), TestType::Neg, "P1")
            .step(format!("Prepare invalid request data for {} {}", method, path))
            .step(format!("Send {} request to {}", method, path))
            .expect("Response status is 400/422")
            .expect("Request fails with a validation error")
            .covering(&endpoint.id),
    ];
    if secured {
        cases.push(
            CandidateRecord::new(
                format!("{} {} - Unauthorized Access", method, path),
                TestType::Perm,
                "P1",
            )
            .step(format!("Send {} request to {} without authentication", method, path))
            .expect("Response status is 401/403")
            .expect("Request is rejected with an authentication error")
            .covering(&endpoint.id),
        );
    }
    cases
}

fn number(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn constraint_cases(constraint: &Constraint) -> Vec<CandidateRecord> {
    let field = constraint.target_field();
    let valid = |title: String, step: String| {
        CandidateRecord::new(title, TestType::Bound, "P1")
            .step(step)
            .expect("Value is accepted")
            .covering(&constraint.id)
    };
    let invalid = |title: String, step: String, expected: String| {
        CandidateRecord::new(title, TestType::Neg, "P1")
            .step(step)
            .expect(expected)
            .covering(&constraint.id)
    };

    match constraint.kind {
        ConstraintKind::Required => vec![invalid(
            format!("{} is required", field),
            format!("Leave {} empty and submit", field),
            format!("Validation error is shown for {}", field),
        )],
        ConstraintKind::Unique => vec![invalid(
            format!("{} rejects duplicate value", field),
            format!("Submit a {} value that already exists", field),
            format!("Error shown: {} must be unique", field),
        )],
        ConstraintKind::MaxLength => match constraint.number_param("max") {
            Some(max) => vec![
                valid(
                    format!("{} at maximum length", field),
                    format!("Enter {} of {} chars", field, number(max)),
                ),
                invalid(
                    format!("{} over maximum length", field),
                    format!("Enter {} of {} chars", field, number(max + 1.0)),
                    format!("Error shown: {} is too long", field),
                ),
            ],
            None => Vec::new(),
        },
        ConstraintKind::MinLength => match constraint.number_param("min") {
            Some(min) => {
                let mut cases = vec![valid(
                    format!("{} at minimum length", field),
                    format!("Enter {} of {} chars", field, number(min)),
                )];
                if min >= 1.0 {
                    cases.push(invalid(
                        format!("{} under minimum length", field),
                        format!("Enter {} of {} chars", field, number(min - 1.0)),
                        format!("Error shown: {} is too short", field),
                    ));
                }
                cases
            }
            None => Vec::new(),
        },
        ConstraintKind::Range => {
            let mut cases = Vec::new();
            if let Some(max) = constraint.number_param("max") {
                cases.push(valid(
                    format!("{} at upper bound", field),
                    format!("Set {} to {}", field, number(max)),
                ));
                cases.push(invalid(
                    format!("{} above upper bound", field),
                    format!("Set {} to {}", field, number(max + 1.0)),
                    format!("Error shown: {} is out of range", field),
                ));
            }
            if let Some(min) = constraint.number_param("min") {
                cases.push(valid(
                    format!("{} at lower bound", field),
                    format!("Set {} to {}", field, number(min)),
                ));
                cases.push(invalid(
                    format!("{} below lower bound", field),
                    format!("Set {} to {}", field, number(min - 1.0)),
                    format!("Error shown: {} is out of range", field),
                ));
            }
            cases
        }
        ConstraintKind::Enum => {
            let values = constraint.enum_values();
            let Some(first) = values.first() else {
                return Vec::new();
            };
            vec![
                CandidateRecord::new(format!("{} accepts allowed value", field), TestType::Func, "P1")
                    .step(format!("Choose {} for {}", first, field))
                    .expect("Value is accepted")
                    .covering(&constraint.id),
                invalid(
                    format!("{} rejects value outside allowed set", field),
                    format!("Submit an unlisted value for {}", field),
                    format!("Error shown: {} is not allowed", field),
                ),
            ]
        }
        ConstraintKind::Format => {
            let expected_format = constraint
                .params
                .get("format")
                .or_else(|| constraint.params.get("type"))
                .map(value_to_plain_string)
                .unwrap_or_else(|| "expected".to_string());
            vec![
                CandidateRecord::new(format!("{} accepts well-formed value", field), TestType::Func, "P1")
                    .step(format!("Enter a {} {} value", expected_format, field))
                    .expect("Value is accepted")
                    .covering(&constraint.id),
                invalid(
                    format!("{} rejects malformed value", field),
                    format!("Enter a malformed {} value", field),
                    format!("Error shown: {} format is invalid", field),
                ),
            ]
        }
    }
}

fn flow_case(flow: &Flow) -> CandidateRecord {
    let mut record = CandidateRecord::new(format!("Complete flow {}", flow.id), TestType::Func, "P1");
    for step in &flow.steps {
        record = record.step(step.clone());
    }
    record = record.expect(format!("Flow {} completes without errors", flow.id));
    for id in &flow.related_requirement_ids {
        record = record.covering(id);
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::bundle::{fuse_context, RunContext};
    use crate::model::{DomainModel, SourceKind};
    use serde_json::json;

    fn request(model: &DomainModel, scope: &str, types: &[TestType]) -> SuggestionRequest {
        SuggestionRequest {
            scope: scope.into(),
            bundle: fuse_context(model, scope, &RunContext::default()),
            test_types: types.to_vec(),
            prompt: String::new(),
        }
    }

    fn login_model() -> DomainModel {
        let mut model = DomainModel::new();
        model.add_requirement(Requirement {
            id: "REQ-1".into(),
            text: "Login must lock after 5 failures".into(),
            priority: RequirementPriority::Must,
            source_type: SourceKind::RequirementText,
        });
        model.add_requirement(Requirement {
            id: "REQ-2".into(),
            text: "Dark mode won't ship".into(),
            priority: RequirementPriority::Wont,
            source_type: SourceKind::RequirementText,
        });
        model.add_component(Component::new("btn-login", "Login", ComponentType::Button));
        model.add_component(Component::new("password", "Login", ComponentType::Input));
        model.add_constraint(
            Constraint::new("pwd-maxlen", "password", ConstraintKind::MaxLength).with_param("max", 50),
        );
        model
    }

    #[test]
    fn test_login_candidates() {
        let model = login_model();
        let records = RuleBasedSource::new().candidates(&request(&model, "Login", &TestType::ALL));
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec![
                "Verify REQ-1: Login must lock after 5 failures",
                "Verify btn-login on Login",
                "Verify password on Login",
                "password at maximum length",
                "password over maximum length",
            ]
        );
        assert_eq!(records[4].steps, vec!["Enter password of 51 chars"]);
        assert_eq!(records[0].priority.as_deref(), Some("P0"));
    }

    #[test]
    fn test_requested_types_only() {
        let model = login_model();
        let records = RuleBasedSource::new().candidates(&request(&model, "Login", &[TestType::Neg]));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].test_type.as_deref(), Some("NEG"));
    }

    #[test]
    fn test_secured_endpoint_gets_permission_case() {
        let mut model = DomainModel::new();
        let mut endpoint = Component::new("createPet", "/pets", ComponentType::Endpoint);
        endpoint.properties.insert("method".into(), json!("POST"));
        endpoint.properties.insert("path".into(), json!("/pets"));
        endpoint.properties.insert("secured".into(), json!(true));
        model.add_component(endpoint);

        let records = RuleBasedSource::new().candidates(&request(&model, "/pets", &TestType::ALL));
        let types: Vec<&str> = records.iter().filter_map(|r| r.test_type.as_deref()).collect();
        assert_eq!(types, vec!["FUNC", "NEG", "PERM"]);
        assert_eq!(records[2].title, "POST /pets - Unauthorized Access");
        assert!(records.iter().all(|r| r.covers == vec!["createPet"]));
    }

    #[test]
    fn test_shared_context_not_repeated_in_unrelated_scope() {
        let mut model = login_model();
        model.add_component(Component::new("search", "Home", ComponentType::Input));
        let records = RuleBasedSource::new().candidates(&request(&model, "Home", &TestType::ALL));
        let titles: Vec<&str> = records.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["Verify search on Home"]);
    }

    #[tokio::test]
    async fn test_suggest_is_infallible() {
        let model = login_model();
        let source = RuleBasedSource::new();
        let records = source
            .suggest(&request(&model, "Login", &TestType::ALL))
            .await
            .unwrap();
        assert!(!records.is_empty());
        assert_eq!(source.name(), "rule-based");
    }
}
