//! Source normalization
//!
//! Each parser's raw output enters as one [`SourceInput`] variant and leaves
//! as a [`Fragment`] of domain entities tagged with its provenance. Raw source
//! shapes stop here: later stages only see the [`DomainModel`].
//!
//! A structurally unreadable source fails with [`Error::SourceParse`]; when
//! several sources are merged by [`build_model`] that failure becomes a
//! diagnostic and the remaining sources are still used.

pub mod api_schema;
pub mod component_tree;
pub mod requirements;

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::model::{
    Component, Constraint, DomainModel, Flow, Provenance, Requirement, SourceKind, GLOBAL_SCOPE,
};
use crate::suggest::text_format::parse_suggestion_text;
use crate::suggest::CandidateRecord;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Raw output of one parser, tagged by source kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceInput {
    /// Free-text requirement list, one requirement per line
    RequirementText { id: String, text: String },
    /// Design-tool node tree (Figma-style `type`/`name`/`children` nodes)
    ComponentTree { id: String, root: Value },
    /// OpenAPI-style document
    ApiSchema { id: String, document: Value },
    /// Candidate test cases observed by a vision provider for one scope,
    /// as structured records and/or suggestion text
    VisionObservations {
        id: String,
        #[serde(default)]
        scope: Option<String>,
        #[serde(default)]
        records: Vec<CandidateRecord>,
        #[serde(default)]
        text: Option<String>,
    },
}

impl SourceInput {
    pub fn id(&self) -> &str {
        match self {
            SourceInput::RequirementText { id, .. }
            | SourceInput::ComponentTree { id, .. }
            | SourceInput::ApiSchema { id, .. }
            | SourceInput::VisionObservations { id, .. } => id,
        }
    }

    pub fn kind(&self) -> SourceKind {
        match self {
            SourceInput::RequirementText { .. } => SourceKind::RequirementText,
            SourceInput::ComponentTree { .. } => SourceKind::ComponentTree,
            SourceInput::ApiSchema { .. } => SourceKind::ApiSchema,
            SourceInput::VisionObservations { .. } => SourceKind::VisionObservations,
        }
    }
}

/// Domain entities produced from one source
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
    Requirements {
        requirements: Vec<Requirement>,
        flows: Vec<Flow>,
    },
    Components {
        components: Vec<Component>,
        constraints: Vec<Constraint>,
    },
    Endpoints {
        components: Vec<Component>,
        constraints: Vec<Constraint>,
    },
    /// Candidates that skip the domain model and go straight to generation
    Observations {
        scope: String,
        records: Vec<CandidateRecord>,
    },
}

/// One normalized source: fragment, provenance and non-fatal findings
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSource {
    pub provenance: Provenance,
    pub fragment: Fragment,
    pub diagnostics: Vec<Diagnostic>,
}

/// Observation records waiting to become candidates for one scope
#[derive(Debug, Clone, PartialEq)]
pub struct ObservationBatch {
    pub source_id: String,
    pub scope: String,
    pub records: Vec<CandidateRecord>,
}

/// Result of merging every source of a run
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub model: DomainModel,
    pub observations: Vec<ObservationBatch>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Convert one parser output into a domain fragment
pub fn normalize(input: &SourceInput) -> Result<NormalizedSource> {
    let provenance = Provenance {
        kind: input.kind(),
        source_id: input.id().to_string(),
    };
    let (fragment, diagnostics) = match input {
        SourceInput::RequirementText { text, .. } => {
            let parsed = requirements::parse_requirements(text);
            let fragment = Fragment::Requirements {
                requirements: parsed.requirements,
                flows: parsed.flows,
            };
            (fragment, Vec::new())
        }
        SourceInput::ComponentTree { id, root } => {
            let parsed = component_tree::parse_component_tree(id, root)?;
            let fragment = Fragment::Components {
                components: parsed.components,
                constraints: parsed.constraints,
            };
            (fragment, parsed.diagnostics)
        }
        SourceInput::ApiSchema { id, document } => {
            let parsed = api_schema::parse_api_schema(id, document)?;
            let fragment = Fragment::Endpoints {
                components: parsed.components,
                constraints: parsed.constraints,
            };
            (fragment, parsed.diagnostics)
        }
        SourceInput::VisionObservations {
            scope,
            records,
            text,
            ..
        } => {
            let mut all = records.clone();
            if let Some(text) = text {
                all.extend(parse_suggestion_text(text));
            }
            let scope = scope
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or(GLOBAL_SCOPE)
                .to_string();
            (
                Fragment::Observations {
                    scope,
                    records: all,
                },
                Vec::new(),
            )
        }
    };
    Ok(NormalizedSource {
        provenance,
        fragment,
        diagnostics,
    })
}

/// Normalize every source and merge the fragments into one domain model
///
/// Sources are merged in the given order. The first declaration of an id
/// wins; later duplicates are reported and ignored. A source that fails to
/// parse contributes nothing and is reported.
pub fn build_model(inputs: &[SourceInput]) -> Normalized {
    let mut out = Normalized::default();

    for input in inputs {
        match normalize(input) {
            Ok(normalized) => merge_fragment(&mut out, normalized),
            Err(Error::SourceParse {
                source_id,
                item,
                message,
            }) => {
                tracing::warn!(source = %source_id, item = %item, error = %message, "source skipped");
                out.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::SourceParseFailed, message)
                        .in_scope(source_id)
                        .about(item),
                );
            }
            Err(other) => {
                tracing::warn!(source = %input.id(), error = %other, "source skipped");
                out.diagnostics.push(
                    Diagnostic::new(DiagnosticKind::SourceParseFailed, other.to_string())
                        .in_scope(input.id()),
                );
            }
        }
    }

    tracing::debug!(
        requirements = out.model.requirements().len(),
        components = out.model.components().len(),
        constraints = out.model.constraints().len(),
        flows = out.model.flows().len(),
        observation_batches = out.observations.len(),
        "domain model built"
    );
    out
}

fn merge_fragment(out: &mut Normalized, normalized: NormalizedSource) {
    let NormalizedSource {
        provenance,
        fragment,
        diagnostics,
    } = normalized;
    out.diagnostics.extend(diagnostics);

    let source_id = provenance.source_id.clone();
    let duplicate = |id: &str, family: &str| {
        Diagnostic::new(
            DiagnosticKind::DuplicateEntity,
            format!("{} '{}' already declared; later declaration ignored", family, id),
        )
        .in_scope(source_id.clone())
        .about(id)
    };

    match fragment {
        Fragment::Requirements {
            requirements,
            flows,
        } => {
            for requirement in requirements {
                let id = requirement.id.clone();
                if out.model.add_requirement(requirement) {
                    out.model.record_provenance(&id, provenance.clone());
                } else {
                    out.diagnostics.push(duplicate(&id, "requirement"));
                }
            }
            for flow in flows {
                let id = flow.id.clone();
                if out.model.add_flow(flow) {
                    out.model.record_provenance(&id, provenance.clone());
                } else {
                    out.diagnostics.push(duplicate(&id, "flow"));
                }
            }
        }
        Fragment::Components {
            components,
            constraints,
        }
        | Fragment::Endpoints {
            components,
            constraints,
        } => {
            for component in components {
                let id = component.id.clone();
                if out.model.add_component(component) {
                    out.model.record_provenance(&id, provenance.clone());
                } else {
                    out.diagnostics.push(duplicate(&id, "component"));
                }
            }
            for constraint in constraints {
                let id = constraint.id.clone();
                if out.model.add_constraint(constraint) {
                    out.model.record_provenance(&id, provenance.clone());
                } else {
                    out.diagnostics.push(duplicate(&id, "constraint"));
                }
            }
        }
        Fragment::Observations { scope, records } => {
            out.observations.push(ObservationBatch {
                source_id: provenance.source_id,
                scope,
                records,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::count_kind;
    use serde_json::json;

    #[test]
    fn test_source_input_is_kind_tagged() {
        let input: SourceInput = serde_json::from_value(json!({
            "kind": "requirement_text",
            "id": "prd",
            "text": "REQ-1: The system must support login"
        }))
        .unwrap();
        assert_eq!(input.kind(), SourceKind::RequirementText);
        assert_eq!(input.id(), "prd");
    }

    #[test]
    fn test_bad_source_does_not_block_others() {
        let inputs = vec![
            SourceInput::ApiSchema {
                id: "broken".into(),
                document: json!({"paths": ["not", "a", "mapping"]}),
            },
            SourceInput::RequirementText {
                id: "prd".into(),
                text: "REQ-1: The system must support login".into(),
            },
        ];
        let normalized = build_model(&inputs);
        assert_eq!(normalized.model.requirements().len(), 1);
        assert_eq!(
            count_kind(&normalized.diagnostics, DiagnosticKind::SourceParseFailed),
            1
        );
        let diag = &normalized.diagnostics[0];
        assert_eq!(diag.scope.as_deref(), Some("broken"));
    }

    #[test]
    fn test_duplicate_ids_across_sources_reported() {
        let inputs = vec![
            SourceInput::RequirementText {
                id: "a".into(),
                text: "REQ-1: Users must log in".into(),
            },
            SourceInput::RequirementText {
                id: "b".into(),
                text: "REQ-1: Users should log out".into(),
            },
        ];
        let normalized = build_model(&inputs);
        assert_eq!(normalized.model.requirements().len(), 1);
        assert_eq!(normalized.model.requirements()[0].text, "Users must log in");
        assert_eq!(
            normalized.model.provenance_of("REQ-1").map(|p| p.source_id.as_str()),
            Some("a")
        );
        assert_eq!(
            count_kind(&normalized.diagnostics, DiagnosticKind::DuplicateEntity),
            1
        );
    }

    #[test]
    fn test_observations_bypass_the_model() {
        let input = SourceInput::VisionObservations {
            id: "shot-1".into(),
            scope: Some("Login".into()),
            records: vec![CandidateRecord {
                title: "Login with valid credentials".into(),
                steps: vec!["Enter credentials".into()],
                ..Default::default()
            }],
            text: Some("TC-001: Empty password\nSteps:\n1. Leave password blank\n".into()),
        };
        let normalized = build_model(&[input]);
        assert!(normalized.model.requirements().is_empty());
        assert!(normalized.model.components().is_empty());
        assert_eq!(normalized.observations.len(), 1);
        assert_eq!(normalized.observations[0].scope, "Login");
        assert_eq!(normalized.observations[0].records.len(), 2);
    }

    #[test]
    fn test_observations_without_scope_are_global() {
        let input = SourceInput::VisionObservations {
            id: "shot".into(),
            scope: None,
            records: Vec::new(),
            text: None,
        };
        let normalized = normalize(&input).unwrap();
        match normalized.fragment {
            Fragment::Observations { scope, .. } => assert_eq!(scope, GLOBAL_SCOPE),
            other => panic!("unexpected fragment {:?}", other),
        }
    }
}
