//! Context fusion and work-unit planning
//!
//! One work unit per screen/endpoint scope. Each unit gets a context bundle
//! fused in a fixed order: requirements (Must first), components
//! (declaration order), constraints grouped by target, flows, then free
//! text. Downstream suggestion sources may truncate long bundles, so the
//! order decides what they see first.

use crate::error::Result;
use crate::model::{Component, Constraint, DomainModel, Flow, Requirement, GLOBAL_SCOPE};
use crate::normalize::ObservationBatch;
use crate::suggest::CandidateRecord;
use crate::util::short_hash;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Additional context supplied with a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RunContext {
    /// Notes added to every unit's bundle
    #[serde(default)]
    pub free_text: Vec<String>,

    /// Notes for one scope only (scope -> notes)
    #[serde(default)]
    pub scope_notes: BTreeMap<String, Vec<String>>,

    /// Ids every case of a scope is taken to cover (scope -> ids)
    #[serde(default)]
    pub context_ids: BTreeMap<String, BTreeSet<String>>,
}

/// Constraints sharing one target, in declaration order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintGroup {
    pub target_id: String,
    pub constraints: Vec<Constraint>,
}

/// Ordered context handed to a suggestion source
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContextBundle {
    pub scope: String,
    pub requirements: Vec<Requirement>,
    pub components: Vec<Component>,
    pub constraint_groups: Vec<ConstraintGroup>,
    pub flows: Vec<Flow>,
    pub free_text: Vec<String>,
}

impl ContextBundle {
    /// Hash identifying this exact bundle
    pub fn fingerprint(&self) -> Result<String> {
        let encoded = serde_json::to_string(self)?;
        Ok(short_hash(&encoded))
    }

    pub fn constraints(&self) -> impl Iterator<Item = &Constraint> {
        self.constraint_groups.iter().flat_map(|g| g.constraints.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
            && self.components.is_empty()
            && self.constraint_groups.is_empty()
            && self.flows.is_empty()
            && self.free_text.is_empty()
    }
}

/// One independent generation unit
#[derive(Debug, Clone, PartialEq)]
pub struct WorkUnit {
    /// Position in the plan; results are merged in this order
    pub index: usize,
    pub scope: String,
    pub bundle: ContextBundle,
    /// Explicit context ids for this scope
    pub context_ids: BTreeSet<String>,
    /// Observed candidates that skip the suggestion source
    pub observations: Vec<CandidateRecord>,
}

/// Split a model into work units, one per scope
///
/// Scopes come from components (declaration order), then from observation
/// batches. A model with requirements or flows but no scoped entity gets a
/// single `global` unit.
pub fn plan_units(
    model: &DomainModel,
    observations: &[ObservationBatch],
    context: &RunContext,
) -> Vec<WorkUnit> {
    let mut scopes = model.scopes();
    for batch in observations {
        if !scopes.contains(&batch.scope) {
            scopes.push(batch.scope.clone());
        }
    }
    if scopes.is_empty() && (!model.requirements().is_empty() || !model.flows().is_empty()) {
        scopes.push(GLOBAL_SCOPE.to_string());
    }

    scopes
        .into_iter()
        .enumerate()
        .map(|(index, scope)| WorkUnit {
            index,
            bundle: fuse_context(model, &scope, context),
            context_ids: context.context_ids.get(&scope).cloned().unwrap_or_default(),
            observations: observations
                .iter()
                .filter(|b| b.scope == scope)
                .flat_map(|b| b.records.iter().cloned())
                .collect(),
            scope,
        })
        .collect()
}

/// Build the ordered bundle for one scope
pub fn fuse_context(model: &DomainModel, scope: &str, context: &RunContext) -> ContextBundle {
    let mut requirements = model.requirements().to_vec();
    // stable: equal priorities keep declaration order
    requirements.sort_by_key(|r| r.priority);

    let components: Vec<Component> = model
        .components()
        .iter()
        .filter(|c| c.screen_id == scope)
        .cloned()
        .collect();

    let mut constraint_groups: Vec<ConstraintGroup> = Vec::new();
    for constraint in model.constraints() {
        let included = match model.constraint_owner(constraint) {
            Some(owner) => owner.screen_id == scope,
            None => true,
        };
        if !included {
            continue;
        }
        match constraint_groups
            .iter_mut()
            .find(|g| g.target_id == constraint.target_id)
        {
            Some(group) => group.constraints.push(constraint.clone()),
            None => constraint_groups.push(ConstraintGroup {
                target_id: constraint.target_id.clone(),
                constraints: vec![constraint.clone()],
            }),
        }
    }

    let mut free_text = context.free_text.clone();
    if let Some(notes) = context.scope_notes.get(scope) {
        free_text.extend(notes.iter().cloned());
    }

    ContextBundle {
        scope: scope.to_string(),
        requirements,
        components,
        constraint_groups,
        flows: model.flows().to_vec(),
        free_text,
    }
}
