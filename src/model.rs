//! Domain model: the canonical entities every stage reads and writes
//!
//! Requirements, components, constraints and flows are created once per
//! run from normalized source data and are read-only afterwards. Test
//! cases are produced by the generation orchestrator and replaced (never
//! mutated in place) by the deduplicator.
//!
//! ## Example
//!
//! ```yaml
//! id: pwd-maxlen
//! targetId: password
//! kind: maxLength
//! params:
//!   max: 50
//! ```

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

/// Which kind of parser produced a fragment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    RequirementText,
    ComponentTree,
    ApiSchema,
    VisionObservations,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceKind::RequirementText => "requirement_text",
            SourceKind::ComponentTree => "component_tree",
            SourceKind::ApiSchema => "api_schema",
            SourceKind::VisionObservations => "vision_observations",
        };
        write!(f, "{}", s)
    }
}

/// Where an entity came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Provenance {
    pub kind: SourceKind,
    pub source_id: String,
}

// ============================================================================
// Requirements
// ============================================================================

/// MoSCoW priority. Ordering is Must < Should < Could < Wont so sorting
/// ascending puts Must first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
pub enum RequirementPriority {
    Must,
    Should,
    Could,
    Wont,
}

impl RequirementPriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "must" => Some(Self::Must),
            "should" => Some(Self::Should),
            "could" => Some(Self::Could),
            "wont" | "won't" => Some(Self::Wont),
            _ => None,
        }
    }
}

/// A requirement that needs to be tested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Requirement {
    pub id: String,
    pub text: String,
    pub priority: RequirementPriority,
    pub source_type: SourceKind,
}

// ============================================================================
// Components and constraints
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ComponentType {
    Input,
    Button,
    Dropdown,
    Checkbox,
    Text,
    Endpoint,
    Other,
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ComponentType::Input => "input",
            ComponentType::Button => "button",
            ComponentType::Dropdown => "dropdown",
            ComponentType::Checkbox => "checkbox",
            ComponentType::Text => "text",
            ComponentType::Endpoint => "endpoint",
            ComponentType::Other => "other",
        };
        write!(f, "{}", s)
    }
}

/// A UI element or API endpoint that can be tested
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Component {
    pub id: String,
    pub screen_id: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
    /// Constraint ids, in declaration order
    #[serde(default)]
    pub constraints: Vec<String>,
    /// State names, unique, in declaration order
    #[serde(default)]
    pub states: Vec<String>,
}

impl Component {
    pub fn new(id: impl Into<String>, screen_id: impl Into<String>, typ: ComponentType) -> Self {
        Self {
            id: id.into(),
            screen_id: screen_id.into(),
            component_type: typ,
            properties: BTreeMap::new(),
            constraints: Vec::new(),
            states: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum ConstraintKind {
    Required,
    MinLength,
    MaxLength,
    Format,
    Enum,
    Unique,
    Range,
}

impl ConstraintKind {
    /// Kinds whose coverage needs both a valid-value and an invalid-value case
    pub fn needs_value_classes(&self) -> bool {
        matches!(
            self,
            ConstraintKind::Enum
                | ConstraintKind::Range
                | ConstraintKind::Format
                | ConstraintKind::MinLength
                | ConstraintKind::MaxLength
        )
    }

    /// Short slug used when synthesizing constraint ids
    pub fn slug(&self) -> &'static str {
        match self {
            ConstraintKind::Required => "required",
            ConstraintKind::MinLength => "minlen",
            ConstraintKind::MaxLength => "maxlen",
            ConstraintKind::Format => "format",
            ConstraintKind::Enum => "enum",
            ConstraintKind::Unique => "unique",
            ConstraintKind::Range => "range",
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ConstraintKind::Required => "required",
            ConstraintKind::MinLength => "minLength",
            ConstraintKind::MaxLength => "maxLength",
            ConstraintKind::Format => "format",
            ConstraintKind::Enum => "enum",
            ConstraintKind::Unique => "unique",
            ConstraintKind::Range => "range",
        };
        write!(f, "{}", s)
    }
}

/// A rule on a component or field. Referenced, never owned, by test cases.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Constraint {
    pub id: String,
    /// Component id, `<componentId>.<field>`, or a bare field name
    pub target_id: String,
    pub kind: ConstraintKind,
    #[serde(default)]
    pub params: BTreeMap<String, Value>,
}

impl Constraint {
    pub fn new(id: impl Into<String>, target_id: impl Into<String>, kind: ConstraintKind) -> Self {
        Self {
            id: id.into(),
            target_id: target_id.into(),
            kind,
            params: BTreeMap::new(),
        }
    }

    pub fn with_param(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    /// Field part of the target (`form.password` → `password`)
    pub fn target_field(&self) -> &str {
        self.target_id
            .rsplit_once('.')
            .map(|(_, field)| field)
            .unwrap_or(&self.target_id)
    }

    /// Allowed values of an enum constraint, rendered as strings
    pub fn enum_values(&self) -> Vec<String> {
        match self.params.get("values") {
            Some(Value::Array(items)) => items.iter().map(value_to_plain_string).collect(),
            _ => Vec::new(),
        }
    }

    /// Numeric parameter (`max`, `min`, ...)
    pub fn number_param(&self, key: &str) -> Option<f64> {
        self.params.get(key).and_then(|v| match v {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        })
    }
}

/// Render a JSON value without quotes around strings
pub fn value_to_plain_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ============================================================================
// Flows
// ============================================================================

/// A user flow through several steps
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: String,
    pub steps: Vec<String>,
    #[serde(default)]
    pub related_requirement_ids: BTreeSet<String>,
}

// ============================================================================
// Test cases
// ============================================================================

/// Test case category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum TestType {
    Func,
    Bound,
    Neg,
    Perm,
    Sec,
    Perf,
    A11y,
}

impl TestType {
    pub const ALL: [TestType; 7] = [
        TestType::Func,
        TestType::Bound,
        TestType::Neg,
        TestType::Perm,
        TestType::Sec,
        TestType::Perf,
        TestType::A11y,
    ];

    /// Parse the wire name or a long-form alias (`negative`, `security`, ...)
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FUNC" | "FUNCTIONAL" => Some(TestType::Func),
            "BOUND" | "BOUNDARY" => Some(TestType::Bound),
            "NEG" | "NEGATIVE" => Some(TestType::Neg),
            "PERM" | "PERMISSION" | "AUTHORIZATION" => Some(TestType::Perm),
            "SEC" | "SECURITY" => Some(TestType::Sec),
            "PERF" | "PERFORMANCE" => Some(TestType::Perf),
            "A11Y" | "ACCESSIBILITY" => Some(TestType::A11y),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TestType::Func => "FUNC",
            TestType::Bound => "BOUND",
            TestType::Neg => "NEG",
            TestType::Perm => "PERM",
            TestType::Sec => "SEC",
            TestType::Perf => "PERF",
            TestType::A11y => "A11Y",
        }
    }
}

impl fmt::Display for TestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Test case priority. P0 sorts first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize, JsonSchema)]
pub enum CasePriority {
    P0,
    #[default]
    P1,
    P2,
}

impl CasePriority {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "P0" | "CRITICAL" => Some(CasePriority::P0),
            "P1" | "HIGH" => Some(CasePriority::P1),
            "P2" | "P3" | "MEDIUM" | "LOW" => Some(CasePriority::P2),
            _ => None,
        }
    }
}

impl fmt::Display for CasePriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CasePriority::P0 => "P0",
            CasePriority::P1 => "P1",
            CasePriority::P2 => "P2",
        };
        write!(f, "{}", s)
    }
}

/// Entities a test case exercises
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Covers {
    #[serde(default)]
    pub requirement_ids: BTreeSet<String>,
    #[serde(default)]
    pub component_ids: BTreeSet<String>,
    #[serde(default)]
    pub constraint_ids: BTreeSet<String>,
    /// Referenced ids that resolve to nothing in the domain model
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub orphan_ids: BTreeSet<String>,
}

impl Covers {
    pub fn is_empty(&self) -> bool {
        self.requirement_ids.is_empty()
            && self.component_ids.is_empty()
            && self.constraint_ids.is_empty()
            && self.orphan_ids.is_empty()
    }

    /// Set union of both cover sets
    pub fn union(&self, other: &Covers) -> Covers {
        Covers {
            requirement_ids: self
                .requirement_ids
                .union(&other.requirement_ids)
                .cloned()
                .collect(),
            component_ids: self
                .component_ids
                .union(&other.component_ids)
                .cloned()
                .collect(),
            constraint_ids: self
                .constraint_ids
                .union(&other.constraint_ids)
                .cloned()
                .collect(),
            orphan_ids: self.orphan_ids.union(&other.orphan_ids).cloned().collect(),
        }
    }

    pub fn is_superset(&self, other: &Covers) -> bool {
        self.requirement_ids.is_superset(&other.requirement_ids)
            && self.component_ids.is_superset(&other.component_ids)
            && self.constraint_ids.is_superset(&other.constraint_ids)
            && self.orphan_ids.is_superset(&other.orphan_ids)
    }
}

/// A human-reviewable test specification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct TestCase {
    pub id: String,
    pub title: String,
    #[serde(rename = "type")]
    pub test_type: TestType,
    pub priority: CasePriority,
    pub steps: Vec<String>,
    pub expected: Vec<String>,
    pub covers: Covers,
    /// Hash of type + normalized title
    pub fingerprint: String,
    /// Hash of the context bundle that produced this case
    pub source_fingerprint: String,
    /// Screen id, endpoint path, or `global`; deduplication never crosses scopes
    pub scope: String,
}

impl TestCase {
    /// Title, steps and expected results as one lowercase text blob
    pub fn searchable_text(&self) -> String {
        let mut text = self.title.to_lowercase();
        for line in self.steps.iter().chain(self.expected.iter()) {
            text.push('\n');
            text.push_str(&line.to_lowercase());
        }
        text
    }
}

// ============================================================================
// Domain model
// ============================================================================

/// Scope used for entities that are not bound to a screen or endpoint
pub const GLOBAL_SCOPE: &str = "global";

/// All entities of one generation run, in declaration order
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct DomainModel {
    requirements: Vec<Requirement>,
    components: Vec<Component>,
    constraints: Vec<Constraint>,
    flows: Vec<Flow>,
    provenance: BTreeMap<String, Provenance>,
}

impl DomainModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    pub fn flows(&self) -> &[Flow] {
        &self.flows
    }

    pub fn provenance_of(&self, id: &str) -> Option<&Provenance> {
        self.provenance.get(id)
    }

    pub fn requirement(&self, id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.id == id)
    }

    pub fn component(&self, id: &str) -> Option<&Component> {
        self.components.iter().find(|c| c.id == id)
    }

    pub fn constraint(&self, id: &str) -> Option<&Constraint> {
        self.constraints.iter().find(|c| c.id == id)
    }

    /// Add a requirement; returns false when the id is already taken
    pub fn add_requirement(&mut self, requirement: Requirement) -> bool {
        if self.requirement(&requirement.id).is_some() {
            return false;
        }
        self.requirements.push(requirement);
        true
    }

    pub fn add_component(&mut self, component: Component) -> bool {
        if self.component(&component.id).is_some() {
            return false;
        }
        self.components.push(component);
        true
    }

    pub fn add_constraint(&mut self, constraint: Constraint) -> bool {
        if self.constraint(&constraint.id).is_some() {
            return false;
        }
        self.constraints.push(constraint);
        true
    }

    pub fn add_flow(&mut self, flow: Flow) -> bool {
        if self.flows.iter().any(|f| f.id == flow.id) {
            return false;
        }
        self.flows.push(flow);
        true
    }

    pub fn record_provenance(&mut self, id: &str, provenance: Provenance) {
        self.provenance.insert(id.to_string(), provenance);
    }

    /// Component a constraint belongs to, if any
    ///
    /// Resolution: the component listing the constraint id, a component whose
    /// id equals the target, or a component whose id is the target prefix
    /// before the last `.`.
    pub fn constraint_owner(&self, constraint: &Constraint) -> Option<&Component> {
        if let Some(owner) = self
            .components
            .iter()
            .find(|c| c.constraints.iter().any(|id| id == &constraint.id))
        {
            return Some(owner);
        }
        if let Some(owner) = self.component(&constraint.target_id) {
            return Some(owner);
        }
        constraint
            .target_id
            .rsplit_once('.')
            .and_then(|(prefix, _)| self.component(prefix))
    }

    /// Distinct screen/endpoint scopes, in component declaration order
    pub fn scopes(&self) -> Vec<String> {
        let mut scopes: Vec<String> = Vec::new();
        for component in &self.components {
            if !scopes.contains(&component.screen_id) {
                scopes.push(component.screen_id.clone());
            }
        }
        scopes
    }

    /// Resolve a referenced id into the family it belongs to
    pub fn classify_id(&self, id: &str) -> Option<EntityFamily> {
        if self.requirement(id).is_some() {
            Some(EntityFamily::Requirement)
        } else if self.component(id).is_some() {
            Some(EntityFamily::Component)
        } else if self.constraint(id).is_some() {
            Some(EntityFamily::Constraint)
        } else {
            None
        }
    }

    /// Every id known to the model (requirements, components, constraints)
    pub fn entity_ids(&self) -> impl Iterator<Item = &str> {
        self.requirements
            .iter()
            .map(|r| r.id.as_str())
            .chain(self.components.iter().map(|c| c.id.as_str()))
            .chain(self.constraints.iter().map(|c| c.id.as_str()))
    }
}

/// Which entity family an id resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityFamily {
    Requirement,
    Component,
    Constraint,
}
