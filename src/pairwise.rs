//! Pairwise (2-wise) combination planning
//!
//! A component with two or more enumerable fields (an owned enum
//! constraint, a boolean property, or its state set) gets a small set of
//! value combinations in which every pair of values from two different
//! fields appears at least once.
//!
//! Construction is the usual greedy covering array: repeatedly take the
//! row that covers the most still-uncovered pairs. When the full product is
//! small the best row is found by scanning every row; otherwise rows are
//! built one field at a time, seeded by the first uncovered pair. Ties
//! always go to the earliest field/value in declaration order, so the same
//! component always yields the same rows.

use crate::config::GeneratorConfig;
use crate::model::{Component, ConstraintKind, DomainModel, TestCase};
use crate::util::contains_word;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

/// Boolean properties that describe layout or metadata, not input
const NON_PARAMETER_PROPERTIES: &[&str] = &["visible", "locked", "secured", "deprecated"];

/// Where a field's value domain came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum FieldOrigin {
    Enum,
    Boolean,
    State,
}

/// One parameter with an enumerable domain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ParameterField {
    pub name: String,
    pub origin: FieldOrigin,
    pub values: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Assignment {
    pub field: String,
    pub value: String,
}

/// One row of the covering array
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Combination {
    pub assignments: Vec<Assignment>,
    /// First case whose text contains every value of the row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub represented_by: Option<String>,
}

impl Combination {
    pub fn is_represented(&self) -> bool {
        self.represented_by.is_some()
    }

    /// `field=value, field=value`
    pub fn describe(&self) -> String {
        self.assignments
            .iter()
            .map(|a| format!("{}={}", a.field, a.value))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Combinations planned for one component
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComponentCombinations {
    pub component_id: String,
    pub scope: String,
    pub fields: Vec<ParameterField>,
    pub combinations: Vec<Combination>,
}

impl ComponentCombinations {
    pub fn unrepresented(&self) -> impl Iterator<Item = &Combination> {
        self.combinations.iter().filter(|c| !c.is_represented())
    }
}

/// Enumerable fields of a component
///
/// Order: owned enum constraints in declaration order, then boolean
/// properties sorted by property name (properties are keyed by name, so
/// their source order is not kept), then `state`. Field order is the
/// tie-break order of the covering-row search.
pub fn component_fields(model: &DomainModel, component: &Component) -> Vec<ParameterField> {
    let mut fields: Vec<ParameterField> = Vec::new();

    for constraint in model.constraints() {
        if constraint.kind != ConstraintKind::Enum {
            continue;
        }
        let owned = model
            .constraint_owner(constraint)
            .is_some_and(|owner| owner.id == component.id);
        if !owned {
            continue;
        }
        push_field(
            &mut fields,
            constraint.target_field(),
            FieldOrigin::Enum,
            constraint.enum_values(),
        );
    }

    for (name, value) in &component.properties {
        if matches!(value, Value::Bool(_)) && !NON_PARAMETER_PROPERTIES.contains(&name.as_str()) {
            push_field(
                &mut fields,
                name,
                FieldOrigin::Boolean,
                vec!["true".to_string(), "false".to_string()],
            );
        }
    }

    push_field(
        &mut fields,
        "state",
        FieldOrigin::State,
        component.states.clone(),
    );
    fields
}

fn push_field(fields: &mut Vec<ParameterField>, name: &str, origin: FieldOrigin, values: Vec<String>) {
    let mut unique: Vec<String> = Vec::new();
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    if unique.len() < 2 || fields.iter().any(|f| f.name == name) {
        return;
    }
    fields.push(ParameterField {
        name: name.to_string(),
        origin,
        values: unique,
    });
}

/// (field a, value a, field b, value b) with a < b
type Pair = (usize, usize, usize, usize);

fn all_pairs(sizes: &[usize]) -> BTreeSet<Pair> {
    let mut pairs = BTreeSet::new();
    for i in 0..sizes.len() {
        for j in (i + 1)..sizes.len() {
            for a in 0..sizes[i] {
                for b in 0..sizes[j] {
                    pairs.insert((i, a, j, b));
                }
            }
        }
    }
    pairs
}

fn new_pairs(row: &[usize], uncovered: &BTreeSet<Pair>) -> usize {
    let mut count = 0;
    for i in 0..row.len() {
        for j in (i + 1)..row.len() {
            if uncovered.contains(&(i, row[i], j, row[j])) {
                count += 1;
            }
        }
    }
    count
}

fn mark_covered(row: &[usize], uncovered: &mut BTreeSet<Pair>) {
    for i in 0..row.len() {
        for j in (i + 1)..row.len() {
            uncovered.remove(&(i, row[i], j, row[j]));
        }
    }
}

/// Every row of the full product, first field most significant
fn full_product(sizes: &[usize]) -> Vec<Vec<usize>> {
    let mut rows = vec![Vec::new()];
    for &size in sizes {
        rows = rows
            .into_iter()
            .flat_map(|prefix| {
                (0..size).map(move |v| {
                    let mut row = prefix.clone();
                    row.push(v);
                    row
                })
            })
            .collect();
    }
    rows
}

fn product_size(sizes: &[usize]) -> Option<usize> {
    sizes.iter().try_fold(1usize, |acc, &s| acc.checked_mul(s))
}

/// Greedy pairwise covering array over value indices
///
/// `sizes[i]` is the number of values of field `i`. Returns rows of value
/// indices such that every cross-field value pair occurs at least once.
pub fn covering_rows(sizes: &[usize], max_exhaustive_rows: usize) -> Vec<Vec<usize>> {
    if sizes.len() < 2 || sizes.contains(&0) {
        return Vec::new();
    }
    let mut uncovered = all_pairs(sizes);
    let mut rows = Vec::new();

    let exhaustive = product_size(sizes).is_some_and(|n| n <= max_exhaustive_rows);
    if exhaustive {
        let candidates = full_product(sizes);
        while !uncovered.is_empty() {
            let mut best: Option<(&Vec<usize>, usize)> = None;
            for row in &candidates {
                let gain = new_pairs(row, &uncovered);
                if best.is_none_or(|(_, best_gain)| gain > best_gain) {
                    best = Some((row, gain));
                }
            }
            let Some((row, gain)) = best else { break };
            if gain == 0 {
                break;
            }
            mark_covered(row, &mut uncovered);
            rows.push(row.clone());
        }
        return rows;
    }

    while let Some(&(i, a, j, b)) = uncovered.iter().next() {
        let mut row: Vec<Option<usize>> = vec![None; sizes.len()];
        row[i] = Some(a);
        row[j] = Some(b);
        for field in 0..sizes.len() {
            if row[field].is_some() {
                continue;
            }
            let mut best = (0usize, 0usize);
            for value in 0..sizes[field] {
                let gain = row
                    .iter()
                    .enumerate()
                    .filter_map(|(other, v)| v.map(|v| (other, v)))
                    .filter(|&(other, v)| {
                        let pair = if other < field {
                            (other, v, field, value)
                        } else {
                            (field, value, other, v)
                        };
                        uncovered.contains(&pair)
                    })
                    .count();
                if gain > best.1 {
                    best = (value, gain);
                }
            }
            row[field] = Some(best.0);
        }
        let row: Vec<usize> = row.into_iter().map(|v| v.unwrap_or(0)).collect();
        mark_covered(&row, &mut uncovered);
        rows.push(row);
    }
    rows
}

/// Plan combinations for every eligible component
pub fn plan_combinations(model: &DomainModel, config: &GeneratorConfig) -> Vec<ComponentCombinations> {
    let mut plans = Vec::new();
    for component in model.components() {
        if !config.pairwise.is_enabled_for(&component.id) {
            continue;
        }
        let fields = component_fields(model, component);
        if fields.len() < 2 {
            continue;
        }
        let sizes: Vec<usize> = fields.iter().map(|f| f.values.len()).collect();
        let combinations = covering_rows(&sizes, config.max_exhaustive_rows)
            .into_iter()
            .map(|row| Combination {
                assignments: row
                    .iter()
                    .zip(&fields)
                    .map(|(&value, field)| Assignment {
                        field: field.name.clone(),
                        value: field.values[value].clone(),
                    })
                    .collect(),
                represented_by: None,
            })
            .collect::<Vec<_>>();
        tracing::debug!(
            component = %component.id,
            fields = fields.len(),
            rows = combinations.len(),
            "planned pairwise combinations"
        );
        plans.push(ComponentCombinations {
            component_id: component.id.clone(),
            scope: component.screen_id.clone(),
            fields,
            combinations,
        });
    }
    plans
}

/// Mark each combination with the first case that spells out all its values
///
/// Only cases in the component's scope or covering the component are
/// considered.
pub fn reconcile(plans: &[ComponentCombinations], cases: &[TestCase]) -> Vec<ComponentCombinations> {
    plans
        .iter()
        .map(|plan| {
            let texts: Vec<(&str, String)> = cases
                .iter()
                .filter(|c| c.scope == plan.scope || c.covers.component_ids.contains(&plan.component_id))
                .map(|c| (c.id.as_str(), c.searchable_text()))
                .collect();
            let combinations = plan
                .combinations
                .iter()
                .map(|combination| {
                    let represented_by = texts
                        .iter()
                        .find(|(_, text)| {
                            combination
                                .assignments
                                .iter()
                                .all(|a| contains_word(text, &a.value))
                        })
                        .map(|(id, _)| id.to_string());
                    Combination {
                        represented_by,
                        ..combination.clone()
                    }
                })
                .collect();
            ComponentCombinations {
                combinations,
                ..plan.clone()
            }
        })
        .collect()
}
