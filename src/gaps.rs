//! Gap report
//!
//! Pure aggregation of the coverage matrices and the reconciled pairwise
//! combinations: what is uncovered, what is only partly covered, and a
//! stub (field/value assignment, no prose) for every combination no case
//! spells out.

use crate::coverage::{CoverageMatrices, ValueClass};
use crate::model::ConstraintKind;
use crate::pairwise::{Assignment, ComponentCombinations};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A constraint that is not completely covered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintGap {
    pub constraint_id: String,
    pub kind: ConstraintKind,
    /// Whether any case covers it at all
    pub covered: bool,
    /// Value classes still missing (empty for kinds without classes)
    pub missing: Vec<ValueClass>,
}

/// Suggested case for an unrepresented combination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CombinationStub {
    pub component_id: String,
    pub scope: String,
    pub assignments: Vec<Assignment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct OrphanReference {
    pub id: String,
    pub case_ids: Vec<String>,
}

/// Covered/total for one entity family
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct FamilySummary {
    pub total: usize,
    pub covered: usize,
    /// 1.0 when the family is empty
    pub ratio: f64,
}

impl FamilySummary {
    fn new(total: usize, covered: usize) -> Self {
        let ratio = if total == 0 {
            1.0
        } else {
            covered as f64 / total as f64
        };
        Self {
            total,
            covered,
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CoverageSummary {
    pub requirements: FamilySummary,
    pub components: FamilySummary,
    /// `covered` counts completely covered constraints
    pub constraints: FamilySummary,
    pub threshold: f64,
    /// Requirement ratio at or above `threshold`
    pub meets_threshold: bool,
}

/// Everything that still lacks tests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GapReport {
    pub uncovered_requirements: Vec<String>,
    pub uncovered_components: Vec<String>,
    pub incomplete_constraints: Vec<ConstraintGap>,
    pub unrepresented_combinations: Vec<CombinationStub>,
    pub orphan_references: Vec<OrphanReference>,
    pub summary: CoverageSummary,
    pub recommendations: Vec<String>,
}

impl GapReport {
    /// No uncovered entity, incomplete constraint or missing combination
    pub fn is_clean(&self) -> bool {
        self.uncovered_requirements.is_empty()
            && self.uncovered_components.is_empty()
            && self.incomplete_constraints.is_empty()
            && self.unrepresented_combinations.is_empty()
    }

    /// Human-readable report
    pub fn to_report(&self) -> String {
        let mut out = String::new();

        let status = if self.summary.meets_threshold {
            "✓ MEETS THRESHOLD"
        } else {
            "✗ BELOW THRESHOLD"
        };
        out.push_str(&format!(
            "Coverage: {} ({:.0}% required)\n",
            status,
            self.summary.threshold * 100.0
        ));
        for (label, family) in [
            ("Requirements", &self.summary.requirements),
            ("Components", &self.summary.components),
            ("Constraints", &self.summary.constraints),
        ] {
            out.push_str(&format!(
                "  {}: {}/{} ({:.0}%)\n",
                label,
                family.covered,
                family.total,
                family.ratio * 100.0
            ));
        }

        if !self.uncovered_requirements.is_empty() {
            out.push_str("\nUncovered requirements:\n");
            for id in &self.uncovered_requirements {
                out.push_str(&format!("  {}\n", id));
            }
        }
        if !self.uncovered_components.is_empty() {
            out.push_str("\nUncovered components:\n");
            for id in &self.uncovered_components {
                out.push_str(&format!("  {}\n", id));
            }
        }
        if !self.incomplete_constraints.is_empty() {
            out.push_str("\nIncomplete constraints:\n");
            for gap in &self.incomplete_constraints {
                let detail = if !gap.covered {
                    "UNCOVERED".to_string()
                } else {
                    let missing: Vec<&str> = gap
                        .missing
                        .iter()
                        .map(|class| match class {
                            ValueClass::Valid => "valid",
                            ValueClass::Invalid => "invalid",
                            ValueClass::Undetermined => "undetermined",
                        })
                        .collect();
                    format!("missing {}", missing.join(", "))
                };
                out.push_str(&format!("  {} [{}]: {}\n", gap.constraint_id, gap.kind, detail));
            }
        }
        if !self.unrepresented_combinations.is_empty() {
            out.push_str("\nUnrepresented combinations:\n");
            for stub in &self.unrepresented_combinations {
                let values: Vec<String> = stub
                    .assignments
                    .iter()
                    .map(|a| format!("{}={}", a.field, a.value))
                    .collect();
                out.push_str(&format!("  {}: {}\n", stub.component_id, values.join(", ")));
            }
        }
        if !self.orphan_references.is_empty() {
            out.push_str("\nOrphan references:\n");
            for orphan in &self.orphan_references {
                out.push_str(&format!("  {} ← {}\n", orphan.id, orphan.case_ids.join(", ")));
            }
        }
        if !self.recommendations.is_empty() {
            out.push_str("\nRecommendations:\n");
            for rec in &self.recommendations {
                out.push_str(&format!("  → {}\n", rec));
            }
        }

        out
    }
}

/// Build the gap report
pub fn build_gap_report(
    matrices: &CoverageMatrices,
    combinations: &[ComponentCombinations],
    threshold: f64,
) -> GapReport {
    let uncovered_requirements: Vec<String> = matrices
        .uncovered_requirements()
        .into_iter()
        .map(str::to_string)
        .collect();
    let uncovered_components: Vec<String> = matrices
        .uncovered_components()
        .into_iter()
        .map(str::to_string)
        .collect();
    let incomplete_constraints: Vec<ConstraintGap> = matrices
        .incomplete_constraints()
        .map(|(id, coverage)| ConstraintGap {
            constraint_id: id.to_string(),
            kind: coverage.kind,
            covered: coverage.is_covered(),
            missing: coverage.missing_classes(),
        })
        .collect();
    let unrepresented_combinations: Vec<CombinationStub> = combinations
        .iter()
        .flat_map(|plan| {
            plan.unrepresented().map(|combination| CombinationStub {
                component_id: plan.component_id.clone(),
                scope: plan.scope.clone(),
                assignments: combination.assignments.clone(),
            })
        })
        .collect();
    let orphan_references: Vec<OrphanReference> = matrices
        .orphans
        .iter()
        .map(|(id, cases)| OrphanReference {
            id: id.clone(),
            case_ids: cases.iter().cloned().collect(),
        })
        .collect();

    let requirements = FamilySummary::new(
        matrices.requirements.len(),
        matrices.requirements.len() - uncovered_requirements.len(),
    );
    let summary = CoverageSummary {
        requirements,
        components: FamilySummary::new(
            matrices.components.len(),
            matrices.components.len() - uncovered_components.len(),
        ),
        constraints: FamilySummary::new(
            matrices.constraints.len(),
            matrices.constraints.len() - incomplete_constraints.len(),
        ),
        threshold,
        meets_threshold: requirements.ratio >= threshold,
    };

    let mut recommendations = Vec::new();
    for id in &uncovered_requirements {
        recommendations.push(format!("Add a test case for requirement {}", id));
    }
    for id in &uncovered_components {
        recommendations.push(format!("Add a test case exercising component {}", id));
    }
    for gap in &incomplete_constraints {
        if !gap.covered && gap.missing.is_empty() {
            recommendations.push(format!(
                "Add a test case for constraint {} ({})",
                gap.constraint_id, gap.kind
            ));
        }
        for class in &gap.missing {
            match class {
                ValueClass::Valid => recommendations.push(format!(
                    "Add a valid-value case for constraint {}",
                    gap.constraint_id
                )),
                ValueClass::Invalid => recommendations.push(format!(
                    "Add an invalid-value or boundary case for constraint {}",
                    gap.constraint_id
                )),
                ValueClass::Undetermined => {}
            }
        }
    }
    let stub_count = unrepresented_combinations.len();
    if stub_count > 0 {
        recommendations.push(format!(
            "Add cases for {} unrepresented parameter combination(s)",
            stub_count
        ));
    }
    for orphan in &orphan_references {
        recommendations.push(format!(
            "Review {} case(s) referencing unknown id {}",
            orphan.case_ids.len(),
            orphan.id
        ));
    }

    GapReport {
        uncovered_requirements,
        uncovered_components,
        incomplete_constraints,
        unrepresented_combinations,
        orphan_references,
        summary,
        recommendations,
    }
}
