//! Near-duplicate merging
//!
//! Within one scope, candidates are visited highest priority first (stable
//! by generation order). A candidate that duplicates an already-kept case
//! is dropped and its `covers` is unioned into the kept case, so coverage
//! is never lost.
//!
//! Two cases are duplicates only when they share a test type and their
//! titles score at or above the configured similarity threshold.

use crate::config::DedupConfig;
use crate::model::TestCase;
use crate::util::title_similarity;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One merge performed by the deduplicator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MergeRecord {
    pub kept_id: String,
    pub dropped_id: String,
    pub similarity: f64,
}

/// Reduced case set plus the merges that produced it
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DedupOutcome {
    /// Kept cases, in generation order
    pub cases: Vec<TestCase>,
    pub merges: Vec<MergeRecord>,
}

/// Similarity of two cases when they count as duplicates
pub fn duplicate_score(a: &TestCase, b: &TestCase, threshold: f64) -> Option<f64> {
    if a.test_type != b.test_type || a.scope != b.scope {
        return None;
    }
    let score = title_similarity(&a.title, &b.title);
    (score >= threshold).then_some(score)
}

/// Fold `dropped` into `kept`, producing a new record
pub fn merge_cases(kept: &TestCase, dropped: &TestCase) -> TestCase {
    TestCase {
        priority: kept.priority.min(dropped.priority),
        covers: kept.covers.union(&dropped.covers),
        ..kept.clone()
    }
}

/// Remove near-duplicates from a run's case set
pub fn deduplicate(cases: &[TestCase], config: &DedupConfig) -> DedupOutcome {
    if !config.enabled {
        return DedupOutcome {
            cases: cases.to_vec(),
            merges: Vec::new(),
        };
    }

    let mut scopes: Vec<&str> = Vec::new();
    for case in cases {
        if !scopes.contains(&case.scope.as_str()) {
            scopes.push(&case.scope);
        }
    }

    // (generation position, merged case)
    let mut kept: Vec<(usize, TestCase)> = Vec::new();
    let mut merges = Vec::new();

    for scope in scopes {
        let mut order: Vec<usize> = (0..cases.len())
            .filter(|&i| cases[i].scope == scope)
            .collect();
        order.sort_by_key(|&i| cases[i].priority);

        let first_kept = kept.len();
        for position in order {
            let candidate = &cases[position];
            let best = kept[first_kept..]
                .iter()
                .enumerate()
                .filter_map(|(slot, (_, case))| {
                    duplicate_score(case, candidate, config.similarity_threshold)
                        .map(|score| (slot, score))
                })
                .fold(None::<(usize, f64)>, |best, (slot, score)| match best {
                    Some((_, best_score)) if best_score >= score => best,
                    _ => Some((slot, score)),
                });

            match best {
                Some((slot, similarity)) => {
                    let index = first_kept + slot;
                    let (position_kept, existing) = &kept[index];
                    let position_kept = *position_kept;
                    tracing::debug!(
                        kept = %existing.id,
                        dropped = %candidate.id,
                        similarity,
                        "merged duplicate case"
                    );
                    merges.push(MergeRecord {
                        kept_id: existing.id.clone(),
                        dropped_id: candidate.id.clone(),
                        similarity,
                    });
                    let merged = merge_cases(existing, candidate);
                    kept[index] = (position_kept, merged);
                }
                None => kept.push((position, candidate.clone())),
            }
        }
    }

    kept.sort_by_key(|(position, _)| *position);
    tracing::info!(
        input = cases.len(),
        kept = kept.len(),
        merged = merges.len(),
        "deduplication finished"
    );
    DedupOutcome {
        cases: kept.into_iter().map(|(_, case)| case).collect(),
        merges,
    }
}
