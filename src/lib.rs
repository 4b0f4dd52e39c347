// Production-quality lints
#![warn(
    clippy::todo,
    clippy::unimplemented,
    clippy::dbg_macro,
    clippy::print_stdout,
    clippy::print_stderr
)]
// Deny truly dangerous patterns
#![deny(clippy::mem_forget)]
// Allow common patterns in library code
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! # tcgen — test-case generation from UI and API descriptions
//!
//! Fuses free-text requirements, design-tool component trees, API schemas
//! and vision observations into one domain model, asks a suggestion source
//! for candidate test cases per screen or endpoint, merges near-duplicates
//! and reports what is still untested.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use tcgen::{run_pipeline, GeneratorConfig, RuleBasedSource, RunContext, SourceInput};
//! use tokio_util::sync::CancellationToken;
//!
//! let inputs = vec![SourceInput::RequirementText {
//!     id: "reqs".into(),
//!     text: "REQ-1: Users must be able to log in".into(),
//! }];
//! let output = run_pipeline(
//!     &GeneratorConfig::default(),
//!     &inputs,
//!     &RunContext::default(),
//!     Arc::new(RuleBasedSource),
//!     &CancellationToken::new(),
//! )
//! .await?;
//! println!("{}", output.gaps.to_report());
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                                                             │
//! │  SOURCES (text, component tree, API schema, observations)   │
//! │       │                                                     │
//! │       └──► build_model ──► DomainModel                      │
//! │                                │                            │
//! │                                ▼                            │
//! │  generate(model, SuggestionSource) ──► TestCase[]           │
//! │                                │                            │
//! │                                ▼                            │
//! │  deduplicate ──► analyze_coverage ──► CoverageMatrices      │
//! │            └───► plan_combinations + reconcile              │
//! │                                │                            │
//! │                                ▼                            │
//! │                      build_gap_report ──► GapReport         │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Failures local to one source or one work unit never abort a run; they
//! are collected as [`Diagnostic`]s next to the best-effort output.

// Core
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod model;
pub mod util;

// Stages
pub mod coverage;
pub mod dedup;
pub mod gaps;
pub mod generate;
pub mod normalize;
pub mod pairwise;
pub mod suggest;
pub mod templates;

// Wiring
pub mod export;
pub mod pipeline;

// Re-exports
pub use config::{DedupConfig, GeneratorConfig, PairwiseConfig, RetryPolicy};
pub use coverage::{analyze_coverage, classify_case, ConstraintCoverage, CoverageMatrices, ValueClass};
pub use dedup::{deduplicate, merge_cases, DedupOutcome, MergeRecord};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::{Error, Result, SuggestionError};
pub use export::{ExportSink, JsonSink, TextSink};
pub use gaps::{build_gap_report, CombinationStub, ConstraintGap, GapReport};
pub use generate::{generate, ContextBundle, GenerationOutput, RunContext, UnitReport, UnitStatus};
pub use model::{
    CasePriority, Component, ComponentType, Constraint, ConstraintKind, Covers, DomainModel, Flow,
    Requirement, RequirementPriority, SourceKind, TestCase, TestType,
};
pub use normalize::{build_model, normalize, Normalized, SourceInput};
pub use pairwise::{covering_rows, plan_combinations, reconcile, ComponentCombinations};
pub use pipeline::{run_pipeline, Manifest, RunOutput, SourceEntry};
pub use suggest::{CandidateRecord, ReplaySource, RuleBasedSource, SuggestionRequest, SuggestionSource};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
