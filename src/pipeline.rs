//! End-to-end run
//!
//! ```text
//! sources ──► build_model ──► generate ──► deduplicate ──┬─► analyze_coverage ──┐
//!                                                       └─► pairwise + reconcile ┴─► gap report
//! ```
//!
//! A [`Manifest`] describes one run on disk: the sources (by path or
//! inline), the additional context, and optionally a config file and a
//! replay file answering suggestion requests.

use crate::config::GeneratorConfig;
use crate::coverage::{analyze_coverage, CoverageMatrices};
use crate::dedup::{deduplicate, MergeRecord};
use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::error::{Error, Result};
use crate::gaps::{build_gap_report, GapReport};
use crate::generate::{generate, RunContext, UnitReport};
use crate::model::{DomainModel, SourceKind, TestCase};
use crate::normalize::{build_model, SourceInput};
use crate::pairwise::{plan_combinations, reconcile, ComponentCombinations};
use crate::suggest::{CandidateRecord, SuggestionSource};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything a run produces
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RunOutput {
    pub model: DomainModel,
    /// Deduplicated cases, in generation order
    pub cases: Vec<TestCase>,
    pub merges: Vec<MergeRecord>,
    pub coverage: CoverageMatrices,
    pub combinations: Vec<ComponentCombinations>,
    pub gaps: GapReport,
    pub units: Vec<UnitReport>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run every stage over the given sources
///
/// Source and unit failures end up in `diagnostics`. Only cancellation, an
/// invalid config and a coverage invariant violation fail the run; a
/// cancelled run returns nothing.
pub async fn run_pipeline(
    config: &GeneratorConfig,
    inputs: &[SourceInput],
    context: &RunContext,
    source: Arc<dyn SuggestionSource>,
    cancel: &CancellationToken,
) -> Result<RunOutput> {
    config.validate()?;

    let normalized = build_model(inputs);
    let mut diagnostics = normalized.diagnostics;
    let model = normalized.model;

    let generated = generate(
        config,
        &model,
        &normalized.observations,
        context,
        source,
        cancel,
    )
    .await?;
    diagnostics.extend(generated.diagnostics);

    let deduped = deduplicate(&generated.cases, &config.dedup);
    let coverage = analyze_coverage(&model, &deduped.cases)?;
    let plans = plan_combinations(&model, config);
    let combinations = reconcile(&plans, &deduped.cases);
    let gaps = build_gap_report(&coverage, &combinations, config.coverage_threshold);

    tracing::info!(
        cases = deduped.cases.len(),
        merged = deduped.merges.len(),
        uncovered_requirements = gaps.uncovered_requirements.len(),
        diagnostics = diagnostics.len(),
        "run finished"
    );

    Ok(RunOutput {
        model,
        cases: deduped.cases,
        merges: deduped.merges,
        coverage,
        combinations,
        gaps,
        units: generated.units,
        diagnostics,
    })
}

// ============================================================================
// Manifest
// ============================================================================

/// One source listed in a manifest
///
/// Content comes from `path` (relative to the manifest) or from `inline`:
/// text for requirement and observation sources, a document for component
/// trees and API schemas. Observations may also be given inline as a list
/// of records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceEntry {
    pub id: String,
    pub kind: SourceKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline: Option<Value>,
    /// Scope of vision observations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

impl SourceEntry {
    /// Read the entry's content into a [`SourceInput`]
    pub fn resolve(&self, base_dir: &Path) -> Result<SourceInput> {
        let id = self.id.clone();
        let content = match (&self.path, &self.inline) {
            (Some(path), _) => {
                let full = base_dir.join(path);
                let text = std::fs::read_to_string(&full).map_err(|e| {
                    Error::source_parse(&id, full.display().to_string(), e.to_string())
                })?;
                RawContent::File { path: full, text }
            }
            (None, Some(value)) => RawContent::Inline(value.clone()),
            (None, None) => {
                return Err(Error::source_parse(
                    &id,
                    "manifest",
                    "source needs either `path` or `inline`",
                ))
            }
        };

        match self.kind {
            SourceKind::RequirementText => Ok(SourceInput::RequirementText {
                text: content.into_text(&id)?,
                id,
            }),
            SourceKind::ComponentTree => Ok(SourceInput::ComponentTree {
                root: content.into_document(&id)?,
                id,
            }),
            SourceKind::ApiSchema => Ok(SourceInput::ApiSchema {
                document: content.into_document(&id)?,
                id,
            }),
            SourceKind::VisionObservations => {
                let scope = self.scope.clone();
                match content {
                    RawContent::Inline(Value::Array(items)) => {
                        let records: Vec<CandidateRecord> =
                            serde_json::from_value(Value::Array(items)).map_err(|e| {
                                Error::source_parse(&id, "inline", e.to_string())
                            })?;
                        Ok(SourceInput::VisionObservations {
                            id,
                            scope,
                            records,
                            text: None,
                        })
                    }
                    other => Ok(SourceInput::VisionObservations {
                        text: Some(other.into_text(&id)?),
                        id,
                        scope,
                        records: Vec::new(),
                    }),
                }
            }
        }
    }
}

enum RawContent {
    File { path: PathBuf, text: String },
    Inline(Value),
}

impl RawContent {
    fn into_text(self, id: &str) -> Result<String> {
        match self {
            RawContent::File { text, .. } => Ok(text),
            RawContent::Inline(Value::String(text)) => Ok(text),
            RawContent::Inline(_) => Err(Error::source_parse(id, "inline", "expected text")),
        }
    }

    fn into_document(self, id: &str) -> Result<Value> {
        match self {
            RawContent::File { path, text } => {
                let is_json = path
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case("json"));
                if is_json {
                    serde_json::from_str(&text)
                        .map_err(|e| Error::source_parse(id, path.display().to_string(), e.to_string()))
                } else {
                    serde_norway::from_str(&text)
                        .map_err(|e| Error::source_parse(id, path.display().to_string(), e.to_string()))
                }
            }
            RawContent::Inline(value) => Ok(value),
        }
    }
}

/// A run described on disk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Manifest {
    #[serde(default)]
    pub sources: Vec<SourceEntry>,
    #[serde(default)]
    pub context: RunContext,
    /// Generator config file, relative to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<PathBuf>,
    /// Replay file answering suggestion requests, relative to the manifest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub replay: Option<PathBuf>,
    /// Directory relative paths resolve against
    #[serde(skip)]
    #[schemars(skip)]
    pub base_dir: PathBuf,
}

impl Manifest {
    pub fn from_yaml(yaml: &str, base_dir: &Path) -> Result<Self> {
        let mut manifest: Manifest = serde_norway::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse manifest: {}", e)))?;
        manifest.base_dir = base_dir.to_path_buf();
        Ok(manifest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::from_yaml(&content, base_dir)
    }

    /// Resolve a manifest-relative path
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        self.base_dir.join(path)
    }

    /// Read every source; unreadable ones become diagnostics
    pub fn load_sources(&self) -> (Vec<SourceInput>, Vec<Diagnostic>) {
        let mut inputs = Vec::new();
        let mut diagnostics = Vec::new();
        for entry in &self.sources {
            match entry.resolve(&self.base_dir) {
                Ok(input) => inputs.push(input),
                Err(err) => {
                    tracing::warn!(source = %entry.id, error = %err, "source not loaded");
                    let diagnostic = match err {
                        Error::SourceParse {
                            source_id,
                            item,
                            message,
                        } => Diagnostic::new(DiagnosticKind::SourceParseFailed, message)
                            .in_scope(source_id)
                            .about(item),
                        other => Diagnostic::new(DiagnosticKind::SourceParseFailed, other.to_string())
                            .in_scope(entry.id.clone()),
                    };
                    diagnostics.push(diagnostic);
                }
            }
        }
        (inputs, diagnostics)
    }
}
