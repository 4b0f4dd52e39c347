//! Generator configuration
//!
//! One explicit, immutable value passed into every stage. Nothing in the
//! library reads process-wide state; the binary loads this from YAML.
//!
//! ```yaml
//! dedup:
//!   similarity_threshold: 0.8
//! pairwise:
//!   components:
//!     theme-toggle: false
//! workers: 4
//! retry:
//!   max_attempts: 3
//!   base_delay_ms: 500
//! ```

use crate::error::{Error, Result};
use crate::model::TestType;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

/// Upper bound on the worker pool
pub const MAX_WORKERS: usize = 64;

/// Root configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratorConfig {
    /// Near-duplicate merging
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Pairwise parameter coverage
    #[serde(default)]
    pub pairwise: PairwiseConfig,

    /// Concurrent suggestion-source calls
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Backoff for transient suggestion-source failures
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Test types requested from the suggestion source
    #[serde(default = "default_test_types")]
    pub test_types: Vec<TestType>,

    /// Requirement coverage ratio considered acceptable (0..=1)
    #[serde(default = "default_coverage_threshold")]
    pub coverage_threshold: f64,

    /// Largest value-combination product scored exhaustively by the
    /// pairwise generator
    #[serde(default = "default_max_exhaustive_rows")]
    pub max_exhaustive_rows: usize,
}

fn default_workers() -> usize {
    4
}

fn default_test_types() -> Vec<TestType> {
    vec![
        TestType::Func,
        TestType::Bound,
        TestType::Neg,
        TestType::Perm,
        TestType::Sec,
        TestType::Perf,
    ]
}

fn default_coverage_threshold() -> f64 {
    0.8
}

fn default_max_exhaustive_rows() -> usize {
    4096
}

fn default_true() -> bool {
    true
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dedup: DedupConfig::default(),
            pairwise: PairwiseConfig::default(),
            workers: default_workers(),
            retry: RetryPolicy::default(),
            test_types: default_test_types(),
            coverage_threshold: default_coverage_threshold(),
            max_exhaustive_rows: default_max_exhaustive_rows(),
        }
    }
}

/// Deduplication settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DedupConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Minimum title similarity (0..=1) for two same-type cases to merge
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

fn default_similarity_threshold() -> f64 {
    0.8
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

/// Pairwise generation settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PairwiseConfig {
    /// Default for components without an override
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-component overrides (component id -> enabled)
    #[serde(default)]
    pub components: BTreeMap<String, bool>,
}

impl Default for PairwiseConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            components: BTreeMap::new(),
        }
    }
}

impl PairwiseConfig {
    pub fn is_enabled_for(&self, component_id: &str) -> bool {
        self.components
            .get(component_id)
            .copied()
            .unwrap_or(self.enabled)
    }
}

/// Bounded exponential backoff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicy {
    /// Total attempts per unit, including the first call
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    10_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Wait before retrying after failed attempt number `attempt` (0-based)
    ///
    /// A source-supplied hint wins; otherwise `base * 2^attempt`, capped.
    pub fn delay_for(&self, attempt: u32, hint_ms: Option<u64>) -> Duration {
        let ms = match hint_ms {
            Some(ms) => ms,
            None => {
                let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
                self.base_delay_ms.saturating_mul(factor)
            }
        };
        Duration::from_millis(ms.min(self.max_delay_ms))
    }
}

impl GeneratorConfig {
    /// Parse from YAML
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: GeneratorConfig = serde_norway::from_str(yaml)
            .map_err(|e| Error::Config(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a YAML config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        Self::from_yaml(&content)
    }

    /// Reject out-of-range values
    pub fn validate(&self) -> Result<()> {
        let threshold = self.dedup.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Config(format!(
                "dedup.similarity_threshold must be in (0, 1], got {}",
                threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.coverage_threshold) {
            return Err(Error::Config(format!(
                "coverage_threshold must be in [0, 1], got {}",
                self.coverage_threshold
            )));
        }
        if self.workers == 0 || self.workers > MAX_WORKERS {
            return Err(Error::Config(format!(
                "workers must be between 1 and {}, got {}",
                MAX_WORKERS, self.workers
            )));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".into()));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(Error::Config(format!(
                "retry.base_delay_ms ({}) exceeds retry.max_delay_ms ({})",
                self.retry.base_delay_ms, self.retry.max_delay_ms
            )));
        }
        if self.test_types.is_empty() {
            return Err(Error::Config("test_types must not be empty".into()));
        }
        if self.max_exhaustive_rows == 0 {
            return Err(Error::Config("max_exhaustive_rows must be positive".into()));
        }
        Ok(())
    }
}
