//! Error types for tcgen

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// tcgen errors
#[derive(Error, Debug)]
pub enum Error {
    /// Structurally unreadable parser output. Local to one source.
    #[error("Source parse error in '{source_id}' at {item}: {message}")]
    SourceParse {
        source_id: String,
        item: String,
        message: String,
    },

    #[error("Suggestion source error: {0}")]
    Suggestion(#[from] SuggestionError),

    /// An upstream invariant was broken; aborts the run.
    #[error("Coverage computation error: {0}")]
    CoverageComputation(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Template error: {0}")]
    Template(#[from] minijinja::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_norway::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn source_parse(
        source_id: impl Into<String>,
        item: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Error::SourceParse {
            source_id: source_id.into(),
            item: item.into(),
            message: message.into(),
        }
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Other(s.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Other(s)
    }
}

/// Failure reported by a suggestion source.
///
/// Transient failures (timeouts, rate limits, network) are retried with
/// backoff; terminal failures empty the unit's candidate list.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SuggestionError {
    #[error("transient: {message}")]
    Transient {
        message: String,
        retry_after_ms: Option<u64>,
    },

    #[error("terminal: {message}")]
    Terminal { message: String },
}

impl SuggestionError {
    pub fn transient(message: impl Into<String>) -> Self {
        SuggestionError::Transient {
            message: message.into(),
            retry_after_ms: None,
        }
    }

    pub fn terminal(message: impl Into<String>) -> Self {
        SuggestionError::Terminal {
            message: message.into(),
        }
    }

    /// Whether the call should be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, SuggestionError::Transient { .. })
    }

    /// Suggested wait before the next attempt, when the source supplied one.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            SuggestionError::Transient { retry_after_ms, .. } => *retry_after_ms,
            SuggestionError::Terminal { .. } => None,
        }
    }
}
