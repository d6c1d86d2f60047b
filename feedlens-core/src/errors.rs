//! Error types for Feedlens

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, FeedbackError>;

#[derive(Error, Debug)]
pub enum FeedbackError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Invalid column mapping: column '{0}' does not exist")]
    InvalidMapping(String),

    #[error("Batch {batch} classification failed ({kind}): {message}")]
    BatchClassification {
        batch: usize,
        kind: FailureKind,
        message: String,
    },

    #[error("Summarization failed: {0}")]
    Summarization(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("LLM API error: {0}")]
    LlmApi(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Analysis run {0} was reset before it completed")]
    RunReset(u64),
}

impl FeedbackError {
    /// Errors that abort a run before any state is kept.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            FeedbackError::Input(_) | FeedbackError::InvalidMapping(_) | FeedbackError::Csv(_)
        )
    }

    /// Capacity/availability vs. everything else, judged from the rendered message.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            FeedbackError::BatchClassification { kind, .. } => *kind,
            FeedbackError::Http(e) => match e.status().map(|s| s.as_u16()) {
                Some(429) | Some(503) => FailureKind::Capacity,
                _ => FailureKind::classify(&e.to_string()),
            },
            other => FailureKind::classify(&other.to_string()),
        }
    }
}

impl From<config::ConfigError> for FeedbackError {
    fn from(err: config::ConfigError) -> Self {
        FeedbackError::Configuration(err.to_string())
    }
}

/// Whether a remote failure looks like rate limiting / unavailability or something else.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Capacity,
    Other,
}

const CAPACITY_MARKERS: &[&str] = &[
    "429",
    "quota",
    "503",
    "service unavailable",
    "overloaded",
    "rate limit",
];

impl FailureKind {
    pub fn classify(message: &str) -> Self {
        let lowered = message.to_lowercase();
        if CAPACITY_MARKERS.iter().any(|m| lowered.contains(m)) {
            FailureKind::Capacity
        } else {
            FailureKind::Other
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::Capacity => write!(f, "capacity"),
            FailureKind::Other => write!(f, "other"),
        }
    }
}
