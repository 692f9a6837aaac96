//! Error types for annobin

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, resampling or merging series
#[derive(Debug, Error)]
pub enum BinarizeError {
    #[error("No valid intervals for tier '{tier}' (tier absent or all end times missing)")]
    MissingTier { tier: String },

    #[error("Subject '{subject}' has no matching {missing} input")]
    MissingPair { subject: String, missing: String },

    #[error("Malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },

    #[error("Interval out of range: {reason}")]
    InvalidInterval { reason: String },

    #[error("File name '{stem}' does not end with the expected suffix '{suffix}'")]
    UnmatchedFilename { stem: String, suffix: String },

    #[error("Subject '{subject}' is already provided by {existing}")]
    DuplicateSubject { subject: String, existing: PathBuf },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl BinarizeError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        BinarizeError::Io {
            path: path.into(),
            source,
        }
    }

    /// Short machine-readable code, used in reports and CLI output
    pub fn code(&self) -> &'static str {
        match self {
            BinarizeError::MissingTier { .. } => "MISSING_TIER",
            BinarizeError::MissingPair { .. } => "MISSING_PAIR",
            BinarizeError::MalformedRow { .. } => "MALFORMED_ROW",
            BinarizeError::InvalidInterval { .. } => "INVALID_INTERVAL",
            BinarizeError::UnmatchedFilename { .. } => "UNMATCHED_FILENAME",
            BinarizeError::DuplicateSubject { .. } => "DUPLICATE_SUBJECT",
            BinarizeError::InvalidConfig(_) => "INVALID_CONFIG",
            BinarizeError::Io { .. } => "IO_ERROR",
            BinarizeError::Csv(_) => "CSV_ERROR",
            BinarizeError::Json(_) => "JSON_ERROR",
        }
    }
}
