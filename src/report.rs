//! Batch run reports

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::BinarizeError;

/// Kind of pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Resample,
    Merge,
    Conjunction,
}

/// An input (file or subject) the stage did not produce output for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedInput {
    /// File path or subject key
    pub input: String,
    /// Error code, see [`BinarizeError::code`]
    pub code: String,
    pub reason: String,
}

impl SkippedInput {
    pub fn new(input: impl Into<String>, error: &BinarizeError) -> Self {
        Self {
            input: input.into(),
            code: error.code().to_string(),
            reason: error.to_string(),
        }
    }
}

/// Outcome of one stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReport {
    pub stage: String,
    pub kind: StageKind,
    pub written: Vec<PathBuf>,
    pub skipped: Vec<SkippedInput>,
}

impl StageReport {
    pub fn new(stage: impl Into<String>, kind: StageKind) -> Self {
        Self {
            stage: stage.into(),
            kind,
            written: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Number of outputs written
    pub fn processed(&self) -> usize {
        self.written.len()
    }

    pub fn skip(&mut self, input: impl Into<String>, error: &BinarizeError) {
        self.skipped.push(SkippedInput::new(input, error));
    }
}

/// Outcome of a whole batch run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
    pub total_processed: usize,
    pub total_skipped: usize,
}

impl BatchReport {
    pub fn new(run_id: String, started_at: DateTime<Utc>, stages: Vec<StageReport>) -> Self {
        let total_processed = stages.iter().map(StageReport::processed).sum();
        let total_skipped = stages.iter().map(|s| s.skipped.len()).sum();
        Self {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages,
            total_processed,
            total_skipped,
        }
    }

    /// One-line summary
    pub fn summary(&self) -> String {
        format!(
            "{} stages, {} files processed, {} skipped",
            self.stages.len(),
            self.total_processed,
            self.total_skipped
        )
    }
}
