//! Batch configuration
//!
//! A [`PipelineConfig`] names the directories, tiers, activation labels and
//! file-name suffixes of every stage. Defaults reproduce the standard batch:
//! `R`, `RA` and `LA` tiers resampled from one export folder, `RA`/`LA`
//! merged, and the merged series reduced against `R`.

use crate::error::BinarizeError;
use crate::grid::DEFAULT_BIN_WIDTH_MS;
use crate::resampler::{ActivationRule, OverlapPolicy};
use crate::schema::ColumnLayout;
use crate::subject::{KeyPolicy, SuffixConvention};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default export folder
pub const DEFAULT_EXPORT_DIR: &str = "NEUR490_TXT";

/// Extension of annotation exports
pub const EXPORT_EXTENSION: &str = "txt";

/// Resampling of one tier from every export in `input_dir`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResampleStageConfig {
    /// Stage name used in reports
    pub name: String,
    /// Tier to extract (exact match)
    pub tier: String,
    /// Labels that mark a bin active
    pub labels: Vec<String>,
    #[serde(default)]
    pub layout: ColumnLayout,
    pub input_dir: PathBuf,
    pub output_dir: PathBuf,
    /// Appended to the export's stem to name the output
    pub output_suffix: String,
}

impl ResampleStageConfig {
    pub fn new(
        tier: &str,
        labels: &[&str],
        input_dir: impl Into<PathBuf>,
        output_dir: impl Into<PathBuf>,
        output_suffix: &str,
    ) -> Self {
        Self {
            name: tier.to_string(),
            tier: tier.to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            layout: ColumnLayout::Auto,
            input_dir: input_dir.into(),
            output_dir: output_dir.into(),
            output_suffix: output_suffix.to_string(),
        }
    }

    pub fn activation_rule(&self) -> ActivationRule {
        ActivationRule::any_of(&self.labels)
    }
}

/// One named input channel of a two-input stage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelConfig {
    /// Short name, also the provenance tag of the merger
    pub name: String,
    pub dir: PathBuf,
    /// File-name suffix stripped to recover the subject key
    pub suffix: String,
    #[serde(default)]
    pub ignore_case: bool,
}

impl ChannelConfig {
    pub fn new(name: &str, dir: impl Into<PathBuf>, suffix: &str) -> Self {
        Self {
            name: name.to_string(),
            dir: dir.into(),
            suffix: suffix.to_string(),
            ignore_case: false,
        }
    }

    pub fn convention(&self) -> SuffixConvention {
        SuffixConvention {
            suffix: self.suffix.clone(),
            ignore_case: self.ignore_case,
        }
    }
}

/// OR-merge of two channels
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeStageConfig {
    pub primary: ChannelConfig,
    pub secondary: ChannelConfig,
    pub output_dir: PathBuf,
    pub output_suffix: String,
}

/// AND-reduction of a merged channel against a reference channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConjunctionStageConfig {
    pub merged: ChannelConfig,
    pub reference: ChannelConfig,
    pub output_dir: PathBuf,
    pub output_suffix: String,
}

/// Configuration of a whole batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub bin_width_ms: i64,
    pub overlap_policy: OverlapPolicy,
    pub key_policy: KeyPolicy,
    /// Directory depth scanned for inputs (1 = flat folder)
    pub search_depth: usize,
    pub resample: Vec<ResampleStageConfig>,
    pub merge: Option<MergeStageConfig>,
    pub conjunction: Option<ConjunctionStageConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            bin_width_ms: DEFAULT_BIN_WIDTH_MS,
            overlap_policy: OverlapPolicy::LastWins,
            key_policy: KeyPolicy::Lenient,
            search_depth: 2,
            resample: vec![
                ResampleStageConfig::new("R", &["P"], DEFAULT_EXPORT_DIR, "NEUR490_R_CSV", "_binary"),
                ResampleStageConfig::new(
                    "RA",
                    &["MDG", "MDT"],
                    DEFAULT_EXPORT_DIR,
                    "NEUR490_RA_CSV",
                    "_RA_binary",
                ),
                ResampleStageConfig::new(
                    "LA",
                    &["MDG", "MDT"],
                    DEFAULT_EXPORT_DIR,
                    "NEUR490_LA_CSV",
                    "_LA_binary",
                ),
            ],
            merge: Some(MergeStageConfig {
                primary: ChannelConfig {
                    ignore_case: true,
                    ..ChannelConfig::new("RA", "NEUR490_RA_CSV", "_RA_binary")
                },
                secondary: ChannelConfig {
                    ignore_case: true,
                    ..ChannelConfig::new("LA", "NEUR490_LA_CSV", "_LA_binary")
                },
                output_dir: PathBuf::from("NEUR490_MERGED_CSV"),
                output_suffix: "_MERGED".to_string(),
            }),
            conjunction: Some(ConjunctionStageConfig {
                merged: ChannelConfig::new("MERGED", "NEUR490_MERGED_CSV", "_RE_MERGED"),
                reference: ChannelConfig::new("R", "NEUR490_R_CSV", "_RE_binary"),
                output_dir: PathBuf::from("NEUR490_FINAL_MERGED"),
                output_suffix: "_FINAL_MERGED".to_string(),
            }),
        }
    }
}

impl PipelineConfig {
    /// Parse a configuration from JSON; missing fields take their defaults
    pub fn from_json(json: &str) -> Result<Self, BinarizeError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self, BinarizeError> {
        let json = fs::read_to_string(path).map_err(|e| BinarizeError::io(path, e))?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, BinarizeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Resolve every relative directory against `root`
    pub fn rooted_at(mut self, root: &Path) -> Self {
        let join = |dir: &mut PathBuf| {
            if dir.is_relative() {
                *dir = root.join(&*dir);
            }
        };
        for stage in &mut self.resample {
            join(&mut stage.input_dir);
            join(&mut stage.output_dir);
        }
        if let Some(merge) = &mut self.merge {
            join(&mut merge.primary.dir);
            join(&mut merge.secondary.dir);
            join(&mut merge.output_dir);
        }
        if let Some(conjunction) = &mut self.conjunction {
            join(&mut conjunction.merged.dir);
            join(&mut conjunction.reference.dir);
            join(&mut conjunction.output_dir);
        }
        self
    }

    /// Check the configuration before any stage runs
    pub fn validate(&self) -> Result<(), BinarizeError> {
        if self.bin_width_ms <= 0 {
            return Err(BinarizeError::InvalidConfig(format!(
                "bin_width_ms must be positive, got {}",
                self.bin_width_ms
            )));
        }
        if self.search_depth == 0 {
            return Err(BinarizeError::InvalidConfig(
                "search_depth must be at least 1".to_string(),
            ));
        }

        let mut names = HashSet::new();
        for stage in &self.resample {
            if !names.insert(stage.name.as_str()) {
                return Err(BinarizeError::InvalidConfig(format!(
                    "duplicate resample stage '{}'",
                    stage.name
                )));
            }
            if stage.tier.is_empty() {
                return Err(BinarizeError::InvalidConfig(format!(
                    "stage '{}' has an empty tier",
                    stage.name
                )));
            }
            if stage.activation_rule().is_empty() {
                return Err(BinarizeError::InvalidConfig(format!(
                    "stage '{}' has no activation labels",
                    stage.name
                )));
            }
        }

        if let Some(merge) = &self.merge {
            if merge.primary.name == merge.secondary.name {
                return Err(BinarizeError::InvalidConfig(format!(
                    "merge channels must have distinct names, both are '{}'",
                    merge.primary.name
                )));
            }
            for reserved in [crate::types::PROVENANCE_NONE, crate::types::PROVENANCE_BOTH] {
                if merge.primary.name == reserved || merge.secondary.name == reserved {
                    return Err(BinarizeError::InvalidConfig(format!(
                        "'{}' is reserved as a provenance tag",
                        reserved
                    )));
                }
            }
        }

        Ok(())
    }
}
