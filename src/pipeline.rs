//! Pipeline orchestration
//!
//! This module provides the batch API of annobin. Each stage reads every
//! matching file of its input directories and writes one file per input (or
//! per subject) into its output directory:
//! 1. Resample - annotation exports → binary series, one stage per tier
//! 2. Merge - two channel series → merged series with provenance
//! 3. Conjunction - merged series ∧ reference series → final series
//!
//! A failure on one file is logged and recorded in the stage report; the
//! batch carries on with the next file.

use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;
use walkdir::WalkDir;

use crate::config::{
    ChannelConfig, ConjunctionStageConfig, MergeStageConfig, PipelineConfig, ResampleStageConfig,
    EXPORT_EXTENSION,
};
use crate::error::BinarizeError;
use crate::merger::ChannelMerger;
use crate::reducer::ConjunctionReducer;
use crate::report::{BatchReport, StageKind, StageReport};
use crate::resampler::GridResampler;
use crate::schema::{AnnotationAdapter, ColumnLayout};
use crate::storage::{self, SERIES_EXTENSION};
use crate::subject::{file_stem, SubjectIndex, SubjectKey, SuffixConvention};
use crate::types::{BinarySeries, MergedSeries};

/// Resample one tier of an annotation export
pub fn resample_file(
    path: &Path,
    tier: &str,
    layout: ColumnLayout,
    resampler: &GridResampler,
) -> Result<BinarySeries, BinarizeError> {
    let text = storage::read_export(path)?;
    let intervals = AnnotationAdapter::load_intervals(&text, tier, layout)?;
    resampler.resample(&intervals)
}

/// Merge two persisted channel series
pub fn merge_files(
    primary: &Path,
    secondary: &Path,
    merger: &ChannelMerger,
) -> Result<MergedSeries, BinarizeError> {
    let primary = storage::read_binary_series(primary)?;
    let secondary = storage::read_binary_series(secondary)?;
    Ok(merger.merge(&primary, &secondary))
}

/// Reduce a persisted merged series against a persisted reference series
pub fn conjoin_files(merged: &Path, reference: &Path) -> Result<BinarySeries, BinarizeError> {
    let merged = storage::read_merged_series(merged)?;
    let reference = storage::read_binary_series(reference)?;
    Ok(ConjunctionReducer::reduce(&merged, &reference))
}

/// Files with `extension` under `dir`, down to `depth` levels, sorted
///
/// A missing directory yields no files.
pub fn discover_files(dir: &Path, extension: &str, depth: usize) -> Vec<PathBuf> {
    if !dir.is_dir() {
        warn!("Input directory {} does not exist", dir.display());
        return Vec::new();
    }

    let mut files: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(depth)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("Cannot read directory entry: {}", e);
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .map(|ext| ext.eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .map(|entry| entry.into_path())
        .collect();

    files.sort();
    files
}

/// Batch processor running configured stages over directories
pub struct BatchProcessor {
    config: PipelineConfig,
}

impl BatchProcessor {
    /// Create a processor, validating the configuration
    pub fn new(config: PipelineConfig) -> Result<Self, BinarizeError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run every configured stage in order: resample, merge, conjunction
    pub fn run_all(&self) -> Result<BatchReport, BinarizeError> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, "Starting batch run");

        let mut stages = Vec::new();
        for stage in &self.config.resample {
            stages.push(self.run_resample_stage(stage)?);
        }
        if let Some(merge) = &self.config.merge {
            stages.push(self.run_merge_stage(merge)?);
        }
        if let Some(conjunction) = &self.config.conjunction {
            stages.push(self.run_conjunction_stage(conjunction)?);
        }

        let report = BatchReport::new(run_id, started_at, stages);
        info!("Batch finished: {}", report.summary());
        Ok(report)
    }

    /// Resample one tier from every export in the stage's input directory
    pub fn run_resample_stage(
        &self,
        stage: &ResampleStageConfig,
    ) -> Result<StageReport, BinarizeError> {
        let mut report = StageReport::new(&stage.name, StageKind::Resample);
        let inputs = discover_files(&stage.input_dir, EXPORT_EXTENSION, self.config.search_depth);
        info!(stage = %stage.name, "Found {} files.", inputs.len());

        storage::ensure_dir(&stage.output_dir)?;

        let resampler = GridResampler::new(stage.activation_rule())
            .with_bin_width(self.config.bin_width_ms)
            .with_policy(self.config.overlap_policy);
        let convention = SuffixConvention::new(&stage.output_suffix);
        let mut claimed: HashSet<String> = HashSet::new();

        for path in inputs {
            let input = path.display().to_string();
            let stem = file_stem(&path);
            let file_name = convention.file_name(&SubjectKey::new(stem.as_str()), SERIES_EXTENSION);
            let output = stage.output_dir.join(&file_name);

            // Only a written output claims its name
            if claimed.contains(&file_name) {
                let err = BinarizeError::DuplicateSubject {
                    subject: stem,
                    existing: output,
                };
                warn!(stage = %stage.name, "Skipping {}: {}", input, err);
                report.skip(input, &err);
                continue;
            }

            let result = resample_file(&path, &stage.tier, stage.layout, &resampler)
                .and_then(|series| {
                    storage::write_binary_series(&output, &series)?;
                    Ok(series)
                });

            match result {
                Ok(series) => {
                    debug!(stage = %stage.name, bins = series.len(), active = series.active_count(), "Resampled {}", input);
                    info!(stage = %stage.name, "Saved to {}", output.display());
                    claimed.insert(file_name);
                    report.written.push(output);
                }
                Err(err @ BinarizeError::MissingTier { .. }) => {
                    warn!(stage = %stage.name, "Skipping {}: {}", input, err);
                    report.skip(input, &err);
                }
                Err(err) => {
                    error!(stage = %stage.name, "Failed on {}: {}", input, err);
                    report.skip(input, &err);
                }
            }
        }

        info!(
            stage = %stage.name,
            "{} files written, {} skipped",
            report.processed(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Merge the two channels of every subject present in both folders
    pub fn run_merge_stage(&self, stage: &MergeStageConfig) -> Result<StageReport, BinarizeError> {
        let name = format!("{}+{}", stage.primary.name, stage.secondary.name);
        let merger = ChannelMerger::new(&stage.primary.name, &stage.secondary.name);
        self.run_paired_stage(
            StageReport::new(name, StageKind::Merge),
            (&stage.primary, &stage.secondary),
            &stage.output_dir,
            &stage.output_suffix,
            |primary, secondary, output| {
                let merged = merge_files(primary, secondary, &merger)?;
                storage::write_merged_series(output, &merged)?;
                Ok(merged.len())
            },
        )
    }

    /// AND every merged series with the reference series of the same subject
    pub fn run_conjunction_stage(
        &self,
        stage: &ConjunctionStageConfig,
    ) -> Result<StageReport, BinarizeError> {
        let name = format!("{}&{}", stage.merged.name, stage.reference.name);
        self.run_paired_stage(
            StageReport::new(name, StageKind::Conjunction),
            (&stage.merged, &stage.reference),
            &stage.output_dir,
            &stage.output_suffix,
            |merged, reference, output| {
                let series = conjoin_files(merged, reference)?;
                storage::write_binary_series(output, &series)?;
                Ok(series.len())
            },
        )
    }

    /// Pair two channel folders by subject key and combine each pair
    ///
    /// A subject found in only one folder is skipped with `MissingPair`.
    /// `combine` receives both inputs and the output path and returns the
    /// number of rows written.
    fn run_paired_stage<F>(
        &self,
        mut report: StageReport,
        (left, right): (&ChannelConfig, &ChannelConfig),
        output_dir: &Path,
        output_suffix: &str,
        mut combine: F,
    ) -> Result<StageReport, BinarizeError>
    where
        F: FnMut(&Path, &Path, &Path) -> Result<usize, BinarizeError>,
    {
        let left_index = self.index_channel(&left.dir, &left.convention(), &mut report);
        let right_index = self.index_channel(&right.dir, &right.convention(), &mut report);

        storage::ensure_dir(output_dir)?;
        let output_convention = SuffixConvention::new(output_suffix);

        let subjects: BTreeSet<&SubjectKey> = left_index.keys().chain(right_index.keys()).collect();
        for subject in subjects {
            let (left_path, right_path) = match (left_index.get(subject), right_index.get(subject)) {
                (Some(l), Some(r)) => (l, r),
                (l, _) => {
                    let missing = if l.is_none() { &left.name } else { &right.name };
                    let err = BinarizeError::MissingPair {
                        subject: subject.to_string(),
                        missing: missing.clone(),
                    };
                    warn!(stage = %report.stage, "skipped {}: {}", subject, err);
                    report.skip(subject.as_str(), &err);
                    continue;
                }
            };

            let output = output_dir.join(output_convention.file_name(subject, SERIES_EXTENSION));
            match combine(left_path.as_path(), right_path.as_path(), output.as_path()) {
                Ok(rows) => {
                    info!(stage = %report.stage, "Saved: {} ({} rows)", output.display(), rows);
                    report.written.push(output);
                }
                Err(err) => {
                    error!(stage = %report.stage, "Failed on {}: {}", subject, err);
                    report.skip(subject.as_str(), &err);
                }
            }
        }

        info!(
            stage = %report.stage,
            "{} files written, {} skipped",
            report.processed(),
            report.skipped.len()
        );
        Ok(report)
    }

    /// Index one channel folder, recording rejected files in `report`
    fn index_channel(
        &self,
        dir: &Path,
        convention: &SuffixConvention,
        report: &mut StageReport,
    ) -> SubjectIndex {
        let files = discover_files(dir, SERIES_EXTENSION, self.config.search_depth);
        let index = SubjectIndex::build(files, convention, self.config.key_policy);
        for rejected in index.rejected() {
            warn!(stage = %report.stage, "Rejected {}: {}", rejected.path.display(), rejected.error);
            report.skip(rejected.path.display().to_string(), &rejected.error);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::KeyPolicy;
    use crate::types::{BinaryRow, Provenance};
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    /// Export with all three tiers, six-column layout
    const SUBJECT_ONE: &str = "\
R\tchild\t0\t300\t300\tNP
R\tchild\t300\t800\t500\tP
RA\tchild\t0\t200\t200\tMDG
RA\tchild\t200\t500\t300\tX
LA\tchild\t400\t700\t300\tmdt
";

    /// Export without any LA tier
    const SUBJECT_TWO: &str = "\
R\tchild\t0\t400\t400\tP
RA\tchild\t0\t400\t400\tMDT
";

    fn setup() -> (TempDir, PipelineConfig) {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("NEUR490_TXT");
        fs::create_dir_all(&exports).unwrap();
        fs::write(exports.join("S01_CC_RE.txt"), SUBJECT_ONE).unwrap();
        fs::write(exports.join("S02_CC_RE.txt"), SUBJECT_TWO).unwrap();
        let config = PipelineConfig::default().rooted_at(dir.path());
        (dir, config)
    }

    fn values(path: &Path) -> Vec<u8> {
        storage::read_binary_series(path).unwrap().values()
    }

    #[test]
    fn test_full_batch() {
        let (dir, config) = setup();
        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_all().unwrap();

        assert_eq!(report.stages.len(), 5);
        let root = dir.path();

        // R: P covers [300, 800)
        assert_eq!(
            values(&root.join("NEUR490_R_CSV/S01_CC_RE_binary.csv")),
            vec![0, 0, 0, 1, 1, 1, 1, 1]
        );

        // RA: MDG over [0, 200), X over [200, 500)
        assert_eq!(
            values(&root.join("NEUR490_RA_CSV/S01_CC_RE_RA_binary.csv")),
            vec![1, 1, 0, 0, 0]
        );

        // LA is missing for S02 but present for S01
        assert!(root.join("NEUR490_LA_CSV/S01_CC_RE_LA_binary.csv").exists());
        assert!(!root.join("NEUR490_LA_CSV/S02_CC_RE_LA_binary.csv").exists());
        assert_eq!(report.stages[2].skipped.len(), 1);
        assert_eq!(report.stages[2].skipped[0].code, "MISSING_TIER");

        // Merge: RA has 5 bins, LA has 7; outer union has 7
        let merged =
            storage::read_merged_series(&root.join("NEUR490_MERGED_CSV/S01_CC_RE_MERGED.csv")).unwrap();
        assert_eq!(merged.len(), 7);
        assert_eq!(merged.values(), vec![1, 1, 0, 0, 1, 1, 1]);
        assert_eq!(merged.rows[0].tier, Provenance::Channel("RA".to_string()));
        assert_eq!(merged.rows[4].tier, Provenance::Channel("LA".to_string()));
        assert_eq!(merged.rows[2].tier, Provenance::None);

        // S02 has no LA file, so it is skipped by the merge
        let merge_report = &report.stages[3];
        assert_eq!(merge_report.processed(), 1);
        assert_eq!(merge_report.skipped.len(), 1);
        assert_eq!(merge_report.skipped[0].code, "MISSING_PAIR");
        assert_eq!(merge_report.skipped[0].input, "S02_CC_RE");

        // Conjunction: inner join of 7 merged bins with 8 reference bins
        let final_series =
            storage::read_binary_series(&root.join("NEUR490_FINAL_MERGED/S01_CC_FINAL_MERGED.csv"))
                .unwrap();
        assert_eq!(final_series.len(), 7);
        assert_eq!(final_series.values(), vec![0, 0, 0, 0, 1, 1, 1]);

        // S02 has a reference series but no merged series
        let conjunction_report = &report.stages[4];
        assert_eq!(conjunction_report.processed(), 1);
        assert_eq!(conjunction_report.skipped[0].input, "S02_CC");

        assert_eq!(report.total_processed, 2 + 2 + 1 + 1 + 1);
        assert_eq!(report.total_skipped, report.stages.iter().map(|s| s.skipped.len()).sum::<usize>());
    }

    #[test]
    fn test_malformed_file_is_skipped_and_batch_continues() {
        let (dir, config) = setup();
        let exports = dir.path().join("NEUR490_TXT");
        fs::write(exports.join("S03_CC_RE.txt"), "R\tchild\tzero\t300\t300\tP\n").unwrap();

        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_resample_stage(&processor.config().resample[0]).unwrap();

        assert_eq!(report.processed(), 2);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "MALFORMED_ROW");
        assert!(!dir.path().join("NEUR490_R_CSV/S03_CC_RE_binary.csv").exists());
    }

    #[test]
    fn test_oversized_interval_is_skipped_and_batch_continues() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("NEUR490_TXT");
        fs::create_dir_all(&exports).unwrap();
        fs::write(exports.join("A_RE.txt"), "R 0 1e20 1e20 P\n").unwrap();
        fs::write(exports.join("B_RE.txt"), "R 0 300 300 P\n").unwrap();

        let config = PipelineConfig::default().rooted_at(dir.path());
        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_resample_stage(&processor.config().resample[0]).unwrap();

        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "INVALID_INTERVAL");
        assert!(report.skipped[0].input.ends_with("A_RE.txt"));
        assert!(!dir.path().join("NEUR490_R_CSV/A_RE_binary.csv").exists());
        assert_eq!(values(&dir.path().join("NEUR490_R_CSV/B_RE_binary.csv")), vec![1, 1, 1]);
    }

    #[test]
    fn test_same_stem_in_two_folders() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("NEUR490_TXT");
        fs::create_dir_all(exports.join("x")).unwrap();
        fs::create_dir_all(exports.join("y")).unwrap();
        fs::create_dir_all(exports.join("z")).unwrap();
        // x has no R tier, so y still gets the name; z collides with y
        fs::write(exports.join("x/S_RE.txt"), "RA 0 100 100 MDG\n").unwrap();
        fs::write(exports.join("y/S_RE.txt"), "R 0 200 200 P\n").unwrap();
        fs::write(exports.join("z/S_RE.txt"), "R 0 400 400 NP\n").unwrap();

        let config = PipelineConfig::default().rooted_at(dir.path());
        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_resample_stage(&processor.config().resample[0]).unwrap();

        assert_eq!(report.processed(), 1);
        assert_eq!(values(&dir.path().join("NEUR490_R_CSV/S_RE_binary.csv")), vec![1, 1]);

        let codes: Vec<&str> = report.skipped.iter().map(|s| s.code.as_str()).collect();
        assert_eq!(codes, vec!["MISSING_TIER", "DUPLICATE_SUBJECT"]);
        assert!(Path::new(&report.skipped[1].input).ends_with("z/S_RE.txt"));
    }

    #[test]
    fn test_per_subject_folders() {
        let dir = tempfile::tempdir().unwrap();
        let exports = dir.path().join("NEUR490_TXT");
        fs::create_dir_all(exports.join("S01")).unwrap();
        fs::write(exports.join("S01/S01_CC_RE.txt"), SUBJECT_ONE).unwrap();

        let config = PipelineConfig::default().rooted_at(dir.path());
        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_resample_stage(&processor.config().resample[0]).unwrap();
        assert_eq!(report.processed(), 1);
        assert!(dir.path().join("NEUR490_R_CSV/S01_CC_RE_binary.csv").exists());
    }

    #[test]
    fn test_merge_stage_reports_missing_secondary() {
        let dir = tempfile::tempdir().unwrap();
        let config = PipelineConfig::default().rooted_at(dir.path());
        let merge = config.merge.clone().unwrap();
        fs::create_dir_all(&merge.primary.dir).unwrap();
        storage::write_binary_series(
            &merge.primary.dir.join("S09_RE_RA_binary.csv"),
            &BinarySeries::new(vec![BinaryRow::new(0, 50, true)]),
        )
        .unwrap();

        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_merge_stage(&merge).unwrap();
        assert_eq!(report.processed(), 0);
        assert_eq!(report.skipped.len(), 1);
        assert!(report.skipped[0].reason.contains("LA"));
    }

    #[test]
    fn test_strict_key_policy_rejects_unmatched_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = PipelineConfig::default().rooted_at(dir.path());
        config.key_policy = KeyPolicy::Strict;
        let conjunction = config.conjunction.clone().unwrap();
        fs::create_dir_all(&conjunction.reference.dir).unwrap();
        storage::write_binary_series(
            &conjunction.reference.dir.join("S01_misnamed.csv"),
            &BinarySeries::default(),
        )
        .unwrap();

        let processor = BatchProcessor::new(config).unwrap();
        let report = processor.run_conjunction_stage(&conjunction).unwrap();
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].code, "UNMATCHED_FILENAME");
    }

    #[test]
    fn test_resample_file_uses_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("five.txt");
        fs::write(&path, "R 0 3720 3720 NP\nR 3720 7210 3490 P\n").unwrap();

        let resampler = GridResampler::new(crate::resampler::ActivationRule::single("P"));
        let series = resample_file(&path, "R", ColumnLayout::Five, &resampler).unwrap();
        assert_eq!(series.len(), 73);
        assert_eq!(series.rows[37], BinaryRow::new(3700, 3750, true));
        assert_eq!(series.rows[36], BinaryRow::new(3600, 3650, false));
    }

    #[test]
    fn test_discover_missing_dir() {
        assert!(discover_files(Path::new("/nonexistent/annobin"), "txt", 2).is_empty());
    }
}
