//! Subject identity derived from file names
//!
//! Every stage names its outputs `<subject><suffix>.<ext>`. A
//! [`SuffixConvention`] recovers the subject key from a file stem so that
//! files of the same recording can be paired across stages.

use crate::error::BinarizeError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Subject key shared by all files of one recording
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectKey(String);

impl SubjectKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// What to do with a stem that lacks the expected suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyPolicy {
    /// Use the whole stem as the key
    #[default]
    Lenient,
    /// Reject the file
    Strict,
}

/// Literal file-stem suffix of one stage's outputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuffixConvention {
    pub suffix: String,
    #[serde(default)]
    pub ignore_case: bool,
}

impl SuffixConvention {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
            ignore_case: false,
        }
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Stem with the suffix removed, `None` if the stem does not end with it
    pub fn strip<'a>(&self, stem: &'a str) -> Option<&'a str> {
        if self.ignore_case {
            let split = stem.len().checked_sub(self.suffix.len())?;
            let tail = stem.get(split..)?;
            tail.eq_ignore_ascii_case(&self.suffix).then(|| &stem[..split])
        } else {
            stem.strip_suffix(self.suffix.as_str())
        }
    }

    /// Derive the subject key of a file stem
    pub fn key_for_stem(&self, stem: &str, policy: KeyPolicy) -> Result<SubjectKey, BinarizeError> {
        let key = match (self.strip(stem), policy) {
            (Some(key), _) => key,
            (None, KeyPolicy::Lenient) => stem,
            (None, KeyPolicy::Strict) => {
                return Err(BinarizeError::UnmatchedFilename {
                    stem: stem.to_string(),
                    suffix: self.suffix.clone(),
                })
            }
        };
        if key.is_empty() {
            return Err(BinarizeError::UnmatchedFilename {
                stem: stem.to_string(),
                suffix: self.suffix.clone(),
            });
        }
        Ok(SubjectKey::new(key))
    }

    /// Derive the subject key of a path from its file stem
    pub fn key_for_path(&self, path: &Path, policy: KeyPolicy) -> Result<SubjectKey, BinarizeError> {
        let stem = file_stem(path);
        self.key_for_stem(&stem, policy)
    }

    /// File name for a subject under this convention
    pub fn file_name(&self, key: &SubjectKey, extension: &str) -> String {
        format!("{}{}.{}", key, self.suffix, extension)
    }
}

/// File stem of a path as a string, empty if absent
pub fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Input file rejected while building a [`SubjectIndex`]
#[derive(Debug)]
pub struct RejectedFile {
    pub path: PathBuf,
    pub error: BinarizeError,
}

/// Files of one stage keyed by subject
#[derive(Debug, Default)]
pub struct SubjectIndex {
    files: BTreeMap<SubjectKey, PathBuf>,
    rejected: Vec<RejectedFile>,
}

impl SubjectIndex {
    /// Index `paths` under `convention`
    ///
    /// Unmatched names (under [`KeyPolicy::Strict`]) and second files for an
    /// already indexed subject are rejected and kept in [`Self::rejected`].
    pub fn build<I>(paths: I, convention: &SuffixConvention, policy: KeyPolicy) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut index = Self::default();
        for path in paths {
            let key = match convention.key_for_path(&path, policy) {
                Ok(key) => key,
                Err(error) => {
                    index.rejected.push(RejectedFile { path, error });
                    continue;
                }
            };
            if let Some(existing) = index.files.get(&key) {
                let error = BinarizeError::DuplicateSubject {
                    subject: key.to_string(),
                    existing: existing.clone(),
                };
                index.rejected.push(RejectedFile { path, error });
                continue;
            }
            index.files.insert(key, path);
        }
        index
    }

    pub fn get(&self, key: &SubjectKey) -> Option<&PathBuf> {
        self.files.get(key)
    }

    pub fn contains(&self, key: &SubjectKey) -> bool {
        self.files.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SubjectKey> {
        self.files.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SubjectKey, &PathBuf)> {
        self.files.iter()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn rejected(&self) -> &[RejectedFile] {
        &self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_strip_known_suffix() {
        let convention = SuffixConvention::new("_RE_binary");
        let key = convention
            .key_for_stem("TD13-M3_A2R1_CC_RE_binary", KeyPolicy::Lenient)
            .unwrap();
        assert_eq!(key.as_str(), "TD13-M3_A2R1_CC");
    }

    #[test]
    fn test_lenient_uses_full_stem() {
        let convention = SuffixConvention::new("_RE_MERGED");
        let key = convention.key_for_stem("TD13-M3_other", KeyPolicy::Lenient).unwrap();
        assert_eq!(key.as_str(), "TD13-M3_other");
    }

    #[test]
    fn test_strict_rejects_unmatched_stem() {
        let convention = SuffixConvention::new("_RA_binary");
        let err = convention.key_for_stem("TD13_LA_binary", KeyPolicy::Strict).unwrap_err();
        assert!(matches!(err, BinarizeError::UnmatchedFilename { .. }));
    }

    #[test]
    fn test_suffix_only_stem_is_rejected() {
        let convention = SuffixConvention::new("_MERGED");
        assert!(convention.key_for_stem("_MERGED", KeyPolicy::Lenient).is_err());
    }

    #[test]
    fn test_case_insensitive_strip() {
        let convention = SuffixConvention::new("_RA_binary").ignoring_case();
        assert_eq!(convention.strip("S01_ra_BINARY"), Some("S01"));
        assert_eq!(SuffixConvention::new("_RA_binary").strip("S01_ra_BINARY"), None);
        assert_eq!(convention.strip("short"), None);
    }

    #[test]
    fn test_key_for_path_and_file_name() {
        let convention = SuffixConvention::new("_LA_binary");
        let key = convention
            .key_for_path(Path::new("out/S07_RE_LA_binary.csv"), KeyPolicy::Strict)
            .unwrap();
        assert_eq!(key.as_str(), "S07_RE");
        assert_eq!(
            SuffixConvention::new("_MERGED").file_name(&key, "csv"),
            "S07_RE_MERGED.csv"
        );
    }

    #[test]
    fn test_index_rejects_collisions() {
        let convention = SuffixConvention::new("_RA_binary");
        let index = SubjectIndex::build(
            vec![
                PathBuf::from("a/S01_RA_binary.csv"),
                PathBuf::from("b/S01_RA_binary.csv"),
                PathBuf::from("a/S02_RA_binary.csv"),
            ],
            &convention,
            KeyPolicy::Lenient,
        );
        assert_eq!(index.len(), 2);
        assert_eq!(
            index.get(&SubjectKey::new("S01")),
            Some(&PathBuf::from("a/S01_RA_binary.csv"))
        );
        assert_eq!(index.rejected().len(), 1);
        assert!(matches!(
            index.rejected()[0].error,
            BinarizeError::DuplicateSubject { .. }
        ));
    }
}
