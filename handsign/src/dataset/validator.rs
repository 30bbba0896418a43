//! Dataset Validator
//!
//! Offline integrity checks over a corpus:
//! - `scan` loads every sample file and sorts it into valid or corrupt
//! - `quarantine` moves corrupt files out of the active corpus
//! - `admission` applies the minimum class/sample policy required for training
//!
//! Valid files are never modified.

use super::corpus::Corpus;
use super::sample::read_array;
use crate::capture::WindowShape;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Why a corpus file was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorruptReason {
    /// Loaded, but the array shape differs from the pipeline's window shape
    InvalidShape { found: Vec<usize> },
    /// Could not be read as an array
    LoadError { message: String },
}

impl std::fmt::Display for CorruptReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CorruptReason::InvalidShape { found } => write!(f, "invalid shape {:?}", found),
            CorruptReason::LoadError { message } => write!(f, "load error: {}", message),
        }
    }
}

/// A rejected corpus file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorruptFile {
    pub path: PathBuf,
    pub class_name: String,
    pub reason: CorruptReason,
}

impl CorruptFile {
    pub fn to_error(&self) -> crate::Error {
        crate::Error::CorpusCorruption {
            path: self.path.clone(),
            reason: self.reason.to_string(),
        }
    }
}

/// Result of a corpus scan
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Valid samples per class; classes with no valid samples are present with 0
    pub counts: BTreeMap<String, usize>,
    /// Valid sample paths per class
    pub valid: BTreeMap<String, Vec<PathBuf>>,
    pub corrupt: Vec<CorruptFile>,
}

impl ScanReport {
    pub fn total_valid(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn corrupt_paths(&self) -> Vec<PathBuf> {
        self.corrupt.iter().map(|c| c.path.clone()).collect()
    }

    pub fn is_clean(&self) -> bool {
        self.corrupt.is_empty()
    }
}

/// Result of a quarantine pass that moved every file it found
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuarantineReport {
    /// `(from, to)` for each moved file
    pub moved: Vec<(PathBuf, PathBuf)>,
    /// Files that no longer exist, usually because they were already moved
    pub not_found: Vec<PathBuf>,
}

/// Minimum data required before training
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdmissionPolicy {
    pub min_samples_per_class: usize,
    pub min_classes: usize,
    pub min_total_samples: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        Self {
            min_samples_per_class: 2,
            min_classes: 2,
            min_total_samples: 4,
        }
    }
}

/// Admission decision for a scanned corpus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionReport {
    /// Classes with enough valid samples, sorted
    pub eligible: Vec<String>,
    /// Classes below the per-class minimum, with their counts
    pub excluded: Vec<(String, usize)>,
    /// Valid samples across the whole corpus
    pub total_valid: usize,
    /// Why the corpus as a whole cannot be trained on, if it cannot
    pub rejection: Option<String>,
}

impl AdmissionReport {
    pub fn is_admitted(&self) -> bool {
        self.rejection.is_none()
    }

    /// `InsufficientData` unless admitted
    pub fn ensure(&self) -> crate::Result<()> {
        match &self.rejection {
            None => Ok(()),
            Some(reason) => Err(crate::Error::InsufficientData(reason.clone())),
        }
    }
}

/// Checks a corpus against the pipeline's window shape
#[derive(Debug, Clone)]
pub struct DatasetValidator {
    corpus: Corpus,
    shape: WindowShape,
    policy: AdmissionPolicy,
}

impl DatasetValidator {
    pub fn new(corpus: Corpus, shape: WindowShape) -> Self {
        Self {
            corpus,
            shape,
            policy: AdmissionPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn shape(&self) -> WindowShape {
        self.shape
    }

    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// Classify every sample file in every class directory.
    ///
    /// Per-file problems are recorded, logged and skipped; only a missing or
    /// unreadable corpus root fails the scan.
    pub fn scan(&self) -> crate::Result<ScanReport> {
        let root = self.corpus.root();
        if !root.is_dir() {
            return Err(crate::Error::InvalidInput(format!(
                "dataset root {:?} is not a directory",
                root
            )));
        }

        let mut report = ScanReport::default();
        for class in self.corpus.classes()? {
            let mut valid = Vec::new();
            for path in self.corpus.sample_files(&class)? {
                match self.check_file(&path) {
                    Ok(()) => valid.push(path),
                    Err(reason) => {
                        match &reason {
                            CorruptReason::InvalidShape { found } => {
                                warn!(path = ?path, found = ?found, expected = %self.shape, "[INVALID SHAPE]")
                            }
                            CorruptReason::LoadError { message } => {
                                warn!(path = ?path, error = %message, "[LOAD ERROR]")
                            }
                        }
                        report.corrupt.push(CorruptFile {
                            path,
                            class_name: class.clone(),
                            reason,
                        });
                    }
                }
            }
            debug!(class = %class, valid = valid.len(), "scanned class");
            report.counts.insert(class.clone(), valid.len());
            report.valid.insert(class, valid);
        }

        info!(
            classes = report.counts.len(),
            valid = report.total_valid(),
            corrupt = report.corrupt.len(),
            "Dataset scan complete"
        );
        Ok(report)
    }

    /// Check a single file against the expected shape
    pub fn check_file(&self, path: &Path) -> std::result::Result<(), CorruptReason> {
        let array = read_array(path).map_err(|e| CorruptReason::LoadError {
            message: match e {
                crate::Error::Npy(m) => m,
                other => other.to_string(),
            },
        })?;
        if array.shape() != [self.shape.frames, self.shape.features] {
            return Err(CorruptReason::InvalidShape {
                found: array.shape().to_vec(),
            });
        }
        Ok(())
    }

    /// Move files into the quarantine directory, keeping their file names.
    ///
    /// Files that no longer exist are reported as not found, so repeating a
    /// quarantine is harmless. Any file that exists but cannot be moved fails
    /// the whole call with `Error::Quarantine` listing every such file.
    pub fn quarantine(&self, files: &[PathBuf]) -> crate::Result<QuarantineReport> {
        let target_dir = self.corpus.quarantine_path();
        let mut report = QuarantineReport::default();
        let mut failed = Vec::new();

        for path in files {
            if !path.exists() {
                debug!(path = ?path, "quarantine source not found");
                report.not_found.push(path.clone());
                continue;
            }
            let Some(name) = path.file_name() else {
                failed.push((path.clone(), "path has no file name".to_string()));
                continue;
            };
            if let Err(e) = std::fs::create_dir_all(&target_dir) {
                failed.push((path.clone(), format!("cannot create {:?}: {}", target_dir, e)));
                continue;
            }
            let dest = target_dir.join(name);
            if dest.exists() {
                failed.push((path.clone(), format!("{:?} already exists", dest)));
                continue;
            }
            match move_file(path, &dest) {
                Ok(()) => {
                    info!(from = ?path, to = ?dest, "Quarantined file");
                    report.moved.push((path.clone(), dest));
                }
                Err(e) => failed.push((path.clone(), e.to_string())),
            }
        }

        if !failed.is_empty() {
            for (path, reason) in &failed {
                error!(path = ?path, reason = %reason, "Could not quarantine file");
            }
            return Err(crate::Error::Quarantine { failed });
        }
        Ok(report)
    }

    /// Apply the admission policy to a scan
    pub fn admission(&self, scan: &ScanReport) -> AdmissionReport {
        let policy = self.policy;
        let (eligible, excluded): (Vec<_>, Vec<_>) = scan
            .counts
            .iter()
            .map(|(class, count)| (class.clone(), *count))
            .partition(|(_, count)| *count >= policy.min_samples_per_class);
        let eligible: Vec<String> = eligible.into_iter().map(|(class, _)| class).collect();
        let total_valid = scan.total_valid();

        let rejection = if eligible.len() < policy.min_classes {
            Some(format!(
                "{} class(es) have at least {} valid samples, need at least {} classes",
                eligible.len(),
                policy.min_samples_per_class,
                policy.min_classes
            ))
        } else if total_valid < policy.min_total_samples {
            Some(format!(
                "{} valid samples in the corpus, need at least {}",
                total_valid, policy.min_total_samples
            ))
        } else {
            None
        };

        for (class, count) in &excluded {
            warn!(class = %class, count, "Class excluded from training");
        }
        AdmissionReport {
            eligible,
            excluded,
            total_valid,
            rejection,
        }
    }

    /// Admission report, or `InsufficientData` if the corpus is not trainable
    pub fn ensure_trainable(&self, scan: &ScanReport) -> crate::Result<AdmissionReport> {
        let admission = self.admission(scan);
        admission.ensure()?;
        Ok(admission)
    }
}

/// Rename, falling back to copy and remove across filesystems
fn move_file(from: &Path, to: &Path) -> std::io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            std::fs::copy(from, to).map_err(|_| rename_err)?;
            std::fs::remove_file(from)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn shape() -> WindowShape {
        WindowShape::new(3, 6)
    }

    fn write(dir: &Path, class: &str, name: &str, rows: usize, cols: usize) -> PathBuf {
        let class_dir = dir.join(class);
        std::fs::create_dir_all(&class_dir).unwrap();
        let path = class_dir.join(name);
        ndarray_npy::write_npy(&path, &Array2::<f32>::zeros((rows, cols))).unwrap();
        path
    }

    fn validator(dir: &Path) -> DatasetValidator {
        DatasetValidator::new(Corpus::new(dir), shape())
    }

    #[test]
    fn test_scan_counts_and_flags_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello", "a.npy", 3, 6);
        write(dir.path(), "hello", "b.npy", 3, 6);
        let wrong = write(dir.path(), "hello", "c.npy", 3, 5);
        std::fs::create_dir_all(dir.path().join("bye")).unwrap();
        std::fs::write(dir.path().join("bye").join("x.npy"), "garbage").unwrap();

        let report = validator(dir.path()).scan().unwrap();
        assert_eq!(report.counts.get("hello"), Some(&2));
        assert_eq!(report.counts.get("bye"), Some(&0));
        assert_eq!(report.corrupt.len(), 2);
        let shape_issue = report.corrupt.iter().find(|c| c.path == wrong).unwrap();
        assert_eq!(shape_issue.reason, CorruptReason::InvalidShape { found: vec![3, 5] });
        assert!(report
            .corrupt
            .iter()
            .any(|c| matches!(c.reason, CorruptReason::LoadError { .. })));
    }

    #[test]
    fn test_scan_ignores_quarantine_and_other_extensions() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "hello", "a.npy", 3, 6);
        write(dir.path(), "_corrupted", "old.npy", 9, 9);
        std::fs::write(dir.path().join("hello").join("notes.txt"), "x").unwrap();

        let report = validator(dir.path()).scan().unwrap();
        assert!(report.is_clean());
        assert_eq!(report.counts.len(), 1);
    }

    #[test]
    fn test_scan_missing_root_fails() {
        let err = validator(Path::new("/nonexistent/corpus")).scan().unwrap_err();
        assert!(matches!(err, crate::Error::InvalidInput(_)));
    }

    #[test]
    fn test_quarantine_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let bad = write(dir.path(), "hello", "bad.npy", 2, 6);
        let v = validator(dir.path());

        let first = v.quarantine(&[bad.clone()]).unwrap();
        assert_eq!(first.moved.len(), 1);
        assert!(dir.path().join("_corrupted").join("bad.npy").exists());
        assert!(!bad.exists());

        let second = v.quarantine(&[bad.clone()]).unwrap();
        assert!(second.moved.is_empty());
        assert_eq!(second.not_found, vec![bad]);
    }

    #[test]
    fn test_quarantine_collision_fails_loudly() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(dir.path(), "hello", "dup.npy", 2, 6);
        write(dir.path(), "_corrupted", "dup.npy", 2, 6);

        let err = validator(dir.path()).quarantine(&[a.clone()]).unwrap_err();
        match err {
            crate::Error::Quarantine { failed } => assert_eq!(failed[0].0, a),
            other => panic!("unexpected error {:?}", other),
        }
        assert!(a.exists());
    }

    #[test]
    fn test_admission_scenario_one_eligible_class() {
        let mut scan = ScanReport::default();
        scan.counts.insert("hello".into(), 5);
        scan.counts.insert("bye".into(), 1);

        let admission = validator(Path::new(".")).admission(&scan);
        assert_eq!(admission.eligible, vec!["hello"]);
        assert_eq!(admission.excluded, vec![("bye".to_string(), 1)]);
        assert!(!admission.is_admitted());
        assert!(matches!(admission.ensure(), Err(crate::Error::InsufficientData(_))));
    }

    #[test]
    fn test_admission_requires_total_samples() {
        let policy = AdmissionPolicy {
            min_samples_per_class: 1,
            min_classes: 2,
            min_total_samples: 4,
        };
        let mut scan = ScanReport::default();
        scan.counts.insert("a".into(), 1);
        scan.counts.insert("b".into(), 2);

        let v = validator(Path::new(".")).with_policy(policy);
        assert!(v.ensure_trainable(&scan).is_err());

        scan.counts.insert("b".into(), 3);
        assert!(v.ensure_trainable(&scan).is_ok());
    }

    #[test]
    fn test_admission_minimum_corpus_passes() {
        let mut scan = ScanReport::default();
        scan.counts.insert("a".into(), 2);
        scan.counts.insert("b".into(), 2);
        let admission = validator(Path::new(".")).ensure_trainable(&scan).unwrap();
        assert_eq!(admission.eligible, vec!["a", "b"]);
        assert_eq!(admission.total_valid, 4);
    }
}
