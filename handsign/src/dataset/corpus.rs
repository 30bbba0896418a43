//! Corpus layout on disk
//!
//! ```text
//! dataset/
//!   hello/hello_20240309_140507.npy
//!   bye/bye_20240309_140611.npy
//!   _corrupted/            quarantine, never scanned
//! ```
//!
//! Each class is a subdirectory; each sample is one file with the corpus
//! extension. File names are not parsed.

use super::sample::LabeledSample;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default quarantine subdirectory
pub const DEFAULT_QUARANTINE_DIR: &str = "_corrupted";

/// Default sample file extension
pub const DEFAULT_EXTENSION: &str = "npy";

/// A training corpus rooted at one directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Corpus {
    root: PathBuf,
    quarantine_dir: String,
    extension: String,
}

impl Corpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            quarantine_dir: DEFAULT_QUARANTINE_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
        }
    }

    pub fn with_quarantine_dir(mut self, name: impl Into<String>) -> Self {
        self.quarantine_dir = name.into();
        self
    }

    pub fn with_extension(mut self, extension: impl Into<String>) -> Self {
        self.extension = extension.into().trim_start_matches('.').to_string();
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn quarantine_dir_name(&self) -> &str {
        &self.quarantine_dir
    }

    /// Absolute location of the quarantine directory
    pub fn quarantine_path(&self) -> PathBuf {
        self.root.join(&self.quarantine_dir)
    }

    pub fn class_dir(&self, class_name: &str) -> PathBuf {
        self.root.join(class_name)
    }

    /// Class directory names, sorted. Hidden directories and the quarantine
    /// directory are skipped. A missing root has no classes.
    pub fn classes(&self) -> crate::Result<Vec<String>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }
        let mut classes = Vec::new();
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == self.quarantine_dir || name.starts_with('.') {
                continue;
            }
            classes.push(name);
        }
        classes.sort();
        Ok(classes)
    }

    /// Whether `path` carries the corpus extension
    pub fn has_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().eq_ignore_ascii_case(&self.extension))
            .unwrap_or(false)
    }

    /// Sample files of one class, sorted by name
    pub fn sample_files(&self, class_name: &str) -> crate::Result<Vec<PathBuf>> {
        let dir = self.class_dir(class_name);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut files = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_file() && self.has_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn sample_count(&self, class_name: &str) -> crate::Result<usize> {
        Ok(self.sample_files(class_name)?.len())
    }

    /// Persist a sample under its class directory.
    ///
    /// Never overwrites: a name taken within the same second gets a `_N` suffix.
    pub fn save_sample(&self, sample: &LabeledSample) -> crate::Result<PathBuf> {
        let class = sample.class_name();
        if class == self.quarantine_dir {
            return Err(crate::Error::InvalidInput(format!(
                "'{}' is reserved for quarantined files",
                class
            )));
        }
        let dir = self.class_dir(class);
        std::fs::create_dir_all(&dir)?;

        let stem = sample.file_stem();
        let mut path = dir.join(format!("{}.{}", stem, self.extension));
        let mut suffix = 1;
        while path.exists() {
            path = dir.join(format!("{}_{}.{}", stem, suffix, self.extension));
            suffix += 1;
        }

        sample.write_npy(&path)?;
        info!(class = %class, path = ?path, "Saved sample");
        Ok(path)
    }
}
