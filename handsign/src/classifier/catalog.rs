//! Gesture class catalog
//!
//! Bidirectional mapping between class names and the model's output indices.
//! Fixed at training time and persisted next to the model; the two are only
//! ever loaded together.

use super::artifact::{check_format_version, read_json_artifact, write_json_atomic, CURRENT_FORMAT_VERSION};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CatalogFile {
    #[serde(default = "default_version")]
    format_version: String,
    classes: Vec<String>,
}

fn default_version() -> String {
    CURRENT_FORMAT_VERSION.to_string()
}

/// Class name ↔ index mapping
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GestureClassCatalog {
    classes: Vec<String>,
    index: HashMap<String, usize>,
}

impl GestureClassCatalog {
    /// Build a catalog with classes in the given index order.
    ///
    /// Names must be non-empty and unique.
    pub fn new(classes: Vec<String>) -> crate::Result<Self> {
        if classes.is_empty() {
            return Err(crate::Error::ArtifactIntegrity("catalog has no classes".to_string()));
        }
        let mut index = HashMap::with_capacity(classes.len());
        for (i, name) in classes.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(crate::Error::ArtifactIntegrity(format!(
                    "catalog entry {} has an empty class name",
                    i
                )));
            }
            if index.insert(name.clone(), i).is_some() {
                return Err(crate::Error::ArtifactIntegrity(format!(
                    "duplicate class name '{}' in catalog",
                    name
                )));
            }
        }
        Ok(Self { classes, index })
    }

    /// Build a catalog from arbitrary labels: unique names in sorted order,
    /// the way a label encoder assigns indices.
    pub fn from_labels<I, S>(labels: I) -> crate::Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut classes: Vec<String> = labels.into_iter().map(Into::into).collect();
        classes.sort();
        classes.dedup();
        Self::new(classes)
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn name(&self, index: usize) -> Option<&str> {
        self.classes.get(index).map(String::as_str)
    }

    /// Class names in index order
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let file: CatalogFile = read_json_artifact(path, "class catalog")?;
        check_format_version(&file.format_version, path);
        Self::new(file.classes)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        write_json_atomic(&self.to_file(), path)
    }

    pub(crate) fn stage(&self, path: &Path) -> crate::Result<()> {
        super::artifact::stage_json(&self.to_file(), path).map(|_| ())
    }

    fn to_file(&self) -> CatalogFile {
        CatalogFile {
            format_version: CURRENT_FORMAT_VERSION.to_string(),
            classes: self.classes.clone(),
        }
    }
}
