//! Artifact file helpers
//!
//! Model and catalog artifacts are JSON documents. Writes go to `<path>.tmp`
//! first and are renamed into place, so a crash never leaves a half-written
//! artifact behind.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Current artifact format version
pub const CURRENT_FORMAT_VERSION: &str = "1.0";

/// Temporary path used while writing an artifact
pub(crate) fn staging_path(final_path: &Path) -> PathBuf {
    let mut name = final_path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    final_path.with_file_name(name)
}

/// Serialize `value` to `<path>.tmp` without publishing it
pub(crate) fn stage_json<T: Serialize>(value: &T, final_path: &Path) -> crate::Result<PathBuf> {
    if let Some(parent) = final_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let tmp = staging_path(final_path);
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(&tmp, json)?;
    Ok(tmp)
}

/// Rename a staged artifact into place
pub(crate) fn publish(final_path: &Path) -> crate::Result<()> {
    std::fs::rename(staging_path(final_path), final_path)?;
    Ok(())
}

/// Remove a staged artifact if one is left over
pub(crate) fn discard_staged(final_path: &Path) {
    let tmp = staging_path(final_path);
    match std::fs::remove_file(&tmp) {
        Ok(()) => tracing::debug!(path = ?tmp, "Discarded staged artifact"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = ?tmp, error = %e, "Failed to discard staged artifact"),
    }
}

/// Stage and publish in one step
pub(crate) fn write_json_atomic<T: Serialize>(value: &T, final_path: &Path) -> crate::Result<()> {
    stage_json(value, final_path)?;
    publish(final_path)
}

/// Read an artifact. Any failure is an artifact integrity error naming the file.
pub(crate) fn read_json_artifact<T: DeserializeOwned>(path: &Path, what: &str) -> crate::Result<T> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        crate::Error::ArtifactIntegrity(format!("cannot read {} {:?}: {}", what, path, e))
    })?;
    serde_json::from_str(&content).map_err(|e| {
        crate::Error::ArtifactIntegrity(format!("cannot parse {} {:?}: {}", what, path, e))
    })
}

/// Warn when an artifact was written by a different format version
pub(crate) fn check_format_version(found: &str, path: &Path) {
    if found != CURRENT_FORMAT_VERSION {
        tracing::warn!(
            path = ?path,
            found = %found,
            expected = CURRENT_FORMAT_VERSION,
            "Artifact has different format version"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_staging_path_appends_tmp() {
        assert_eq!(
            staging_path(Path::new("/tmp/artifacts/model.json")),
            PathBuf::from("/tmp/artifacts/model.json.tmp")
        );
    }

    #[test]
    fn test_write_atomic_leaves_no_staging_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("value.json");
        write_json_atomic(&vec![1, 2, 3], &path).unwrap();
        assert!(path.exists());
        assert!(!staging_path(&path).exists());
        let back: Vec<i32> = read_json_artifact(&path, "test value").unwrap();
        assert_eq!(back, vec![1, 2, 3]);
    }

    #[test]
    fn test_discard_staged_removes_tmp_only() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.json");
        stage_json(&vec![1], &path).unwrap();
        assert!(staging_path(&path).exists());
        discard_staged(&path);
        assert!(!staging_path(&path).exists());
        // Nothing staged is fine
        discard_staged(&path);
    }

    #[test]
    fn test_read_missing_is_integrity_error() {
        let err = read_json_artifact::<Vec<i32>>(Path::new("/nonexistent/a.json"), "catalog")
            .unwrap_err();
        assert!(matches!(err, crate::Error::ArtifactIntegrity(ref m) if m.contains("catalog")));
    }
}
