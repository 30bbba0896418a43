//! Labeled samples and the on-disk array format
//!
//! A sample is one window stored as a 2-D `.npy` array of shape
//! `(frames, features)`. Samples are written as `f32`; corpora recorded by other
//! tools often hold `f64`, so reads accept either.

use crate::capture::SequenceWindow;
use chrono::{DateTime, Local};
use ndarray::{ArrayD, Ix2};
use std::path::Path;

/// Timestamp format embedded in sample file names
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// A recorded window tagged with its gesture class. Immutable once written.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledSample {
    class_name: String,
    created_at: DateTime<Local>,
    window: SequenceWindow,
}

impl LabeledSample {
    /// Tag a window with its class, timestamped now
    pub fn new(class_name: impl Into<String>, window: SequenceWindow) -> Self {
        Self::with_timestamp(class_name, window, Local::now())
    }

    pub fn with_timestamp(class_name: impl Into<String>, window: SequenceWindow, created_at: DateTime<Local>) -> Self {
        Self {
            class_name: class_name.into(),
            created_at,
            window,
        }
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    pub fn window(&self) -> &SequenceWindow {
        &self.window
    }

    /// `<class>_<YYYYmmdd_HHMMSS>`; the class is only for traceability
    pub fn file_stem(&self) -> String {
        format!("{}_{}", self.class_name, self.created_at.format(FILE_TIMESTAMP_FORMAT))
    }

    /// Write the window as an `f32` array
    pub fn write_npy(&self, path: &Path) -> crate::Result<()> {
        ndarray_npy::write_npy(path, self.window.as_array())
            .map_err(|e| crate::Error::Npy(format!("cannot write {:?}: {}", path, e)))
    }
}

/// Read an array file of any dimensionality as `f32`
pub fn read_array(path: &Path) -> crate::Result<ArrayD<f32>> {
    match ndarray_npy::read_npy::<_, ArrayD<f32>>(path) {
        Ok(array) => Ok(array),
        Err(f32_err) => match ndarray_npy::read_npy::<_, ArrayD<f64>>(path) {
            Ok(array) => Ok(array.mapv(|v| v as f32)),
            Err(_) => Err(crate::Error::Npy(f32_err.to_string())),
        },
    }
}

/// Read a sample file as a window, without checking it against any expected shape
pub fn read_window(path: &Path) -> crate::Result<SequenceWindow> {
    let array = read_array(path)?;
    let found = array.shape().to_vec();
    let array = array
        .into_dimensionality::<Ix2>()
        .map_err(|_| crate::Error::Npy(format!("expected a 2-D array, found shape {:?}", found)))?;
    Ok(SequenceWindow::from_array(array))
}
