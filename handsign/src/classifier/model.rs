//! Sequence model artifacts
//!
//! [`SequenceModel`] is the seam between the pipeline and whatever model was
//! trained. The crate ships one concrete artifact, [`CentroidModel`]: one mean
//! window per class, scored by a softmax over negative mean squared distance.

use super::artifact::{check_format_version, read_json_artifact, stage_json, write_json_atomic, CURRENT_FORMAT_VERSION};
use crate::capture::{SequenceWindow, WindowShape};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A trained model over fixed-shape windows
pub trait SequenceModel: Send + Sync {
    /// Window shape the model was trained for
    fn input_shape(&self) -> WindowShape;

    /// Number of output classes
    fn output_dim(&self) -> usize;

    /// Per-class probabilities in catalog index order, summing to 1.
    ///
    /// Callers guarantee `window.shape() == self.input_shape()`.
    fn predict_proba(&self, window: &SequenceWindow) -> Vec<f32>;

    /// Ordered class names the model was trained with, when recorded
    fn class_names(&self) -> Option<&[String]> {
        None
    }
}

/// Default softmax temperature
pub const DEFAULT_TEMPERATURE: f32 = 0.01;

/// Nearest-centroid model over flattened windows
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CentroidModel {
    #[serde(default = "default_version")]
    format_version: String,
    frames: usize,
    features: usize,
    temperature: f32,
    /// Class names in output order, bound when the artifact pair is written
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    classes: Vec<String>,
    /// One flattened `frames * features` mean window per class
    centroids: Vec<Vec<f32>>,
}

fn default_version() -> String {
    CURRENT_FORMAT_VERSION.to_string()
}

impl CentroidModel {
    /// Fit one centroid per class from `(class_index, window)` samples.
    ///
    /// Every class in `0..num_classes` needs at least one sample.
    pub fn fit<'a, I>(
        shape: WindowShape,
        num_classes: usize,
        temperature: f32,
        samples: I,
    ) -> crate::Result<Self>
    where
        I: IntoIterator<Item = (usize, &'a SequenceWindow)>,
    {
        if temperature.is_nan() || temperature <= 0.0 {
            return Err(crate::Error::InvalidInput(format!(
                "temperature must be positive, got {}",
                temperature
            )));
        }
        let size = shape.element_count();
        let mut sums = vec![vec![0.0_f64; size]; num_classes];
        let mut counts = vec![0usize; num_classes];

        for (class, window) in samples {
            if class >= num_classes {
                return Err(crate::Error::InvalidInput(format!(
                    "class index {} out of range for {} classes",
                    class, num_classes
                )));
            }
            window.ensure_shape(shape)?;
            for (acc, v) in sums[class].iter_mut().zip(window.view().iter()) {
                *acc += *v as f64;
            }
            counts[class] += 1;
        }

        if let Some(empty) = counts.iter().position(|c| *c == 0) {
            return Err(crate::Error::InsufficientData(format!(
                "class index {} has no training samples",
                empty
            )));
        }

        let centroids = sums
            .into_iter()
            .zip(counts)
            .map(|(sum, n)| sum.into_iter().map(|s| (s / n as f64) as f32).collect())
            .collect();

        Ok(Self {
            format_version: CURRENT_FORMAT_VERSION.to_string(),
            frames: shape.frames,
            features: shape.features,
            temperature,
            classes: Vec::new(),
            centroids,
        })
    }

    /// Record the class name of every output
    pub fn with_classes(mut self, classes: &[String]) -> crate::Result<Self> {
        if classes.len() != self.centroids.len() {
            return Err(crate::Error::ArtifactIntegrity(format!(
                "{} class names for a model with {} outputs",
                classes.len(),
                self.centroids.len()
            )));
        }
        self.classes = classes.to_vec();
        Ok(self)
    }

    pub fn temperature(&self) -> f32 {
        self.temperature
    }

    pub fn load(path: &Path) -> crate::Result<Self> {
        let model: Self = read_json_artifact(path, "model")?;
        check_format_version(&model.format_version, path);
        model.check_consistency()?;
        Ok(model)
    }

    pub fn save(&self, path: &Path) -> crate::Result<()> {
        write_json_atomic(self, path)
    }

    pub(crate) fn stage(&self, path: &Path) -> crate::Result<()> {
        stage_json(self, path).map(|_| ())
    }

    fn check_consistency(&self) -> crate::Result<()> {
        let size = self.frames.checked_mul(self.features).ok_or_else(|| {
            crate::Error::ArtifactIntegrity(format!(
                "model shape {}x{} is too large",
                self.frames, self.features
            ))
        })?;
        if size == 0 || self.centroids.is_empty() {
            return Err(crate::Error::ArtifactIntegrity("model has an empty shape or no classes".to_string()));
        }
        if !self.classes.is_empty() && self.classes.len() != self.centroids.len() {
            return Err(crate::Error::ArtifactIntegrity(format!(
                "model names {} classes but has {} centroids",
                self.classes.len(),
                self.centroids.len()
            )));
        }
        if let Some(bad) = self.centroids.iter().position(|c| c.len() != size) {
            return Err(crate::Error::ArtifactIntegrity(format!(
                "centroid {} has {} values, expected {}",
                bad,
                self.centroids[bad].len(),
                size
            )));
        }
        if self.temperature.is_nan() || self.temperature <= 0.0 {
            return Err(crate::Error::ArtifactIntegrity(format!(
                "model temperature must be positive, got {}",
                self.temperature
            )));
        }
        Ok(())
    }
}

impl SequenceModel for CentroidModel {
    fn input_shape(&self) -> WindowShape {
        WindowShape::new(self.frames, self.features)
    }

    fn output_dim(&self) -> usize {
        self.centroids.len()
    }

    fn predict_proba(&self, window: &SequenceWindow) -> Vec<f32> {
        let n = (self.frames * self.features).max(1) as f32;
        let logits: Vec<f32> = self
            .centroids
            .iter()
            .map(|c| {
                let sq: f32 = c
                    .iter()
                    .zip(window.view().iter())
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum();
                -(sq / n) / self.temperature
            })
            .collect();
        softmax(&logits)
    }

    fn class_names(&self) -> Option<&[String]> {
        if self.classes.is_empty() {
            None
        } else {
            Some(&self.classes)
        }
    }
}

/// Numerically stable softmax
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f32 = exps.iter().sum();
    if total > 0.0 && total.is_finite() {
        exps.into_iter().map(|e| e / total).collect()
    } else {
        vec![1.0 / logits.len().max(1) as f32; logits.len()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    fn constant_window(shape: WindowShape, value: f32) -> SequenceWindow {
        SequenceWindow::from_array(Array2::from_elem(shape.as_tuple(), value))
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_softmax_handles_large_logits() {
        let probs = softmax(&[1000.0, -1000.0]);
        assert!((probs[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_fit_and_predict_nearest_class() {
        let shape = WindowShape::new(4, 6);
        let low = constant_window(shape, 0.1);
        let high = constant_window(shape, 0.9);
        let model = CentroidModel::fit(shape, 2, DEFAULT_TEMPERATURE, vec![(0, &low), (1, &high)]).unwrap();

        assert_eq!(model.input_shape(), shape);
        assert_eq!(model.output_dim(), 2);

        let probs = model.predict_proba(&constant_window(shape, 0.85));
        assert!(probs[1] > 0.9, "probs = {:?}", probs);
        let total: f32 = probs.iter().sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_fit_rejects_class_without_samples() {
        let shape = WindowShape::new(2, 2);
        let w = constant_window(shape, 0.5);
        let err = CentroidModel::fit(shape, 2, DEFAULT_TEMPERATURE, vec![(0, &w)]).unwrap_err();
        assert!(matches!(err, crate::Error::InsufficientData(_)));
    }

    #[test]
    fn test_fit_rejects_wrong_shape() {
        let shape = WindowShape::new(2, 2);
        let w = constant_window(WindowShape::new(3, 2), 0.5);
        assert!(CentroidModel::fit(shape, 1, DEFAULT_TEMPERATURE, vec![(0, &w)]).is_err());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_model.json");
        let shape = WindowShape::new(2, 3);
        let w = constant_window(shape, 0.25);
        let model = CentroidModel::fit(shape, 1, 0.5, vec![(0, &w)]).unwrap();
        model.save(&path).unwrap();
        assert_eq!(CentroidModel::load(&path).unwrap(), model);
    }

    #[test]
    fn test_load_inconsistent_model_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{"frames": 2, "features": 2, "temperature": 0.1, "centroids": [[0.0, 0.0, 0.0]]}"#,
        )
        .unwrap();
        assert!(matches!(
            CentroidModel::load(&path),
            Err(crate::Error::ArtifactIntegrity(_))
        ));
    }

    #[test]
    fn test_load_oversized_shape_is_integrity_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let json = format!(
            r#"{{"frames": {}, "features": 4, "temperature": 0.1, "centroids": [[0.0]]}}"#,
            usize::MAX
        );
        std::fs::write(&path, json).unwrap();
        let err = CentroidModel::load(&path).unwrap_err();
        assert!(matches!(err, crate::Error::ArtifactIntegrity(ref m) if m.contains("too large")));
    }

    #[test]
    fn test_class_names_survive_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gesture_model.json");
        let shape = WindowShape::new(2, 2);
        let (a, b) = (constant_window(shape, 0.1), constant_window(shape, 0.9));
        let model = CentroidModel::fit(shape, 2, DEFAULT_TEMPERATURE, vec![(0, &a), (1, &b)]).unwrap();
        assert!(model.class_names().is_none());
        assert!(model.clone().with_classes(&["only".to_string()]).is_err());

        let named = model.with_classes(&["bye".to_string(), "hello".to_string()]).unwrap();
        named.save(&path).unwrap();
        let loaded = CentroidModel::load(&path).unwrap();
        assert_eq!(loaded.class_names(), Some(&["bye".to_string(), "hello".to_string()][..]));
    }
}
