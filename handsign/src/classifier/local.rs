//! Local classifier
//!
//! Pairs a model with its catalog. Construction either yields a complete,
//! consistent classifier or fails with `ArtifactIntegrity`; there is no
//! partially loaded state.

use super::artifact::{discard_staged, publish};
use super::catalog::GestureClassCatalog;
use super::model::{CentroidModel, SequenceModel};
use super::{ClassificationResult, SequenceClassifier};
use crate::capture::{SequenceWindow, WindowShape};
use std::path::Path;
use tracing::{debug, info};

/// Trained model plus class catalog, read-only after load
pub struct Classifier {
    model: Box<dyn SequenceModel>,
    catalog: GestureClassCatalog,
}

impl Classifier {
    /// Load the model and catalog artifacts together.
    ///
    /// Fails if either file is missing or unreadable, or if the catalog does
    /// not list the classes the model was trained with.
    pub fn load(model_path: &Path, catalog_path: &Path) -> crate::Result<Self> {
        let model = CentroidModel::load(model_path)?;
        let catalog = GestureClassCatalog::load(catalog_path)?;
        let classifier = Self::from_parts(Box::new(model), catalog)?;
        info!(
            model = ?model_path,
            classes = classifier.catalog.len(),
            shape = %classifier.input_shape(),
            "Loaded classifier"
        );
        Ok(classifier)
    }

    /// Pair an in-memory model with a catalog
    pub fn from_parts(model: Box<dyn SequenceModel>, catalog: GestureClassCatalog) -> crate::Result<Self> {
        if model.output_dim() != catalog.len() {
            return Err(crate::Error::ArtifactIntegrity(format!(
                "catalog has {} classes but the model produces {} outputs",
                catalog.len(),
                model.output_dim()
            )));
        }
        if let Some(names) = model.class_names() {
            if names != catalog.classes() {
                return Err(crate::Error::ArtifactIntegrity(format!(
                    "catalog classes {:?} do not match the model's classes {:?}",
                    catalog.classes(),
                    names
                )));
            }
        }
        Ok(Self { model, catalog })
    }

    pub fn input_shape(&self) -> WindowShape {
        self.model.input_shape()
    }

    pub fn catalog(&self) -> &GestureClassCatalog {
        &self.catalog
    }

    /// Classify one window. Every class is returned, ranked by confidence.
    pub fn predict(&self, window: &SequenceWindow) -> crate::Result<Vec<ClassificationResult>> {
        window.ensure_shape(self.input_shape())?;

        let probs = self.model.predict_proba(window);
        let mut results: Vec<ClassificationResult> = self
            .catalog
            .classes()
            .iter()
            .zip(probs)
            .map(|(name, p)| ClassificationResult::new(name.clone(), p))
            .collect();
        results.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));

        if let Some(top) = results.first() {
            debug!(label = %top.label, confidence = top.confidence, "prediction");
        }
        Ok(results)
    }

    /// Top-1 prediction
    pub fn predict_top(&self, window: &SequenceWindow) -> crate::Result<ClassificationResult> {
        self.predict(window)?
            .into_iter()
            .next()
            .ok_or_else(|| crate::Error::ArtifactIntegrity("classifier has no classes".to_string()))
    }
}

impl SequenceClassifier for Classifier {
    fn input_shape(&self) -> WindowShape {
        Classifier::input_shape(self)
    }

    fn classify(&self, window: &SequenceWindow) -> crate::Result<Vec<ClassificationResult>> {
        self.predict(window)
    }
}

impl std::fmt::Debug for Classifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Classifier")
            .field("input_shape", &self.input_shape())
            .field("classes", &self.catalog.classes())
            .finish()
    }
}

/// Write a model/catalog pair.
///
/// The model records the catalog's class names, so a model published next to
/// a catalog from another run fails to load. Both files are staged before
/// either is renamed into place, and staged files are removed on failure.
pub fn write_artifacts(
    model: &CentroidModel,
    catalog: &GestureClassCatalog,
    model_path: &Path,
    catalog_path: &Path,
) -> crate::Result<()> {
    if model.output_dim() != catalog.len() {
        return Err(crate::Error::ArtifactIntegrity(format!(
            "refusing to write {} classes for a model with {} outputs",
            catalog.len(),
            model.output_dim()
        )));
    }
    let model = model.clone().with_classes(catalog.classes())?;
    let written = model
        .stage(model_path)
        .and_then(|_| catalog.stage(catalog_path))
        .and_then(|_| publish(catalog_path))
        .and_then(|_| publish(model_path));
    if let Err(e) = written {
        discard_staged(model_path);
        discard_staged(catalog_path);
        return Err(e);
    }
    info!(model = ?model_path, catalog = ?catalog_path, "Wrote model artifacts");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::model::DEFAULT_TEMPERATURE;
    use ndarray::Array2;

    fn window(shape: WindowShape, value: f32) -> SequenceWindow {
        SequenceWindow::from_array(Array2::from_elem(shape.as_tuple(), value))
    }

    fn two_class_model(shape: WindowShape) -> CentroidModel {
        let a = window(shape, 0.2);
        let b = window(shape, 0.8);
        CentroidModel::fit(shape, 2, DEFAULT_TEMPERATURE, vec![(0, &a), (1, &b)]).unwrap()
    }

    #[test]
    fn test_predict_ranks_all_classes() {
        let shape = WindowShape::new(5, 6);
        let catalog = GestureClassCatalog::from_labels(["bye", "hello"]).unwrap();
        let classifier = Classifier::from_parts(Box::new(two_class_model(shape)), catalog).unwrap();

        let results = classifier.predict(&window(shape, 0.75)).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].label, "hello");
        assert!(results[0].confidence >= results[1].confidence);
        let total: f32 = results.iter().map(|r| r.confidence).sum();
        assert!((total - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_predict_rejects_wrong_shape() {
        let shape = WindowShape::new(5, 6);
        let catalog = GestureClassCatalog::from_labels(["bye", "hello"]).unwrap();
        let classifier = Classifier::from_parts(Box::new(two_class_model(shape)), catalog).unwrap();

        let err = classifier.predict(&window(WindowShape::new(5, 4), 0.5)).unwrap_err();
        assert!(matches!(err, crate::Error::ShapeMismatch { .. }));
    }

    #[test]
    fn test_catalog_size_must_match_model() {
        let shape = WindowShape::new(2, 2);
        let catalog = GestureClassCatalog::from_labels(["a", "b", "c"]).unwrap();
        let err = Classifier::from_parts(Box::new(two_class_model(shape)), catalog).unwrap_err();
        assert!(matches!(err, crate::Error::ArtifactIntegrity(_)));
    }

    #[test]
    fn test_load_requires_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("gesture_model.json");
        let catalog_path = dir.path().join("label_catalog.json");
        two_class_model(WindowShape::new(2, 2)).save(&model_path).unwrap();

        let err = Classifier::load(&model_path, &catalog_path).unwrap_err();
        assert!(matches!(err, crate::Error::ArtifactIntegrity(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_write_artifacts_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("artifacts").join("gesture_model.json");
        let catalog_path = dir.path().join("artifacts").join("label_catalog.json");
        let shape = WindowShape::new(3, 6);
        let catalog = GestureClassCatalog::from_labels(["bye", "hello"]).unwrap();

        write_artifacts(&two_class_model(shape), &catalog, &model_path, &catalog_path).unwrap();
        let classifier = Classifier::load(&model_path, &catalog_path).unwrap();
        assert_eq!(classifier.input_shape(), shape);
        assert_eq!(classifier.catalog().classes(), &["bye", "hello"]);

        let top = classifier.predict_top(&window(shape, 0.2)).unwrap();
        assert_eq!(top.label, "bye");
    }

    #[test]
    fn test_write_artifacts_refuses_mismatched_pair() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("m.json");
        let catalog_path = dir.path().join("c.json");
        let catalog = GestureClassCatalog::from_labels(["only"]).unwrap();

        assert!(write_artifacts(&two_class_model(WindowShape::new(2, 2)), &catalog, &model_path, &catalog_path).is_err());
        assert!(!model_path.exists());
        assert!(!catalog_path.exists());
    }

    #[test]
    fn test_catalog_from_another_run_fails_to_load() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("gesture_model.json");
        let catalog_path = dir.path().join("label_catalog.json");
        let catalog = GestureClassCatalog::from_labels(["bye", "hello"]).unwrap();
        write_artifacts(&two_class_model(WindowShape::new(2, 2)), &catalog, &model_path, &catalog_path).unwrap();

        GestureClassCatalog::from_labels(["no", "yes"])
            .unwrap()
            .save(&catalog_path)
            .unwrap();
        let err = Classifier::load(&model_path, &catalog_path).unwrap_err();
        assert!(matches!(err, crate::Error::ArtifactIntegrity(ref m) if m.contains("do not match")));
    }

    #[test]
    fn test_failed_write_leaves_no_staged_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocker"), "not a directory").unwrap();
        let model_path = dir.path().join("m.json");
        let catalog_path = dir.path().join("blocker").join("c.json");
        let catalog = GestureClassCatalog::from_labels(["bye", "hello"]).unwrap();

        assert!(write_artifacts(&two_class_model(WindowShape::new(2, 2)), &catalog, &model_path, &catalog_path).is_err());
        let mut entries: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        entries.sort();
        assert_eq!(entries, vec!["blocker"]);
    }
}
