//! Training pipeline
//!
//! Scan, admit, split, fit, evaluate, write. The admission check runs before
//! any sample is loaded for training, so an undersized corpus fails with
//! `InsufficientData` and no artifacts are touched.

use super::metrics::ConfusionMatrix;
use super::split::{stratified_split, SplitFractions};
use crate::capture::{SequenceWindow, WindowShape};
use crate::classifier::{write_artifacts, CentroidModel, Classifier, GestureClassCatalog, DEFAULT_TEMPERATURE};
use crate::dataset::{read_window, AdmissionPolicy, Corpus, DatasetValidator};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Training parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingOptions {
    pub shape: WindowShape,
    pub policy: AdmissionPolicy,
    pub fractions: SplitFractions,
    pub seed: u64,
    pub temperature: f32,
}

impl Default for TrainingOptions {
    fn default() -> Self {
        Self {
            shape: WindowShape::default(),
            policy: AdmissionPolicy::default(),
            fractions: SplitFractions::default(),
            seed: 42,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Outcome of a training run
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingReport {
    /// Catalog order
    pub classes: Vec<String>,
    /// Classes left out for having too few samples
    pub excluded: Vec<(String, usize)>,
    /// Corrupt files skipped by the scan
    pub corrupt_skipped: usize,
    pub train_samples: usize,
    pub val_samples: usize,
    pub test_samples: usize,
    pub validation: ConfusionMatrix,
    pub test: ConfusionMatrix,
    pub model_path: PathBuf,
    pub catalog_path: PathBuf,
}

/// Produces a model/catalog pair from a corpus
#[derive(Debug, Clone)]
pub struct TrainingPipeline {
    corpus: Corpus,
    options: TrainingOptions,
}

impl TrainingPipeline {
    pub fn new(corpus: Corpus, options: TrainingOptions) -> Self {
        Self { corpus, options }
    }

    pub fn options(&self) -> &TrainingOptions {
        &self.options
    }

    pub fn run(&self, model_path: &Path, catalog_path: &Path) -> crate::Result<TrainingReport> {
        self.options.fractions.validate()?;
        let shape = self.options.shape;
        let validator = DatasetValidator::new(self.corpus.clone(), shape).with_policy(self.options.policy);

        let scan = validator.scan()?;
        if !scan.is_clean() {
            warn!(corrupt = scan.corrupt.len(), "Skipping corrupt samples; run `validate --quarantine` to move them");
        }
        let admission = validator.ensure_trainable(&scan)?;
        let catalog = GestureClassCatalog::from_labels(admission.eligible.iter().cloned())?;

        let mut samples: Vec<(usize, SequenceWindow)> = Vec::with_capacity(admission.total_valid);
        for (index, class) in catalog.classes().iter().enumerate() {
            for path in scan.valid.get(class).into_iter().flatten() {
                match read_window(path) {
                    Ok(window) if window.shape() == shape => samples.push((index, window)),
                    Ok(window) => warn!(path = ?path, shape = %window.shape(), "sample changed since scan, skipping"),
                    Err(e) => warn!(path = ?path, error = %e, "sample unreadable since scan, skipping"),
                }
            }
        }
        info!(classes = catalog.len(), samples = samples.len(), "Loaded training samples");

        let split = stratified_split(samples, self.options.fractions, self.options.seed);
        info!(
            train = split.train.len(),
            val = split.val.len(),
            test = split.test.len(),
            "Split dataset"
        );

        let model = CentroidModel::fit(
            shape,
            catalog.len(),
            self.options.temperature,
            split.train.iter().map(|(class, window)| (*class, window)),
        )?;
        let classifier = Classifier::from_parts(Box::new(model.clone()), catalog.clone())?;

        let validation = evaluate(&classifier, &split.val)?;
        let test = evaluate(&classifier, &split.test)?;
        if let Some(acc) = validation.accuracy() {
            info!(accuracy = acc, "Validation accuracy");
        }
        if let Some(acc) = test.accuracy() {
            info!(accuracy = acc, "Test accuracy");
        }

        write_artifacts(&model, &catalog, model_path, catalog_path)?;

        Ok(TrainingReport {
            classes: catalog.classes().to_vec(),
            excluded: admission.excluded,
            corrupt_skipped: scan.corrupt.len(),
            train_samples: split.train.len(),
            val_samples: split.val.len(),
            test_samples: split.test.len(),
            validation,
            test,
            model_path: model_path.to_path_buf(),
            catalog_path: catalog_path.to_path_buf(),
        })
    }
}

/// Confusion matrix of `classifier` over labeled windows
pub fn evaluate(classifier: &Classifier, samples: &[(usize, SequenceWindow)]) -> crate::Result<ConfusionMatrix> {
    let catalog = classifier.catalog();
    let mut matrix = ConfusionMatrix::new(catalog.classes().to_vec());
    for (actual, window) in samples {
        let top = classifier.predict_top(window)?;
        if let Some(predicted) = catalog.index_of(&top.label) {
            matrix.record(*actual, predicted);
        }
    }
    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    const SHAPE: WindowShape = WindowShape::new(3, 6);

    fn write(root: &Path, class: &str, i: usize, value: f32) {
        let dir = root.join(class);
        std::fs::create_dir_all(&dir).unwrap();
        let data = Array2::<f32>::from_elem(SHAPE.as_tuple(), value + i as f32 * 0.001);
        ndarray_npy::write_npy(dir.join(format!("{}_{}.npy", class, i)), &data).unwrap();
    }

    fn options() -> TrainingOptions {
        TrainingOptions {
            shape: SHAPE,
            ..TrainingOptions::default()
        }
    }

    #[test]
    fn test_insufficient_data_fails_before_writing() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            write(dir.path(), "hello", i, 0.8);
        }
        write(dir.path(), "bye", 0, 0.2);
        let model_path = dir.path().join("out").join("model.json");
        let catalog_path = dir.path().join("out").join("catalog.json");

        let err = TrainingPipeline::new(Corpus::new(dir.path()), options())
            .run(&model_path, &catalog_path)
            .unwrap_err();
        assert!(matches!(err, crate::Error::InsufficientData(_)));
        assert!(!model_path.exists());
        assert!(!catalog_path.exists());
    }

    #[test]
    fn test_trains_and_writes_loadable_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..10 {
            write(dir.path(), "hello", i, 0.8);
            write(dir.path(), "bye", i, 0.2);
        }
        write(dir.path(), "maybe", 0, 0.5);
        let model_path = dir.path().join("artifacts").join("gesture_model.json");
        let catalog_path = dir.path().join("artifacts").join("label_catalog.json");

        let report = TrainingPipeline::new(Corpus::new(dir.path()), options())
            .run(&model_path, &catalog_path)
            .unwrap();
        assert_eq!(report.classes, vec!["bye", "hello"]);
        assert_eq!(report.excluded, vec![("maybe".to_string(), 1)]);
        assert_eq!(report.train_samples + report.val_samples + report.test_samples, 20);
        assert_eq!(report.test.accuracy(), Some(1.0));

        let classifier = Classifier::load(&model_path, &catalog_path).unwrap();
        assert_eq!(classifier.input_shape(), SHAPE);
    }

    #[test]
    fn test_corrupt_samples_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..3 {
            write(dir.path(), "hello", i, 0.8);
            write(dir.path(), "bye", i, 0.2);
        }
        std::fs::write(dir.path().join("bye").join("broken.npy"), "garbage").unwrap();

        let report = TrainingPipeline::new(Corpus::new(dir.path()), options())
            .run(&dir.path().join("m.json"), &dir.path().join("c.json"))
            .unwrap();
        assert_eq!(report.corrupt_skipped, 1);
        assert_eq!(report.train_samples + report.val_samples + report.test_samples, 6);
    }
}
