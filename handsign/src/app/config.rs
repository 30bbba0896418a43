//! Configuration Management

use crate::capture::{FeatureLayout, WindowShape, DEFAULT_MAX_HANDS, DEFAULT_SEQUENCE_LENGTH, LANDMARKS_PER_HAND};
use crate::classifier::http_retry::RetryPolicy;
use crate::classifier::{RemoteSettings, DEFAULT_TEMPERATURE};
use crate::dataset::{AdmissionPolicy, Corpus, DEFAULT_EXTENSION, DEFAULT_QUARANTINE_DIR};
use crate::recognition::{Pace, RecognitionSettings, SessionOptions};
use crate::training::{SplitFractions, TrainingOptions};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Valid window lengths
pub const SEQUENCE_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 10..=90;

/// Main configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Feature layout and window length
    #[serde(default)]
    pub pipeline: PipelineConfig,
    /// Live recognition and recording
    #[serde(default)]
    pub recognition: RecognitionConfig,
    /// Corpus location and admission policy
    #[serde(default)]
    pub dataset: DatasetConfig,
    /// Model and catalog locations
    #[serde(default)]
    pub artifacts: ArtifactsConfig,
    /// Remote inference endpoint
    #[serde(default)]
    pub remote: RemoteConfig,
    /// Training job
    #[serde(default)]
    pub training: TrainingConfig,
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Hands encoded per frame
    pub max_hands: usize,
    /// Landmarks per hand
    pub landmarks_per_hand: usize,
    /// Frames per window
    pub sequence_length: usize,
}

/// Recognition configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    /// Minimum top-1 confidence (0..1) for a label change
    pub confidence_threshold: f32,
    /// Countdown before a one-shot recording (seconds)
    pub countdown_secs: u64,
    /// Time between frame ticks (ms)
    pub tick_interval_ms: u64,
    /// Consecutive capture failures before a device error is reported
    pub max_consecutive_device_failures: u32,
    /// Speak label changes
    pub speech: bool,
    /// External text-to-speech command, e.g. "espeak"; logs only when unset
    pub speech_command: Option<String>,
}

/// Dataset configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Corpus root
    pub root: PathBuf,
    /// Quarantine subdirectory name
    pub quarantine_dir: String,
    /// Sample file extension
    pub extension: String,
    pub min_samples_per_class: usize,
    pub min_classes: usize,
    pub min_total_samples: usize,
}

/// Artifact configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactsConfig {
    pub model_path: PathBuf,
    pub catalog_path: PathBuf,
}

/// Remote endpoint configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Predict URL; local model when unset
    pub endpoint: Option<String>,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

/// Training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub test_fraction: f64,
    pub val_fraction: f64,
    pub seed: u64,
    /// Softmax temperature of the centroid model
    pub temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_hands: DEFAULT_MAX_HANDS,
            landmarks_per_hand: LANDMARKS_PER_HAND,
            sequence_length: DEFAULT_SEQUENCE_LENGTH,
        }
    }
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            countdown_secs: 3,
            tick_interval_ms: 15,
            max_consecutive_device_failures: 60,
            speech: true,
            speech_command: None,
        }
    }
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("dataset"),
            quarantine_dir: DEFAULT_QUARANTINE_DIR.to_string(),
            extension: DEFAULT_EXTENSION.to_string(),
            min_samples_per_class: 2,
            min_classes: 2,
            min_total_samples: 4,
        }
    }
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            model_path: PathBuf::from("artifacts/gesture_model.json"),
            catalog_path: PathBuf::from("artifacts/label_catalog.json"),
        }
    }
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            timeout_ms: 2000,
            max_retries: 3,
        }
    }
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.15,
            val_fraction: 0.15,
            seed: 42,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl Config {
    /// Validate config values are within acceptable ranges.
    /// Returns Ok(()) if valid, or Err with a description of the first invalid field.
    pub fn validate(&self) -> Result<(), crate::Error> {
        if self.pipeline.max_hands == 0 {
            return Err(crate::Error::Config("max_hands must be > 0".to_string()));
        }
        if self.pipeline.landmarks_per_hand == 0 {
            return Err(crate::Error::Config("landmarks_per_hand must be > 0".to_string()));
        }
        if !SEQUENCE_LENGTH_RANGE.contains(&self.pipeline.sequence_length) {
            return Err(crate::Error::Config(format!(
                "sequence_length must be in [{}, {}], got {}",
                SEQUENCE_LENGTH_RANGE.start(),
                SEQUENCE_LENGTH_RANGE.end(),
                self.pipeline.sequence_length
            )));
        }
        if !(0.0..=1.0).contains(&self.recognition.confidence_threshold) {
            return Err(crate::Error::Config(format!(
                "confidence_threshold must be in [0, 1], got {}", self.recognition.confidence_threshold
            )));
        }
        if self.recognition.tick_interval_ms == 0 {
            return Err(crate::Error::Config("tick_interval_ms must be > 0".to_string()));
        }
        if self.recognition.max_consecutive_device_failures == 0 {
            return Err(crate::Error::Config("max_consecutive_device_failures must be > 0".to_string()));
        }
        if let Some(command) = &self.recognition.speech_command {
            if command.trim().is_empty() {
                return Err(crate::Error::Config("speech_command must not be empty when set".to_string()));
            }
        }
        let quarantine_dir = self.dataset.quarantine_dir.trim();
        if quarantine_dir.is_empty() || quarantine_dir.contains(['/', '\\']) || quarantine_dir.starts_with('.') {
            return Err(crate::Error::Config(format!(
                "quarantine_dir must be a plain directory name, got '{}'", self.dataset.quarantine_dir
            )));
        }
        if self.dataset.extension.trim_start_matches('.').is_empty() {
            return Err(crate::Error::Config("extension must not be empty".to_string()));
        }
        if self.dataset.min_samples_per_class == 0 || self.dataset.min_classes == 0 {
            return Err(crate::Error::Config(
                "min_samples_per_class and min_classes must be > 0".to_string(),
            ));
        }
        if self.artifacts.model_path == self.artifacts.catalog_path {
            return Err(crate::Error::Config("model_path and catalog_path must differ".to_string()));
        }
        if let Some(endpoint) = &self.remote.endpoint {
            if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
                return Err(crate::Error::Config(format!(
                    "remote endpoint must be an http(s) URL, got '{}'", endpoint
                )));
            }
        }
        if self.remote.timeout_ms == 0 {
            return Err(crate::Error::Config("timeout_ms must be > 0".to_string()));
        }
        self.split_fractions().validate()?;
        if self.training.temperature.is_nan() || self.training.temperature <= 0.0 {
            return Err(crate::Error::Config(format!(
                "temperature must be > 0, got {}", self.training.temperature
            )));
        }
        Ok(())
    }

    /// Load config from file
    pub fn load(path: &PathBuf) -> Result<Self, crate::Error> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content).map_err(|e| crate::Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from default location
    pub fn load_default() -> Result<Self, crate::Error> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &PathBuf) -> Result<(), crate::Error> {
        let content = self.to_toml()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Save to default location
    pub fn save_default(&self) -> Result<(), crate::Error> {
        self.save(&Self::default_path())
    }

    /// Get default config path
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|h| h.join(".handsign").join("config.toml"))
            .unwrap_or_else(|| PathBuf::from("config.toml"))
    }

    /// Generate TOML representation
    pub fn to_toml(&self) -> Result<String, crate::Error> {
        toml::to_string_pretty(self).map_err(|e| crate::Error::Config(e.to_string()))
    }

    /// Look up a value by dotted key, e.g. `recognition.confidence_threshold`
    pub fn get_value(&self, key: &str) -> Result<Option<toml::Value>, crate::Error> {
        let mut current = toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        for part in key.split('.') {
            match current.get(part) {
                Some(next) => current = next.clone(),
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    /// Copy of this config with one dotted key replaced.
    ///
    /// `value` is parsed as a TOML literal and falls back to a plain string.
    /// Unknown keys and values that fail validation are rejected.
    pub fn with_value(&self, key: &str, value: &str) -> Result<Self, crate::Error> {
        let parsed = toml::from_str::<toml::Table>(&format!("v = {}", value))
            .ok()
            .and_then(|mut t| t.remove("v"))
            .unwrap_or_else(|| toml::Value::String(value.to_string()));

        let mut root = toml::Value::try_from(self).map_err(|e| crate::Error::Config(e.to_string()))?;
        let parts: Vec<&str> = key.split('.').collect();
        let (leaf, sections) = parts
            .split_last()
            .ok_or_else(|| crate::Error::Config("empty configuration key".to_string()))?;

        let mut table = root
            .as_table_mut()
            .ok_or_else(|| crate::Error::Config("configuration is not a table".to_string()))?;
        for section in sections {
            table = table
                .get_mut(*section)
                .and_then(toml::Value::as_table_mut)
                .ok_or_else(|| crate::Error::Config(format!("unknown configuration section '{}'", section)))?;
        }
        if !table.contains_key(*leaf) && !Self::is_optional_key(key) {
            return Err(crate::Error::Config(format!("unknown configuration key '{}'", key)));
        }
        table.insert((*leaf).to_string(), parsed);

        let updated: Self = root.try_into().map_err(|e: toml::de::Error| crate::Error::Config(e.to_string()))?;
        updated.validate()?;
        Ok(updated)
    }

    /// Keys that are omitted from the TOML output while unset
    fn is_optional_key(key: &str) -> bool {
        matches!(key, "remote.endpoint" | "recognition.speech_command")
    }

    pub fn feature_layout(&self) -> FeatureLayout {
        FeatureLayout::new(self.pipeline.max_hands, self.pipeline.landmarks_per_hand)
    }

    pub fn window_shape(&self) -> WindowShape {
        WindowShape::for_layout(self.feature_layout(), self.pipeline.sequence_length)
    }

    pub fn recognition_settings(&self) -> RecognitionSettings {
        RecognitionSettings::new(self.feature_layout(), self.pipeline.sequence_length)
            .with_threshold(self.recognition.confidence_threshold)
            .with_countdown(Duration::from_secs(self.recognition.countdown_secs))
    }

    pub fn session_options(&self, pace: Pace) -> SessionOptions {
        SessionOptions {
            tick_interval: Duration::from_millis(self.recognition.tick_interval_ms),
            max_consecutive_failures: self.recognition.max_consecutive_device_failures,
            pace,
        }
    }

    pub fn corpus(&self) -> Corpus {
        Corpus::new(&self.dataset.root)
            .with_quarantine_dir(&self.dataset.quarantine_dir)
            .with_extension(&self.dataset.extension)
    }

    pub fn admission_policy(&self) -> AdmissionPolicy {
        AdmissionPolicy {
            min_samples_per_class: self.dataset.min_samples_per_class,
            min_classes: self.dataset.min_classes,
            min_total_samples: self.dataset.min_total_samples,
        }
    }

    pub fn split_fractions(&self) -> SplitFractions {
        SplitFractions {
            test: self.training.test_fraction,
            val: self.training.val_fraction,
        }
    }

    pub fn training_options(&self) -> TrainingOptions {
        TrainingOptions {
            shape: self.window_shape(),
            policy: self.admission_policy(),
            fractions: self.split_fractions(),
            seed: self.training.seed,
            temperature: self.training.temperature,
        }
    }

    /// Remote classifier settings, if an endpoint is configured
    pub fn remote_settings(&self) -> Option<RemoteSettings> {
        let endpoint = self.remote.endpoint.clone()?;
        Some(RemoteSettings {
            endpoint,
            timeout: Duration::from_millis(self.remote.timeout_ms),
            retry: RetryPolicy {
                max_retries: self.remote.max_retries.max(1),
                ..RetryPolicy::default()
            },
            input_shape: self.window_shape(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.pipeline.sequence_length, 30);
        assert_eq!(config.window_shape(), WindowShape::new(30, 126));
        assert_eq!(config.recognition.confidence_threshold, 0.5);
    }

    #[test]
    fn test_config_serialization() {
        let config = Config::default();
        let toml = config.to_toml().unwrap();
        assert!(toml.contains("[pipeline]"));
        assert!(toml.contains("[recognition]"));
        assert!(toml.contains("[dataset]"));
        assert!(toml.contains("[artifacts]"));
    }

    #[test]
    fn test_default_path() {
        let path = Config::default_path();
        assert!(path.to_string_lossy().contains(".handsign"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }

    #[test]
    fn test_dataset_config_defaults() {
        let dataset = DatasetConfig::default();
        assert_eq!(dataset.root, PathBuf::from("dataset"));
        assert_eq!(dataset.quarantine_dir, "_corrupted");
        assert_eq!(dataset.extension, "npy");
        assert_eq!(dataset.min_samples_per_class, 2);
        assert_eq!(dataset.min_classes, 2);
        assert_eq!(dataset.min_total_samples, 4);
    }

    #[test]
    fn test_training_config_defaults() {
        let training = TrainingConfig::default();
        assert_eq!(training.test_fraction, 0.15);
        assert_eq!(training.val_fraction, 0.15);
        assert_eq!(training.seed, 42);
    }

    #[test]
    fn test_config_roundtrip_serialization() {
        let mut original = Config::default();
        original.remote.endpoint = Some("http://127.0.0.1:5000/predict".to_string());
        original.recognition.speech_command = Some("espeak".to_string());
        let toml_str = original.to_toml().unwrap();
        let deserialized: Config = toml::from_str(&toml_str).expect("Failed to deserialize");
        assert_eq!(original, deserialized);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str("[pipeline]\nsequence_length = 45\n").unwrap();
        assert_eq!(config.pipeline.sequence_length, 45);
        assert_eq!(config.pipeline.max_hands, 2);
        assert_eq!(config.dataset, DatasetConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_and_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("config.toml");

        let mut original = Config::default();
        original.pipeline.sequence_length = 60;
        original.recognition.confidence_threshold = 0.7;

        original.save(&config_path).expect("Failed to save config");
        let loaded = Config::load(&config_path).expect("Failed to load config");
        assert_eq!(loaded.pipeline.sequence_length, 60);
        assert_eq!(loaded.recognition.confidence_threshold, 0.7);
    }

    #[test]
    fn test_load_nonexistent_file() {
        let nonexistent_path = PathBuf::from("/tmp/nonexistent_handsign_config_12345.toml");
        assert!(Config::load(&nonexistent_path).is_err());
    }

    #[test]
    fn test_load_rejects_invalid_values() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[pipeline]\nsequence_length = 5\n").unwrap();
        assert!(matches!(Config::load(&path), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_validate_default_config() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_validate_sequence_length_bounds() {
        let mut config = Config::default();
        config.pipeline.sequence_length = 10;
        assert!(config.validate().is_ok());
        config.pipeline.sequence_length = 90;
        assert!(config.validate().is_ok());
        config.pipeline.sequence_length = 91;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.recognition.confidence_threshold = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_quarantine_dir_is_plain_name() {
        let mut config = Config::default();
        config.dataset.quarantine_dir = "a/b".to_string();
        assert!(config.validate().is_err());

        for name in [".", "..", ".hidden", " "] {
            config.dataset.quarantine_dir = name.to_string();
            assert!(
                matches!(config.validate(), Err(crate::Error::Config(_))),
                "quarantine_dir '{}' should be rejected",
                name
            );
        }

        config.dataset.quarantine_dir = "bad_samples".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_remote_endpoint_scheme() {
        let mut config = Config::default();
        config.remote.endpoint = Some("localhost:5000".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_split_fractions() {
        let mut config = Config::default();
        config.training.test_fraction = 0.6;
        config.training.val_fraction = 0.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_same_artifact_paths() {
        let mut config = Config::default();
        config.artifacts.catalog_path = config.artifacts.model_path.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_get_value_by_dotted_key() {
        let config = Config::default();
        let value = config.get_value("pipeline.sequence_length").unwrap();
        assert_eq!(value, Some(toml::Value::Integer(30)));
        assert_eq!(config.get_value("pipeline.missing").unwrap(), None);
        assert!(config.get_value("dataset").unwrap().unwrap().is_table());
    }

    #[test]
    fn test_with_value_updates_and_validates() {
        let config = Config::default();
        let updated = config.with_value("recognition.confidence_threshold", "0.8").unwrap();
        assert_eq!(updated.recognition.confidence_threshold, 0.8);

        let updated = config.with_value("dataset.root", "/data/gestures").unwrap();
        assert_eq!(updated.dataset.root, PathBuf::from("/data/gestures"));

        let updated = config.with_value("remote.endpoint", "http://localhost:5000/predict").unwrap();
        assert_eq!(updated.remote.endpoint.as_deref(), Some("http://localhost:5000/predict"));

        assert!(config.with_value("pipeline.sequence_length", "200").is_err());
        assert!(config.with_value("pipeline.unknown", "1").is_err());
        assert!(config.with_value("nosuch.key", "1").is_err());
    }

    #[test]
    fn test_derived_settings() {
        let mut config = Config::default();
        config.recognition.countdown_secs = 5;
        let settings = config.recognition_settings();
        assert_eq!(settings.countdown, Duration::from_secs(5));
        assert_eq!(settings.window_shape(), WindowShape::new(30, 126));

        let corpus = config.corpus();
        assert_eq!(corpus.quarantine_dir_name(), "_corrupted");
        assert!(config.remote_settings().is_none());

        config.remote.endpoint = Some("http://localhost:5000/predict".to_string());
        let remote = config.remote_settings().unwrap();
        assert_eq!(remote.retry.max_retries, 3);
        assert_eq!(remote.input_shape, WindowShape::new(30, 126));
    }
}
