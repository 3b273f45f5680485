//! Classifier configuration.
//!
//! A [`ClassifierConfig`] collects everything a training or inference run
//! needs: where the data and the model live, how text is featurized, which
//! trainer to use and the random seed. It can be loaded from a JSON file;
//! every field is optional and falls back to its default.
//!
//! ```json
//! {
//!   "data": { "train_path": "data/train.csv", "separator": ";" },
//!   "trainer": { "kind": "light_gbm", "booster": { "type": "dart", "tree_drop_fraction": 0.15 } },
//!   "seed": 42
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::loader::{CsvLoader, DEFAULT_SEPARATOR};
use crate::error::{QuillonError, Result};
use crate::ml::trainers::TrainerOptions;
use crate::ml::transforms::TextFeaturizerOptions;

/// Data and model locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub train_path: PathBuf,
    pub test_path: PathBuf,
    pub model_path: PathBuf,
    /// Field separator of the data files.
    pub separator: char,
    /// Whether the data files start with a header row.
    pub has_header: bool,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            train_path: PathBuf::from("data/asi_train_set.csv"),
            test_path: PathBuf::from("data/asi_test_set.csv"),
            model_path: PathBuf::from("models/asi_sdca_model.bin"),
            separator: DEFAULT_SEPARATOR,
            has_header: true,
        }
    }
}

impl DataConfig {
    /// A loader for the configured dialect.
    pub fn loader(&self) -> Result<CsvLoader> {
        Ok(CsvLoader::new()
            .with_delimiter(self.separator)?
            .with_header(self.has_header))
    }
}

/// Configuration of a classifier run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    pub data: DataConfig,
    pub featurizer: TextFeaturizerOptions,
    pub trainer: TrainerOptions,
    /// Random seed; a fresh one is drawn when absent.
    pub seed: Option<u64>,
    /// Fraction of the training data held out for evaluation.
    pub holdout_fraction: f64,
}

impl ClassifierConfig {
    /// Load a JSON config. Relative paths are resolved against the directory
    /// of the config file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            QuillonError::invalid_config(format!("cannot read {}: {e}", path.display()))
        })?;
        let mut config: ClassifierConfig = serde_json::from_str(&content)?;

        if let Some(base) = path.parent() {
            config.resolve_paths(base);
        }
        config.validate()?;

        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    /// Make relative data and model paths relative to `base`.
    pub fn resolve_paths(&mut self, base: &Path) {
        for path in [
            &mut self.data.train_path,
            &mut self.data.test_path,
            &mut self.data.model_path,
        ] {
            if path.is_relative() {
                *path = base.join(&*path);
            }
        }
    }

    /// Check the configuration for values that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.data.separator == '\0' || !self.data.separator.is_ascii() {
            return Err(QuillonError::invalid_config(format!(
                "separator must be a non-NUL ASCII character, got {:?}",
                self.data.separator
            )));
        }
        if !(0.0..1.0).contains(&self.holdout_fraction) {
            return Err(QuillonError::invalid_config(format!(
                "holdout_fraction must be in [0, 1), got {}",
                self.holdout_fraction
            )));
        }
        self.featurizer.validate()?;
        self.trainer.validate()?;
        Ok(())
    }

    /// The configured seed, or a freshly drawn one.
    pub fn seed_or_random(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainers::Booster;

    #[test]
    fn test_defaults() {
        let config = ClassifierConfig::default();
        assert_eq!(config.data.separator, ';');
        assert!(config.data.has_header);
        assert_eq!(
            config.data.model_path,
            PathBuf::from("models/asi_sdca_model.bin")
        );
        assert_eq!(config.trainer.name(), "maximum_entropy");
        assert_eq!(config.holdout_fraction, 0.0);
        config.validate().unwrap();
    }

    #[test]
    fn test_from_file_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quillon.json");
        fs::write(
            &path,
            r#"{
                "data": { "train_path": "train.csv", "model_path": "/abs/model.bin" },
                "trainer": { "kind": "light_gbm" },
                "seed": 7
            }"#,
        )
        .unwrap();

        let config = ClassifierConfig::from_file(&path).unwrap();
        assert_eq!(config.data.train_path, dir.path().join("train.csv"));
        assert_eq!(config.data.model_path, PathBuf::from("/abs/model.bin"));
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.seed_or_random(), 7);
        match config.trainer {
            TrainerOptions::LightGbm(options) => {
                assert!(matches!(options.booster, Booster::Dart(_)))
            }
            other => panic!("unexpected trainer {other:?}"),
        }
    }

    #[test]
    fn test_validation() {
        let mut config = ClassifierConfig::default();
        config.holdout_fraction = 1.0;
        assert!(config.validate().is_err());

        let mut config = ClassifierConfig::default();
        config.data.separator = '\0';
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unreadable_file() {
        let err = ClassifierConfig::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, QuillonError::InvalidConfig(_)));
    }
}
