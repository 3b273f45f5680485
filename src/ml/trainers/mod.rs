//! Multiclass trainers and the predictor transform they produce.
//!
//! Four stock trainers are available, selected through [`TrainerOptions`]:
//!
//! - [`MaximumEntropyTrainer`]: L2-regularized multinomial logistic regression
//! - [`OneVersusAllTrainer`]: one binary logistic regression per class
//! - [`NaiveBayesTrainer`]: Bernoulli naive Bayes over present/absent features
//! - [`GbdtTrainer`]: softmax gradient-boosted trees with a GBDT or DART booster
//!
//! Every trainer is deterministic given its seed.

pub mod gbdt;
pub mod maximum_entropy;
pub mod naive_bayes;
pub mod one_versus_all;

pub use gbdt::{Booster, DartOptions, GbdtModel, GbdtOptions, GbdtTrainer};
pub use maximum_entropy::{LinearModel, MaximumEntropyOptions, MaximumEntropyTrainer};
pub use naive_bayes::{NaiveBayesModel, NaiveBayesOptions, NaiveBayesTrainer};
pub use one_versus_all::{
    LogisticRegressionOptions, OneVersusAllModel, OneVersusAllTrainer,
};

use std::time::Instant;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::data::view::{DataView, Value};
use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::schema::{Column, ColumnKind, Schema};
use crate::ml::transforms::Transformer;

/// Which trainer to use, with its options.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TrainerOptions {
    MaximumEntropy(MaximumEntropyOptions),
    OneVersusAll(LogisticRegressionOptions),
    NaiveBayes(NaiveBayesOptions),
    LightGbm(GbdtOptions),
}

impl Default for TrainerOptions {
    fn default() -> Self {
        TrainerOptions::MaximumEntropy(MaximumEntropyOptions::default())
    }
}

impl TrainerOptions {
    pub fn name(&self) -> &'static str {
        match self {
            TrainerOptions::MaximumEntropy(_) => "maximum_entropy",
            TrainerOptions::OneVersusAll(_) => "one_versus_all",
            TrainerOptions::NaiveBayes(_) => "naive_bayes",
            TrainerOptions::LightGbm(_) => "light_gbm",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            TrainerOptions::MaximumEntropy(options) => options.validate(),
            TrainerOptions::OneVersusAll(options) => options.validate(),
            TrainerOptions::NaiveBayes(options) => options.validate(),
            TrainerOptions::LightGbm(options) => options.validate(),
        }
    }

    /// Train the selected model.
    pub fn train(&self, data: &TrainingSet, seed: u64) -> Result<(TrainedModel, TrainingStats)> {
        let (model, stats) = match self {
            TrainerOptions::MaximumEntropy(options) => {
                let (model, stats) = MaximumEntropyTrainer::new(options.clone()).train(data, seed)?;
                (TrainedModel::MaximumEntropy(model), stats)
            }
            TrainerOptions::OneVersusAll(options) => {
                let (model, stats) = OneVersusAllTrainer::new(options.clone()).train(data, seed)?;
                (TrainedModel::OneVersusAll(model), stats)
            }
            TrainerOptions::NaiveBayes(options) => {
                let (model, stats) = NaiveBayesTrainer::new(options.clone()).train(data, seed)?;
                (TrainedModel::NaiveBayes(model), stats)
            }
            TrainerOptions::LightGbm(options) => {
                let (model, stats) = GbdtTrainer::new(options.clone()).train(data, seed)?;
                (TrainedModel::Gbdt(model), stats)
            }
        };
        Ok((model, stats))
    }
}

/// Trait for multiclass trainers.
pub trait Trainer {
    type Model: MulticlassModel;

    /// Train a model. The same data and seed always yield the same model.
    fn train(&self, data: &TrainingSet, seed: u64) -> Result<(Self::Model, TrainingStats)>;
}

/// Trait for trained multiclass models.
pub trait MulticlassModel: Send + Sync {
    /// Number of classes scored.
    fn num_classes(&self) -> usize;

    /// Per-class scores for one feature vector. Scores sum to 1.
    fn scores(&self, features: &SparseVector) -> Vec<f32>;
}

/// Training statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrainingStats {
    /// Training loss after each iteration.
    pub training_losses: Vec<f64>,
    /// Number of training iterations completed.
    pub iterations: usize,
    /// Final training loss.
    pub final_training_loss: f64,
    /// Whether training stopped before the iteration limit.
    pub early_stopped: bool,
}

impl TrainingStats {
    pub fn from_losses(training_losses: Vec<f64>, max_iterations: usize) -> Self {
        let iterations = training_losses.len();
        TrainingStats {
            final_training_loss: training_losses.last().copied().unwrap_or(0.0),
            early_stopped: iterations < max_iterations,
            iterations,
            training_losses,
        }
    }
}

/// Labelled feature vectors ready for a trainer.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub features: Vec<SparseVector>,
    pub labels: Vec<usize>,
    pub num_classes: usize,
    pub num_features: usize,
}

impl TrainingSet {
    /// Collect the rows of `data` that have a label key.
    pub fn from_view(data: &DataView, label: &str, features: &str) -> Result<Self> {
        let num_classes = match data.schema().require(label)?.kind {
            ColumnKind::Key { count } => count,
            ref other => {
                return Err(QuillonError::schema(format!(
                    "label column '{label}' is of kind {}, expected key",
                    other.name()
                )));
            }
        };
        let num_features = match data.schema().require(features)?.kind {
            ColumnKind::Vector { size } => size,
            ref other => {
                return Err(QuillonError::schema(format!(
                    "feature column '{features}' is of kind {}, expected vector",
                    other.name()
                )));
            }
        };

        let keys = data.keys(label)?;
        let vectors = data.vectors(features)?;

        let mut set = TrainingSet {
            features: Vec::with_capacity(keys.len()),
            labels: Vec::with_capacity(keys.len()),
            num_classes,
            num_features,
        };
        let mut skipped = 0usize;
        for (key, vector) in keys.into_iter().zip(vectors) {
            match key {
                Some(k) => {
                    set.labels.push(k as usize);
                    set.features.push(vector.clone());
                }
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!("Skipped {skipped} rows without a label");
        }

        Ok(set)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Fail unless there are at least `min_samples` rows and one class.
    pub fn ensure_trainable(&self, min_samples: usize) -> Result<()> {
        if self.len() < min_samples {
            return Err(QuillonError::insufficient_data(min_samples, self.len()));
        }
        if self.num_classes == 0 {
            return Err(QuillonError::training("label column has no classes"));
        }
        Ok(())
    }

    /// Number of rows per class.
    pub fn class_counts(&self) -> Vec<usize> {
        let mut counts = vec![0; self.num_classes];
        for &label in &self.labels {
            counts[label] += 1;
        }
        counts
    }
}

/// A trained model of any kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TrainedModel {
    MaximumEntropy(LinearModel),
    OneVersusAll(OneVersusAllModel),
    NaiveBayes(NaiveBayesModel),
    Gbdt(GbdtModel),
}

impl TrainedModel {
    fn inner(&self) -> &dyn MulticlassModel {
        match self {
            TrainedModel::MaximumEntropy(m) => m,
            TrainedModel::OneVersusAll(m) => m,
            TrainedModel::NaiveBayes(m) => m,
            TrainedModel::Gbdt(m) => m,
        }
    }
}

impl MulticlassModel for TrainedModel {
    fn num_classes(&self) -> usize {
        self.inner().num_classes()
    }

    fn scores(&self, features: &SparseVector) -> Vec<f32> {
        self.inner().scores(features)
    }
}

/// Column names read and written by a predictor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictorColumns {
    pub label: String,
    pub features: String,
    pub score: String,
    pub predicted_label: String,
}

/// Scores rows with a trained model, writing a score column and a predicted
/// key column. Both carry the label names as annotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictorTransform {
    columns: PredictorColumns,
    label_names: Vec<String>,
    model: TrainedModel,
}

impl PredictorTransform {
    /// Train `options` on the labelled rows of `data`.
    pub fn fit(
        data: &DataView,
        columns: PredictorColumns,
        options: &TrainerOptions,
        seed: u64,
    ) -> Result<Self> {
        options.validate()?;
        let label_names = data.schema().key_values(&columns.label)?.to_vec();
        let training_set = TrainingSet::from_view(data, &columns.label, &columns.features)?;

        let start_time = Instant::now();
        let (model, stats) = options.train(&training_set, seed)?;
        info!(
            "Trained {} on {} rows, {} classes, {} features in {} ms ({} iterations, loss {:.4})",
            options.name(),
            training_set.len(),
            training_set.num_classes,
            training_set.num_features,
            start_time.elapsed().as_millis(),
            stats.iterations,
            stats.final_training_loss
        );

        Ok(Self {
            columns,
            label_names,
            model,
        })
    }

    pub fn model(&self) -> &TrainedModel {
        &self.model
    }

    pub fn label_names(&self) -> &[String] {
        &self.label_names
    }

    pub fn columns(&self) -> &PredictorColumns {
        &self.columns
    }
}

impl Transformer for PredictorTransform {
    fn name(&self) -> &'static str {
        "predictor"
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        input.require(&self.columns.features)?.expect_kind("vector")?;
        Ok(input
            .clone()
            .with_column(Column::scores(&self.columns.score, self.label_names.clone()))
            .with_column(Column::key(
                &self.columns.predicted_label,
                self.label_names.clone(),
            )))
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        let schema = self.output_schema(data.schema())?;
        let (_, mut rows) = data.into_parts();

        for row in &mut rows {
            let features = row
                .get(&self.columns.features)
                .and_then(Value::as_vector)
                .ok_or_else(|| {
                    QuillonError::schema(format!(
                        "row has no vector in column '{}'",
                        self.columns.features
                    ))
                })?;
            let scores = self.model.scores(features);
            let predicted = argmax(&scores).map(|k| k as u32);
            row.insert(self.columns.score.clone(), Value::Scores(scores));
            row.insert(self.columns.predicted_label.clone(), Value::Key(predicted));
        }

        Ok(DataView::from_parts(schema, rows))
    }
}

/// Index of the largest value; the lowest index wins ties.
pub fn argmax(values: &[f32]) -> Option<usize> {
    values
        .iter()
        .enumerate()
        .fold(None, |best: Option<(usize, f32)>, (i, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((i, v)),
        })
        .map(|(i, _)| i)
}

/// Numerically stable softmax.
pub fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&z| (z - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

pub fn sigmoid(z: f32) -> f32 {
    1.0 / (1.0 + (-z).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_prefers_lowest_index_on_ties() {
        assert_eq!(argmax(&[0.2, 0.5, 0.5]), Some(1));
        assert_eq!(argmax(&[]), None);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let p = softmax(&[1.0, 2.0, 3.0]);
        assert!((p.iter().sum::<f32>() - 1.0).abs() < 1e-6);
        assert!(p[2] > p[1] && p[1] > p[0]);

        let big = softmax(&[1000.0, 1000.0]);
        assert!((big[0] - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_trainer_options_json() {
        let options: TrainerOptions =
            serde_json::from_str(r#"{"kind": "naive_bayes"}"#).unwrap();
        assert_eq!(options.name(), "naive_bayes");

        let options: TrainerOptions = serde_json::from_str(
            r#"{"kind": "light_gbm", "booster": {"type": "dart", "tree_drop_fraction": 0.15}}"#,
        )
        .unwrap();
        match options {
            TrainerOptions::LightGbm(gbdt) => match gbdt.booster {
                Booster::Dart(dart) => assert_eq!(dart.tree_drop_fraction, 0.15),
                Booster::Gbdt => panic!("expected dart booster"),
            },
            _ => panic!("expected light_gbm"),
        }

        assert_eq!(TrainerOptions::default().name(), "maximum_entropy");
    }

    #[test]
    fn test_training_stats_from_losses() {
        let stats = TrainingStats::from_losses(vec![1.0, 0.5], 10);
        assert_eq!(stats.iterations, 2);
        assert_eq!(stats.final_training_loss, 0.5);
        assert!(stats.early_stopped);
    }
}
