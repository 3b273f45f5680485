//! Bernoulli naive Bayes.
//!
//! Each feature is treated as present (non-zero) or absent. Per-class feature
//! probabilities use Laplace smoothing; the posterior is the softmax of the
//! per-class log joint probability.

use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::trainers::{MulticlassModel, Trainer, TrainingSet, TrainingStats, softmax};

/// Options of the naive Bayes trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NaiveBayesOptions {
    /// Additive (Laplace) smoothing.
    pub smoothing: f64,
}

impl Default for NaiveBayesOptions {
    fn default() -> Self {
        Self { smoothing: 1.0 }
    }
}

impl NaiveBayesOptions {
    pub fn validate(&self) -> Result<()> {
        if self.smoothing <= 0.0 {
            return Err(QuillonError::invalid_config("smoothing must be positive"));
        }
        Ok(())
    }
}

/// A trained Bernoulli naive Bayes model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NaiveBayesModel {
    class_log_prior: Vec<f32>,
    /// `ln p(present | class) - ln p(absent | class)` per class and feature.
    log_odds: Vec<Vec<f32>>,
    /// `sum_j ln p(absent_j | class)` per class.
    log_absent_total: Vec<f32>,
}

impl NaiveBayesModel {
    /// Per-class log joint probability.
    pub fn joint_log_likelihood(&self, features: &SparseVector) -> Vec<f32> {
        self.class_log_prior
            .iter()
            .zip(&self.log_absent_total)
            .zip(&self.log_odds)
            .map(|((prior, absent), odds)| {
                let present: f32 = features
                    .iter()
                    .filter(|(_, v)| *v != 0.0)
                    .filter_map(|(slot, _)| odds.get(slot as usize))
                    .sum();
                prior + absent + present
            })
            .collect()
    }
}

impl MulticlassModel for NaiveBayesModel {
    fn num_classes(&self) -> usize {
        self.class_log_prior.len()
    }

    fn scores(&self, features: &SparseVector) -> Vec<f32> {
        softmax(&self.joint_log_likelihood(features))
    }
}

/// Trainer for [`NaiveBayesModel`].
#[derive(Debug, Clone, Default)]
pub struct NaiveBayesTrainer {
    options: NaiveBayesOptions,
}

impl NaiveBayesTrainer {
    pub fn new(options: NaiveBayesOptions) -> Self {
        Self { options }
    }
}

impl Trainer for NaiveBayesTrainer {
    type Model = NaiveBayesModel;

    /// Counting only; the seed is unused.
    fn train(&self, data: &TrainingSet, _seed: u64) -> Result<(NaiveBayesModel, TrainingStats)> {
        self.options.validate()?;
        data.ensure_trainable(1)?;

        let alpha = self.options.smoothing;
        let class_counts = data.class_counts();
        let mut present = vec![vec![0usize; data.num_features]; data.num_classes];
        for (x, &y) in data.features.iter().zip(&data.labels) {
            for (slot, value) in x.iter() {
                if value != 0.0 {
                    present[y][slot as usize] += 1;
                }
            }
        }

        let total = data.len() as f64;
        let num_classes = data.num_classes as f64;
        let mut model = NaiveBayesModel {
            class_log_prior: Vec::with_capacity(data.num_classes),
            log_odds: Vec::with_capacity(data.num_classes),
            log_absent_total: Vec::with_capacity(data.num_classes),
        };

        for (class, counts) in present.iter().enumerate() {
            let n_c = class_counts[class] as f64;
            model
                .class_log_prior
                .push(((n_c + alpha) / (total + alpha * num_classes)).ln() as f32);

            let mut odds = Vec::with_capacity(data.num_features);
            let mut absent_total = 0.0f64;
            for &count in counts {
                let p = (count as f64 + alpha) / (n_c + 2.0 * alpha);
                let log_absent = (1.0 - p).ln();
                absent_total += log_absent;
                odds.push((p.ln() - log_absent) as f32);
            }
            model.log_odds.push(odds);
            model.log_absent_total.push(absent_total as f32);
        }

        // Training log loss, for the stats only.
        let loss = data
            .features
            .iter()
            .zip(&data.labels)
            .map(|(x, &y)| -(model.scores(x)[y] as f64).max(1e-15).ln())
            .sum::<f64>()
            / total;

        Ok((model, TrainingStats::from_losses(vec![loss], 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainers::argmax;

    #[test]
    fn test_present_features_drive_prediction() {
        let data = TrainingSet {
            features: vec![
                SparseVector::from_dense(&[1.0, 0.0, 0.0, 1.0]),
                SparseVector::from_dense(&[1.0, 0.0, 0.0, 0.0]),
                SparseVector::from_dense(&[0.0, 1.0, 1.0, 0.0]),
                SparseVector::from_dense(&[0.0, 0.0, 1.0, 0.0]),
            ],
            labels: vec![0, 0, 1, 1],
            num_classes: 2,
            num_features: 4,
        };

        let (model, stats) = NaiveBayesTrainer::default().train(&data, 0).unwrap();
        assert_eq!(stats.iterations, 1);

        let scores = model.scores(&SparseVector::from_dense(&[1.0, 0.0, 0.0, 0.0]));
        assert_eq!(argmax(&scores), Some(0));
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);

        let scores = model.scores(&SparseVector::from_dense(&[0.0, 0.0, 0.5, 0.0]));
        assert_eq!(argmax(&scores), Some(1));
    }

    #[test]
    fn test_empty_vector_follows_prior() {
        let data = TrainingSet {
            features: vec![
                SparseVector::new(1),
                SparseVector::new(1),
                SparseVector::new(1),
            ],
            labels: vec![0, 0, 1],
            num_classes: 2,
            num_features: 1,
        };
        let (model, _) = NaiveBayesTrainer::default().train(&data, 0).unwrap();
        let scores = model.scores(&SparseVector::new(1));
        assert!(scores[0] > scores[1]);
    }
}
