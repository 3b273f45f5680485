//! One-versus-all trainer over binary logistic regression.
//!
//! One binary classifier is trained per class, each separating that class from
//! all others. The binary models train in parallel; each gets its own seed
//! derived from the trainer seed and the class index, and the results are
//! collected in class order. Predicted probabilities are normalized to sum
//! to 1.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::trainers::{MulticlassModel, Trainer, TrainingSet, TrainingStats, sigmoid};

const MIN_PROBABILITY: f64 = 1e-15;

/// Options of each binary logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogisticRegressionOptions {
    pub l2_regularization: f32,
    pub learning_rate: f32,
    pub max_epochs: usize,
    pub tolerance: f64,
}

impl Default for LogisticRegressionOptions {
    fn default() -> Self {
        Self {
            l2_regularization: 1e-4,
            learning_rate: 0.5,
            max_epochs: 100,
            tolerance: 1e-5,
        }
    }
}

impl LogisticRegressionOptions {
    pub fn validate(&self) -> Result<()> {
        if self.l2_regularization < 0.0 {
            return Err(QuillonError::invalid_config(
                "l2_regularization must not be negative",
            ));
        }
        if self.learning_rate <= 0.0 {
            return Err(QuillonError::invalid_config("learning_rate must be positive"));
        }
        if self.max_epochs == 0 {
            return Err(QuillonError::invalid_config("max_epochs must be at least 1"));
        }
        Ok(())
    }
}

/// A binary logistic regression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryLogisticModel {
    weights: Vec<f32>,
    bias: f32,
}

impl BinaryLogisticModel {
    /// Probability of the positive class.
    pub fn probability(&self, features: &SparseVector) -> f32 {
        sigmoid(features.dot(&self.weights) + self.bias)
    }
}

/// One binary model per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneVersusAllModel {
    models: Vec<BinaryLogisticModel>,
}

impl MulticlassModel for OneVersusAllModel {
    fn num_classes(&self) -> usize {
        self.models.len()
    }

    fn scores(&self, features: &SparseVector) -> Vec<f32> {
        let raw: Vec<f32> = self
            .models
            .iter()
            .map(|m| m.probability(features))
            .collect();
        let sum: f32 = raw.iter().sum();
        if sum > 0.0 {
            raw.into_iter().map(|p| p / sum).collect()
        } else {
            vec![1.0 / raw.len() as f32; raw.len()]
        }
    }
}

/// Trainer for [`OneVersusAllModel`].
#[derive(Debug, Clone, Default)]
pub struct OneVersusAllTrainer {
    options: LogisticRegressionOptions,
}

impl OneVersusAllTrainer {
    pub fn new(options: LogisticRegressionOptions) -> Self {
        Self { options }
    }

    fn train_binary(
        &self,
        data: &TrainingSet,
        positive: usize,
        seed: u64,
    ) -> (BinaryLogisticModel, Vec<f64>) {
        let opts = &self.options;
        let mut model = BinaryLogisticModel {
            weights: vec![0.0; data.num_features],
            bias: 0.0,
        };
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut losses = Vec::with_capacity(opts.max_epochs);

        for epoch in 0..opts.max_epochs {
            order.shuffle(&mut rng);
            let lr = opts.learning_rate / (1.0 + epoch as f32).sqrt();
            let mut loss = 0.0f64;

            for &i in &order {
                let x = &data.features[i];
                let y = if data.labels[i] == positive { 1.0 } else { 0.0 };
                let p = model.probability(x);
                let p_true = if y == 1.0 { p } else { 1.0 - p };
                loss -= (p_true as f64).max(MIN_PROBABILITY).ln();

                let g = p - y;
                model.bias -= lr * g;
                for (slot, value) in x.iter() {
                    model.weights[slot as usize] -= lr * g * value;
                }
            }

            let decay = (1.0 - lr * opts.l2_regularization).max(0.0).powi(data.len() as i32);
            for w in &mut model.weights {
                *w *= decay;
            }

            let loss = loss / data.len() as f64;
            let converged = losses
                .last()
                .is_some_and(|prev: &f64| (prev - loss).abs() < opts.tolerance);
            losses.push(loss);
            if converged {
                break;
            }
        }

        debug!(
            "binary model for class {positive}: {} epochs, loss {:.6}",
            losses.len(),
            losses.last().copied().unwrap_or(0.0)
        );
        (model, losses)
    }
}

impl Trainer for OneVersusAllTrainer {
    type Model = OneVersusAllModel;

    fn train(&self, data: &TrainingSet, seed: u64) -> Result<(OneVersusAllModel, TrainingStats)> {
        self.options.validate()?;
        data.ensure_trainable(1)?;

        let trained: Vec<(BinaryLogisticModel, Vec<f64>)> = (0..data.num_classes)
            .into_par_iter()
            .map(|class| self.train_binary(data, class, seed.wrapping_add(class as u64)))
            .collect();

        // Report the mean binary loss per epoch over the classes still running.
        let longest = trained.iter().map(|(_, l)| l.len()).max().unwrap_or(0);
        let losses = (0..longest)
            .map(|epoch| {
                let running: Vec<f64> = trained
                    .iter()
                    .filter_map(|(_, l)| l.get(epoch).copied())
                    .collect();
                running.iter().sum::<f64>() / running.len() as f64
            })
            .collect();

        let models = trained.into_iter().map(|(m, _)| m).collect();
        Ok((
            OneVersusAllModel { models },
            TrainingStats::from_losses(losses, self.options.max_epochs),
        ))
    }
}
