//! Maximum-entropy (multinomial logistic regression) trainer.
//!
//! Minimizes the L2-regularized cross entropy of a linear softmax model with
//! seeded stochastic gradient descent. Rows are visited in a freshly shuffled
//! order every epoch; the step size decays as `lr / sqrt(1 + epoch)`.

use log::debug;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::trainers::{MulticlassModel, Trainer, TrainingSet, TrainingStats, softmax};

/// Smallest probability used inside the log loss.
const MIN_PROBABILITY: f64 = 1e-15;

/// Options of the maximum-entropy trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaximumEntropyOptions {
    /// L2 regularization strength.
    pub l2_regularization: f32,
    /// Initial step size.
    pub learning_rate: f32,
    /// Maximum number of passes over the data.
    pub max_epochs: usize,
    /// Stop when the epoch loss improves by less than this.
    pub tolerance: f64,
}

impl Default for MaximumEntropyOptions {
    fn default() -> Self {
        Self {
            l2_regularization: 1e-4,
            learning_rate: 0.5,
            max_epochs: 100,
            tolerance: 1e-5,
        }
    }
}

impl MaximumEntropyOptions {
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

/// A linear multiclass model: one weight row and bias per class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    num_features: usize,
    weights: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

impl LinearModel {
    fn zeros(num_classes: usize, num_features: usize) -> Self {
        Self {
            num_features,
            weights: vec![vec![0.0; num_features]; num_classes],
            bias: vec![0.0; num_classes],
        }
    }

    /// Raw class scores before the softmax.
    pub fn logits(&self, features: &SparseVector) -> Vec<f32> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, b)| features.dot(row) + b)
            .collect()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }
}

impl MulticlassModel for LinearModel {
    fn num_classes(&self) -> usize {
        self.bias.len()
    }

    fn scores(&self, features: &SparseVector) -> Vec<f32> {
        softmax(&self.logits(features))
    }
}

/// Trainer for [`LinearModel`].
#[derive(Debug, Clone, Default)]
pub struct MaximumEntropyTrainer {
    options: MaximumEntropyOptions,
}

impl MaximumEntropyTrainer {
    pub fn new(options: MaximumEntropyOptions) -> Self {
        Self { options }
    }
}

impl Trainer for MaximumEntropyTrainer {
    type Model = LinearModel;

    fn train(&self, data: &TrainingSet, seed: u64) -> Result<(LinearModel, TrainingStats)> {
        self.options.validate()?;
        data.ensure_trainable(1)?;

        let opts = &self.options;
        let mut model = LinearModel::zeros(data.num_classes, data.num_features);
        let mut rng = StdRng::seed_from_u64(seed);
        let mut order: Vec<usize> = (0..data.len()).collect();
        let mut losses = Vec::with_capacity(opts.max_epochs);

        for epoch in 0..opts.max_epochs {
            order.shuffle(&mut rng);
            let lr = opts.learning_rate / (1.0 + epoch as f32).sqrt();
            let mut loss = 0.0f64;

            for &i in &order {
                let x = &data.features[i];
                let y = data.labels[i];
                let p = model.scores(x);
                loss -= (p[y] as f64).max(MIN_PROBABILITY).ln();

                for (k, p_k) in p.iter().enumerate() {
                    let g = p_k - if k == y { 1.0 } else { 0.0 };
                    if g == 0.0 {
                        continue;
                    }
                    model.bias[k] -= lr * g;
                    let row = &mut model.weights[k];
                    for (slot, value) in x.iter() {
                        row[slot as usize] -= lr * g * value;
                    }
                }
            }

            // Weight decay, applied once per epoch.
            let decay = (1.0 - lr * opts.l2_regularization).max(0.0).powi(data.len() as i32);
            for row in &mut model.weights {
                for w in row.iter_mut() {
                    *w *= decay;
                }
            }

            let loss = loss / data.len() as f64;
            debug!("maximum entropy epoch {epoch}: loss {loss:.6}");
            let converged = losses
                .last()
                .is_some_and(|prev: &f64| (prev - loss).abs() < opts.tolerance);
            losses.push(loss);
            if converged {
                break;
            }
        }

        Ok((model, TrainingStats::from_losses(losses, opts.max_epochs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy_set() -> TrainingSet {
        // class 0 lives on slot 0, class 1 on slot 1, class 2 on slot 2
        let features = vec![
            SparseVector::from_dense(&[1.0, 0.0, 0.0]),
            SparseVector::from_dense(&[0.9, 0.1, 0.0]),
            SparseVector::from_dense(&[0.0, 1.0, 0.0]),
            SparseVector::from_dense(&[0.1, 0.9, 0.0]),
            SparseVector::from_dense(&[0.0, 0.0, 1.0]),
            SparseVector::from_dense(&[0.0, 0.2, 0.8]),
        ];
        TrainingSet {
            features,
            labels: vec![0, 0, 1, 1, 2, 2],
            num_classes: 3,
            num_features: 3,
        }
    }

    #[test]
    fn test_learns_separable_classes() {
        let (model, stats) = MaximumEntropyTrainer::default()
            .train(&toy_set(), 42)
            .unwrap();

        assert!(stats.iterations > 0);
        for (k, slot) in [0usize, 1, 2].iter().enumerate() {
            let mut dense = [0.0; 3];
            dense[*slot] = 1.0;
            let scores = model.scores(&SparseVector::from_dense(&dense));
            assert_eq!(crate::ml::trainers::argmax(&scores), Some(k));
            assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_same_seed_same_model() {
        let trainer = MaximumEntropyTrainer::default();
        let (a, _) = trainer.train(&toy_set(), 7).unwrap();
        let (b, _) = trainer.train(&toy_set(), 7).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_set_is_rejected() {
        let mut data = toy_set();
        data.features.clear();
        data.labels.clear();
        assert!(MaximumEntropyTrainer::default().train(&data, 1).is_err());
    }

    #[test]
    fn test_invalid_options() {
        let options = MaximumEntropyOptions {
            learning_rate: 0.0,
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
