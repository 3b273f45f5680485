//! Gradient-boosted decision trees for multiclass classification.
//!
//! Each boosting round fits one regression tree per class to the gradient and
//! hessian of the softmax cross entropy. Two boosters are supported:
//!
//! - [`Booster::Gbdt`]: plain gradient boosting, every tree weighted by the
//!   learning rate.
//! - [`Booster::Dart`]: before each round a random subset of earlier rounds
//!   is dropped from the ensemble while computing gradients; afterwards the
//!   new round and the dropped rounds are rescaled so the ensemble output
//!   stays on the same scale.

use std::collections::BTreeMap;

use log::debug;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::trainers::{MulticlassModel, Trainer, TrainingSet, TrainingStats, softmax};

/// Lower bound on per-row hessians.
const MIN_HESSIAN: f64 = 1e-6;

/// Options of the DART booster.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DartOptions {
    /// Probability of dropping each earlier round.
    pub tree_drop_fraction: f64,
    /// Most rounds dropped at once; 0 means no limit.
    pub max_drop: usize,
    /// Probability of skipping the dropout for a round.
    pub skip_drop: f64,
    /// Use xgboost-style normalization of new and dropped rounds.
    pub xgboost_dart_mode: bool,
}

impl Default for DartOptions {
    fn default() -> Self {
        Self {
            tree_drop_fraction: 0.15,
            max_drop: 1,
            skip_drop: 0.5,
            xgboost_dart_mode: false,
        }
    }
}

/// Boosting strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Booster {
    Gbdt,
    Dart(DartOptions),
}

impl Default for Booster {
    fn default() -> Self {
        Booster::Dart(DartOptions::default())
    }
}

/// Options of the gradient-boosting trainer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbdtOptions {
    /// Number of boosting rounds.
    pub num_iterations: usize,
    pub learning_rate: f32,
    /// Maximum tree depth.
    pub max_depth: usize,
    /// Minimum rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Minimum hessian sum on each side of a split.
    pub min_child_weight: f64,
    /// L2 regularization on leaf values.
    pub l2_regularization: f64,
    /// Most thresholds evaluated per feature and node.
    pub max_thresholds: usize,
    pub booster: Booster,
}

impl Default for GbdtOptions {
    fn default() -> Self {
        Self {
            num_iterations: 100,
            learning_rate: 0.2,
            max_depth: 6,
            min_samples_leaf: 2,
            min_child_weight: 1e-3,
            l2_regularization: 0.01,
            max_thresholds: 16,
            booster: Booster::default(),
        }
    }
}

impl GbdtOptions {
    pub fn validate(&self) -> Result<()> {
        if self.num_iterations == 0 {
            return Err(QuillonError::invalid_config("num_iterations must be at least 1"));
        }
        if self.learning_rate <= 0.0 {
            return Err(QuillonError::invalid_config("learning_rate must be positive"));
        }
        if self.max_depth == 0 {
            return Err(QuillonError::invalid_config("max_depth must be at least 1"));
        }
        if self.min_samples_leaf == 0 {
            return Err(QuillonError::invalid_config("min_samples_leaf must be at least 1"));
        }
        if self.l2_regularization < 0.0 || self.min_child_weight < 0.0 {
            return Err(QuillonError::invalid_config(
                "l2_regularization and min_child_weight must not be negative",
            ));
        }
        if self.max_thresholds == 0 {
            return Err(QuillonError::invalid_config("max_thresholds must be at least 1"));
        }
        if let Booster::Dart(dart) = &self.booster {
            if !(0.0..=1.0).contains(&dart.tree_drop_fraction) {
                return Err(QuillonError::invalid_config(
                    "tree_drop_fraction must be in [0, 1]",
                ));
            }
            if !(0.0..=1.0).contains(&dart.skip_drop) {
                return Err(QuillonError::invalid_config("skip_drop must be in [0, 1]"));
            }
        }
        Ok(())
    }

    fn tree_params(&self) -> TreeParams {
        TreeParams {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            min_child_weight: self.min_child_weight,
            lambda: self.l2_regularization,
            max_thresholds: self.max_thresholds,
        }
    }
}

/// Parameters controlling a single tree.
#[derive(Debug, Clone, Copy)]
struct TreeParams {
    max_depth: usize,
    min_samples_leaf: usize,
    min_child_weight: f64,
    lambda: f64,
    max_thresholds: usize,
}

/// A regression tree fitted to one class's gradients. It maps a feature
/// vector to an additive update of that class's raw score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Leaf {
        value: f32,
    },
    /// Rows with `value <= threshold` on `feature` take the left branch.
    Split {
        feature: u32,
        threshold: f32,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
}

impl TreeNode {
    fn leaves(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Split { left, right, .. } => left.leaves() + right.leaves(),
        }
    }
}

/// Best split found for a node.
struct Split {
    feature: u32,
    threshold: f32,
    gain: f64,
}

/// Rows of a node sharing one feature value.
struct Bucket {
    value: f32,
    gradient: f64,
    hessian: f64,
    count: usize,
}

impl DecisionTree {
    /// Fit the tree to per-row gradients and hessians.
    fn fit(
        features: &[SparseVector],
        gradients: &[f64],
        hessians: &[f64],
        params: &TreeParams,
    ) -> Result<Self> {
        if gradients.len() != features.len() || hessians.len() != features.len() {
            return Err(QuillonError::training(
                "gradients and training data length mismatch",
            ));
        }

        let indices: Vec<usize> = (0..features.len()).collect();
        let root = Self::build_node(features, gradients, hessians, &indices, 0, params);
        Ok(Self { root })
    }

    /// Score update for one feature vector.
    pub fn predict(&self, features: &SparseVector) -> f32 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Leaf { value } => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if features.get(*feature) <= *threshold {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }

    pub fn num_leaves(&self) -> usize {
        self.root.leaves()
    }

    fn build_node(
        features: &[SparseVector],
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        depth: usize,
        params: &TreeParams,
    ) -> TreeNode {
        let g: f64 = indices.iter().map(|&i| gradients[i]).sum();
        let h: f64 = indices.iter().map(|&i| hessians[i]).sum();
        let leaf = TreeNode::Leaf {
            value: (-g / (h + params.lambda)) as f32,
        };

        if indices.len() < 2 * params.min_samples_leaf || depth >= params.max_depth {
            return leaf;
        }

        let Some(split) = Self::find_best_split(features, gradients, hessians, indices, params)
        else {
            return leaf;
        };

        let (left_indices, right_indices): (Vec<usize>, Vec<usize>) = indices
            .iter()
            .copied()
            .partition(|&i| features[i].get(split.feature) <= split.threshold);

        debug!(
            "split depth {depth} on feature {} at {} (gain {:.6}, {}/{})",
            split.feature,
            split.threshold,
            split.gain,
            left_indices.len(),
            right_indices.len()
        );

        TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left: Box::new(Self::build_node(
                features,
                gradients,
                hessians,
                &left_indices,
                depth + 1,
                params,
            )),
            right: Box::new(Self::build_node(
                features,
                gradients,
                hessians,
                &right_indices,
                depth + 1,
                params,
            )),
        }
    }

    /// Find the split with the largest positive gain.
    ///
    /// Features are visited in ascending order and only a strictly better gain
    /// replaces the current best, so ties go to the lowest feature index.
    fn find_best_split(
        features: &[SparseVector],
        gradients: &[f64],
        hessians: &[f64],
        indices: &[usize],
        params: &TreeParams,
    ) -> Option<Split> {
        let g_total: f64 = indices.iter().map(|&i| gradients[i]).sum();
        let h_total: f64 = indices.iter().map(|&i| hessians[i]).sum();
        let parent_score = g_total * g_total / (h_total + params.lambda);

        let mut per_feature: BTreeMap<u32, Vec<(f32, usize)>> = BTreeMap::new();
        for &i in indices {
            for (slot, value) in features[i].iter() {
                per_feature.entry(slot).or_default().push((value, i));
            }
        }

        let mut best: Option<Split> = None;
        for (feature, mut nonzero) in per_feature {
            nonzero.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut buckets: Vec<Bucket> = Vec::new();
            let (mut nz_g, mut nz_h) = (0.0, 0.0);
            for &(value, i) in &nonzero {
                nz_g += gradients[i];
                nz_h += hessians[i];
                match buckets.last_mut() {
                    Some(last) if last.value == value => {
                        last.gradient += gradients[i];
                        last.hessian += hessians[i];
                        last.count += 1;
                    }
                    _ => buckets.push(Bucket {
                        value,
                        gradient: gradients[i],
                        hessian: hessians[i],
                        count: 1,
                    }),
                }
            }
            let zero_count = indices.len() - nonzero.len();
            if zero_count > 0 {
                let at = buckets.partition_point(|b| b.value < 0.0);
                buckets.insert(
                    at,
                    Bucket {
                        value: 0.0,
                        gradient: g_total - nz_g,
                        hessian: h_total - nz_h,
                        count: zero_count,
                    },
                );
            }
            if buckets.len() < 2 {
                continue;
            }

            let candidates = buckets.len() - 1;
            let positions: Vec<usize> = if candidates <= params.max_thresholds {
                (1..buckets.len()).collect()
            } else {
                let mut picked: Vec<usize> = (0..params.max_thresholds)
                    .map(|t| 1 + t * candidates / params.max_thresholds)
                    .collect();
                picked.dedup();
                picked
            };

            let mut prefix = Vec::with_capacity(buckets.len() + 1);
            prefix.push((0.0f64, 0.0f64, 0usize));
            for b in &buckets {
                let (g, h, n) = prefix[prefix.len() - 1];
                prefix.push((g + b.gradient, h + b.hessian, n + b.count));
            }

            for pos in positions {
                let (g_left, h_left, n_left) = prefix[pos];
                let (g_right, h_right, n_right) =
                    (g_total - g_left, h_total - h_left, indices.len() - n_left);

                if n_left < params.min_samples_leaf
                    || n_right < params.min_samples_leaf
                    || h_left < params.min_child_weight
                    || h_right < params.min_child_weight
                {
                    continue;
                }

                let gain = g_left * g_left / (h_left + params.lambda)
                    + g_right * g_right / (h_right + params.lambda)
                    - parent_score;

                if gain > best.as_ref().map_or(0.0, |b| b.gain) {
                    best = Some(Split {
                        feature,
                        threshold: (buckets[pos - 1].value + buckets[pos].value) / 2.0,
                        gain,
                    });
                }
            }
        }

        best
    }
}

/// One boosting round: a tree per class sharing one weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingRound {
    weight: f32,
    trees: Vec<DecisionTree>,
}

/// A trained gradient-boosted ensemble.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbdtModel {
    base_scores: Vec<f32>,
    rounds: Vec<BoostingRound>,
}

impl GbdtModel {
    /// Raw class scores before the softmax.
    pub fn raw_scores(&self, features: &SparseVector) -> Vec<f32> {
        let mut raw = self.base_scores.clone();
        for round in &self.rounds {
            for (k, tree) in round.trees.iter().enumerate() {
                raw[k] += round.weight * tree.predict(features);
            }
        }
        raw
    }

    pub fn num_rounds(&self) -> usize {
        self.rounds.len()
    }
}

impl MulticlassModel for GbdtModel {
    fn num_classes(&self) -> usize {
        self.base_scores.len()
    }

    fn scores(&self, features: &SparseVector) -> Vec<f32> {
        softmax(&self.raw_scores(features))
    }
}

/// Trainer for [`GbdtModel`].
#[derive(Debug, Clone, Default)]
pub struct GbdtTrainer {
    options: GbdtOptions,
}

impl GbdtTrainer {
    pub fn new(options: GbdtOptions) -> Self {
        Self { options }
    }

    /// Pick the earlier rounds to drop for this iteration.
    fn select_dropped(&self, rng: &mut StdRng, num_rounds: usize) -> Vec<usize> {
        let Booster::Dart(dart) = &self.options.booster else {
            return Vec::new();
        };
        if num_rounds == 0 || rng.random::<f64>() < dart.skip_drop {
            return Vec::new();
        }

        let mut dropped: Vec<usize> = (0..num_rounds)
            .filter(|_| rng.random::<f64>() < dart.tree_drop_fraction)
            .collect();
        if dart.max_drop > 0 && dropped.len() > dart.max_drop {
            dropped.shuffle(rng);
            dropped.truncate(dart.max_drop);
            dropped.sort_unstable();
        }
        dropped
    }

    /// Weight of the new round and the factor applied to dropped rounds.
    fn normalization(&self, dropped: usize) -> (f32, f32) {
        let lr = self.options.learning_rate;
        match &self.options.booster {
            Booster::Dart(dart) if dropped > 0 => {
                let k = dropped as f32;
                if dart.xgboost_dart_mode {
                    (lr / (k + lr), k / (k + lr))
                } else {
                    (lr / (k + 1.0), k / (k + 1.0))
                }
            }
            _ => (lr, 1.0),
        }
    }
}

impl Trainer for GbdtTrainer {
    type Model = GbdtModel;

    fn train(&self, data: &TrainingSet, seed: u64) -> Result<(GbdtModel, TrainingStats)> {
        self.options.validate()?;
        data.ensure_trainable(1)?;

        let n = data.len();
        let num_classes = data.num_classes;
        let params = self.options.tree_params();
        let mut rng = StdRng::seed_from_u64(seed);

        // Start from the smoothed log prior of each class.
        let counts = data.class_counts();
        let base_scores: Vec<f32> = counts
            .iter()
            .map(|&c| ((c as f64 + 1.0) / (n + num_classes) as f64).ln() as f32)
            .collect();

        let mut model = GbdtModel {
            base_scores: base_scores.clone(),
            rounds: Vec::with_capacity(self.options.num_iterations),
        };
        // Unweighted tree outputs on the training rows: [round][class][row].
        let mut outputs: Vec<Vec<Vec<f32>>> = Vec::with_capacity(self.options.num_iterations);
        let mut ensemble: Vec<Vec<f32>> = vec![base_scores; n];
        let mut losses = Vec::with_capacity(self.options.num_iterations);

        for iteration in 0..self.options.num_iterations {
            let dropped = self.select_dropped(&mut rng, model.rounds.len());

            let mut partial = ensemble.clone();
            for &r in &dropped {
                let weight = model.rounds[r].weight;
                for (i, row) in partial.iter_mut().enumerate() {
                    for (k, value) in row.iter_mut().enumerate() {
                        *value -= weight * outputs[r][k][i];
                    }
                }
            }

            let probabilities: Vec<Vec<f32>> = partial.iter().map(|row| softmax(row)).collect();

            let mut trees = Vec::with_capacity(num_classes);
            let mut round_outputs = Vec::with_capacity(num_classes);
            for k in 0..num_classes {
                let (gradients, hessians): (Vec<f64>, Vec<f64>) = probabilities
                    .iter()
                    .zip(&data.labels)
                    .map(|(p, &y)| {
                        let p = p[k] as f64;
                        let target = if y == k { 1.0 } else { 0.0 };
                        (p - target, (p * (1.0 - p)).max(MIN_HESSIAN))
                    })
                    .unzip();

                let tree = DecisionTree::fit(&data.features, &gradients, &hessians, &params)?;
                round_outputs.push(data.features.iter().map(|x| tree.predict(x)).collect::<Vec<f32>>());
                trees.push(tree);
            }

            let (new_weight, drop_factor) = self.normalization(dropped.len());
            for &r in &dropped {
                model.rounds[r].weight *= drop_factor;
            }

            ensemble = partial;
            for &r in &dropped {
                let weight = model.rounds[r].weight;
                for (i, row) in ensemble.iter_mut().enumerate() {
                    for (k, value) in row.iter_mut().enumerate() {
                        *value += weight * outputs[r][k][i];
                    }
                }
            }
            for (i, row) in ensemble.iter_mut().enumerate() {
                for (k, value) in row.iter_mut().enumerate() {
                    *value += new_weight * round_outputs[k][i];
                }
            }

            model.rounds.push(BoostingRound {
                weight: new_weight,
                trees,
            });
            outputs.push(round_outputs);

            let loss = ensemble
                .iter()
                .zip(&data.labels)
                .map(|(row, &y)| -(softmax(row)[y] as f64).max(1e-15).ln())
                .sum::<f64>()
                / n as f64;
            debug!(
                "boosting round {iteration}: dropped {} rounds, loss {loss:.6}",
                dropped.len()
            );
            losses.push(loss);
        }

        Ok((
            model,
            TrainingStats::from_losses(losses, self.options.num_iterations),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::trainers::argmax;

    fn toy_set() -> TrainingSet {
        let mut features = Vec::new();
        let mut labels = Vec::new();
        for i in 0..6 {
            let jitter = i as f32 * 0.05;
            features.push(SparseVector::from_dense(&[1.0 - jitter, 0.0, jitter]));
            labels.push(0);
            features.push(SparseVector::from_dense(&[0.0, 1.0 - jitter, 0.0]));
            labels.push(1);
        }
        TrainingSet {
            features,
            labels,
            num_classes: 2,
            num_features: 3,
        }
    }

    fn gbdt_options() -> GbdtOptions {
        GbdtOptions {
            num_iterations: 20,
            booster: Booster::Gbdt,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_node_becomes_a_single_leaf() {
        let features = vec![SparseVector::from_dense(&[1.0]), SparseVector::from_dense(&[0.0])];
        let gradients = [-0.5, -0.25];
        let hessians = [0.25, 0.25];
        let params = GbdtOptions {
            min_samples_leaf: 2,
            ..gbdt_options()
        }
        .tree_params();

        let tree = DecisionTree::fit(&features, &gradients, &hessians, &params).unwrap();
        assert_eq!(tree.num_leaves(), 1);
        // -G / (H + lambda)
        let expected = (0.75 / (0.5 + 0.01)) as f32;
        assert!((tree.predict(&SparseVector::new(1)) - expected).abs() < 1e-6);
        assert!((tree.predict(&features[0]) - expected).abs() < 1e-6);
    }

    #[test]
    fn test_tree_splits_on_informative_feature() {
        let data = toy_set();
        let gradients: Vec<f64> = data
            .labels
            .iter()
            .map(|&y| if y == 0 { -0.5 } else { 0.5 })
            .collect();
        let hessians = vec![0.25; data.len()];
        let params = gbdt_options().tree_params();

        let tree = DecisionTree::fit(&data.features, &gradients, &hessians, &params).unwrap();
        assert!(tree.num_leaves() >= 2);
        // Class 0 rows get a positive push for class 0.
        assert!(tree.predict(&data.features[0]) > 0.0);
        assert!(tree.predict(&data.features[1]) < 0.0);
    }

    #[test]
    fn test_gbdt_learns_toy_problem() {
        let data = toy_set();
        let (model, stats) = GbdtTrainer::new(gbdt_options()).train(&data, 5).unwrap();

        assert_eq!(model.num_rounds(), 20);
        assert!(stats.final_training_loss < stats.training_losses[0]);
        for (x, &y) in data.features.iter().zip(&data.labels) {
            assert_eq!(argmax(&model.scores(x)), Some(y));
        }
    }

    #[test]
    fn test_dart_is_deterministic() {
        let data = toy_set();
        let options = GbdtOptions {
            num_iterations: 15,
            booster: Booster::Dart(DartOptions {
                tree_drop_fraction: 0.5,
                max_drop: 0,
                skip_drop: 0.0,
                xgboost_dart_mode: false,
            }),
            ..Default::default()
        };

        let (a, _) = GbdtTrainer::new(options.clone()).train(&data, 9).unwrap();
        let (b, _) = GbdtTrainer::new(options).train(&data, 9).unwrap();
        assert_eq!(a, b);

        let scores = a.scores(&data.features[1]);
        assert!((scores.iter().sum::<f32>() - 1.0).abs() < 1e-5);
        assert_eq!(argmax(&scores), Some(1));
    }

    #[test]
    fn test_dart_normalization() {
        let normal = GbdtTrainer::new(GbdtOptions::default());
        assert_eq!(normal.normalization(0), (0.2, 1.0));
        let (new_weight, factor) = normal.normalization(3);
        assert!((new_weight - 0.05).abs() < 1e-6);
        assert!((factor - 0.75).abs() < 1e-6);

        let xgb = GbdtTrainer::new(GbdtOptions {
            booster: Booster::Dart(DartOptions {
                xgboost_dart_mode: true,
                ..Default::default()
            }),
            ..Default::default()
        });
        let (new_weight, factor) = xgb.normalization(1);
        assert!((new_weight - 0.2 / 1.2).abs() < 1e-6);
        assert!((factor - 1.0 / 1.2).abs() < 1e-6);
    }

    #[test]
    fn test_invalid_options() {
        let options = GbdtOptions {
            booster: Booster::Dart(DartOptions {
                tree_drop_fraction: 1.5,
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }
}
