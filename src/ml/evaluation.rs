//! Multiclass evaluation metrics.
//!
//! Metrics are computed from a scored data view: the label key column gives
//! the truth, the score column the per-class probabilities. The predicted
//! class is the argmax of the scores.

use std::fmt;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::data::view::DataView;
use crate::error::{QuillonError, Result};
use crate::ml::trainers::argmax;

/// Smallest probability used inside the log loss.
const MIN_PROBABILITY: f64 = 1e-15;

/// Square confusion matrix; rows are true classes, columns predicted ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub labels: Vec<String>,
    pub counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    fn new(labels: Vec<String>) -> Self {
        let n = labels.len();
        Self {
            labels,
            counts: vec![vec![0; n]; n],
        }
    }

    /// Rows of class `truth` predicted as `predicted`.
    pub fn get(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth][predicted]
    }
}

/// Metrics of a multiclass classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MulticlassMetrics {
    /// Fraction of rows predicted correctly.
    pub micro_accuracy: f64,
    /// Mean per-class accuracy over the classes present in the data.
    pub macro_accuracy: f64,
    pub log_loss: f64,
    /// `1 - log_loss / prior_log_loss`, where the prior is the label
    /// distribution of the evaluated rows.
    pub log_loss_reduction: f64,
    pub top_k: usize,
    /// Fraction of rows whose label is among the `top_k` scores.
    pub top_k_accuracy: f64,
    /// Mean log loss per class; `None` for classes absent from the data.
    pub per_class_log_loss: Vec<Option<f64>>,
    pub confusion_matrix: ConfusionMatrix,
    pub evaluated_rows: usize,
    /// Rows whose label was not seen in training.
    pub skipped_rows: usize,
}

/// Evaluate a scored data view.
pub fn evaluate(
    scored: &DataView,
    label_column: &str,
    score_column: &str,
    top_k: usize,
) -> Result<MulticlassMetrics> {
    if top_k == 0 {
        return Err(QuillonError::invalid_argument("top_k must be at least 1"));
    }

    let class_names = scored.schema().slot_names(score_column)?.to_vec();
    let num_classes = class_names.len();
    let keys = scored.keys(label_column)?;
    let scores = scored.scores(score_column)?;

    let mut matrix = ConfusionMatrix::new(class_names);
    let mut class_log_loss = vec![0.0f64; num_classes];
    let mut class_rows = vec![0usize; num_classes];
    let mut log_loss = 0.0f64;
    let mut correct = 0usize;
    let mut in_top_k = 0usize;
    let mut skipped = 0usize;

    for (key, row_scores) in keys.into_iter().zip(scores) {
        let Some(truth) = key.map(|k| k as usize).filter(|&k| k < num_classes) else {
            skipped += 1;
            continue;
        };
        if row_scores.len() != num_classes {
            return Err(QuillonError::schema(format!(
                "row has {} scores for {num_classes} classes",
                row_scores.len()
            )));
        }

        let predicted = argmax(row_scores).unwrap_or(0);
        matrix.counts[truth][predicted] += 1;
        if predicted == truth {
            correct += 1;
        }

        let p_truth = row_scores[truth];
        let rank = row_scores.iter().filter(|&&s| s > p_truth).count();
        if rank < top_k {
            in_top_k += 1;
        }

        let loss = -(p_truth as f64).max(MIN_PROBABILITY).ln();
        log_loss += loss;
        class_log_loss[truth] += loss;
        class_rows[truth] += 1;
    }

    if skipped > 0 {
        warn!("Skipped {skipped} rows whose label was not seen in training");
    }

    let evaluated = class_rows.iter().sum::<usize>();
    if evaluated == 0 {
        return Err(QuillonError::invalid_argument(
            "no rows with a known label to evaluate",
        ));
    }
    let n = evaluated as f64;

    let present: Vec<usize> = (0..num_classes).filter(|&k| class_rows[k] > 0).collect();
    let macro_accuracy = present
        .iter()
        .map(|&k| matrix.counts[k][k] as f64 / class_rows[k] as f64)
        .sum::<f64>()
        / present.len() as f64;

    let log_loss = log_loss / n;
    let prior_log_loss: f64 = present
        .iter()
        .map(|&k| {
            let p = class_rows[k] as f64 / n;
            -p * p.ln()
        })
        .sum();
    let log_loss_reduction = if prior_log_loss > 0.0 {
        1.0 - log_loss / prior_log_loss
    } else {
        0.0
    };

    let per_class_log_loss = class_log_loss
        .iter()
        .zip(&class_rows)
        .map(|(&loss, &rows)| (rows > 0).then(|| loss / rows as f64))
        .collect();

    Ok(MulticlassMetrics {
        micro_accuracy: correct as f64 / n,
        macro_accuracy,
        log_loss,
        log_loss_reduction,
        top_k,
        top_k_accuracy: in_top_k as f64 / n,
        per_class_log_loss,
        confusion_matrix: matrix,
        evaluated_rows: evaluated,
        skipped_rows: skipped,
    })
}

impl fmt::Display for MulticlassMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "*".repeat(109);
        writeln!(f, "{rule}")?;
        writeln!(f, "*       Metrics for Multi-class Classification model - Test Data     ")?;
        writeln!(f, "*{}", "-".repeat(108))?;
        writeln!(f, "*       MicroAccuracy:    {:.3}", self.micro_accuracy)?;
        writeln!(f, "*       MacroAccuracy:    {:.3}", self.macro_accuracy)?;
        writeln!(f, "*       LogLoss:          {:.3}", self.log_loss)?;
        writeln!(f, "*       LogLossReduction: {:.3}", self.log_loss_reduction)?;
        writeln!(
            f,
            "*       Top{}Accuracy:     {:.3}",
            self.top_k, self.top_k_accuracy
        )?;
        write!(f, "{rule}")
    }
}
