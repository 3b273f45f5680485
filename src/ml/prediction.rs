//! Single-question prediction.
//!
//! A [`PredictionEngine`] wraps a trained pipeline and scores one question at
//! a time. [`rank_scores`] pairs a raw score vector with the slot names of the
//! score column and sorts the pairs by descending score.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::data::record::QuestionRecord;
use crate::data::view::{DataView, Value};
use crate::error::{QuillonError, Result};
use crate::ml::pipeline::{PREDICTED_LABEL_COLUMN, SCORE_COLUMN, TrainedPipeline};
use crate::ml::schema::Schema;

/// The prediction for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionPrediction {
    /// The predicted category.
    pub category: String,
    /// Per-category scores, parallel to the score column's slot names.
    pub score: Vec<f32>,
}

/// One category and its score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryScore {
    pub category: String,
    pub score: f32,
}

/// Category scores sorted by descending score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RankedScores(Vec<CategoryScore>);

impl RankedScores {
    pub fn iter(&self) -> impl Iterator<Item = &CategoryScore> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The best-scoring category.
    pub fn best(&self) -> Option<&CategoryScore> {
        self.0.first()
    }

    /// Keep only the `n` best categories.
    pub fn top(mut self, n: usize) -> Self {
        self.0.truncate(n);
        self
    }

    /// Sum of all scores.
    pub fn total(&self) -> f32 {
        self.0.iter().map(|c| c.score).sum()
    }

    /// Score of `category`, if present.
    pub fn get(&self, category: &str) -> Option<f32> {
        self.0
            .iter()
            .find(|c| c.category == category)
            .map(|c| c.score)
    }

    pub fn into_vec(self) -> Vec<CategoryScore> {
        self.0
    }
}

/// Pair `scores` with the slot names of `column` and sort by descending
/// score. Equal scores keep their slot order.
pub fn rank_scores(schema: &Schema, column: &str, scores: &[f32]) -> Result<RankedScores> {
    let names = schema.slot_names(column)?;
    if names.len() != scores.len() {
        return Err(QuillonError::schema(format!(
            "column '{column}' has {} slot names but {} scores were given",
            names.len(),
            scores.len()
        )));
    }

    let mut ranked: Vec<CategoryScore> = names
        .iter()
        .zip(scores)
        .map(|(name, &score)| CategoryScore {
            category: name.clone(),
            score,
        })
        .collect();
    ranked.sort_by(|a, b| b.score.total_cmp(&a.score));

    Ok(RankedScores(ranked))
}

/// Scores single questions with a trained pipeline.
#[derive(Debug, Clone)]
pub struct PredictionEngine {
    pipeline: TrainedPipeline,
}

impl PredictionEngine {
    pub fn new(pipeline: TrainedPipeline) -> Result<Self> {
        let schema = pipeline.output_schema();
        schema.require(SCORE_COLUMN)?.expect_kind("scores")?;
        schema.require(PREDICTED_LABEL_COLUMN)?.expect_kind("text")?;
        Ok(Self { pipeline })
    }

    /// Load a model file and wrap it.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::new(TrainedPipeline::load(path)?)
    }

    /// Schema of the scored output.
    pub fn output_schema(&self) -> &Schema {
        self.pipeline.output_schema()
    }

    pub fn predict(&self, question: &str) -> Result<QuestionPrediction> {
        let input = DataView::from_records(&[QuestionRecord::unlabelled(question)]);
        let output = self.pipeline.transform(input)?;
        let row = output
            .rows()
            .first()
            .ok_or_else(|| QuillonError::other("pipeline produced no rows"))?;

        let category = match row.get(PREDICTED_LABEL_COLUMN) {
            Some(Value::Text(text)) => text.clone(),
            _ => return Err(QuillonError::schema("missing predicted label")),
        };
        let score = match row.get(SCORE_COLUMN) {
            Some(Value::Scores(scores)) => scores.clone(),
            _ => return Err(QuillonError::schema("missing scores")),
        };

        Ok(QuestionPrediction { category, score })
    }

    /// Predict and rank the scores in one step.
    pub fn predict_ranked(&self, question: &str) -> Result<(QuestionPrediction, RankedScores)> {
        let prediction = self.predict(question)?;
        let ranked = rank_scores(self.output_schema(), SCORE_COLUMN, &prediction.score)?;
        Ok((prediction, ranked))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ml::schema::Column;

    fn schema() -> Schema {
        Schema::new().with_column(Column::scores(
            "Score",
            vec!["Magazzino".into(), "Fatturazione".into(), "Contabilita".into()],
        ))
    }

    #[test]
    fn test_rank_scores_descending_and_sum_preserved() {
        let scores = [0.2, 0.5, 0.3];
        let ranked = rank_scores(&schema(), "Score", &scores).unwrap();

        let order: Vec<_> = ranked.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["Fatturazione", "Contabilita", "Magazzino"]);
        assert!((ranked.total() - scores.iter().sum::<f32>()).abs() < 1e-6);
        assert_eq!(ranked.get("Magazzino"), Some(0.2));
        assert_eq!(ranked.best().unwrap().category, "Fatturazione");
        assert_eq!(ranked.top(1).len(), 1);
    }

    #[test]
    fn test_rank_scores_ties_keep_slot_order() {
        let ranked = rank_scores(&schema(), "Score", &[0.4, 0.2, 0.4]).unwrap();
        let order: Vec<_> = ranked.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["Magazzino", "Contabilita", "Fatturazione"]);
    }

    #[test]
    fn test_rank_scores_errors() {
        assert!(rank_scores(&schema(), "Missing", &[1.0]).is_err());
        assert!(rank_scores(&schema(), "Score", &[1.0]).is_err());

        let no_slots = Schema::new().with_column(Column::vector("Score", 3));
        assert!(rank_scores(&no_slots, "Score", &[0.1, 0.2, 0.7]).is_err());
    }

    #[test]
    fn test_ranked_scores_json() {
        let ranked = rank_scores(&schema(), "Score", &[0.2, 0.5, 0.3]).unwrap();
        let json = serde_json::to_value(&ranked).unwrap();
        assert_eq!(json[0]["category"], "Fatturazione");
    }
}
