//! The labelled question record.

use serde::Deserialize;

/// Name of the label column.
pub const CATEGORY_COLUMN: &str = "Category";

/// Name of the question text column.
pub const QUESTION_COLUMN: &str = "Question";

/// A support question and the category it belongs to.
///
/// Deserialized by position from a two-field row, so field order is part of
/// the file format.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionRecord {
    pub category: String,
    pub question: String,
}

impl QuestionRecord {
    pub fn new<C: Into<String>, Q: Into<String>>(category: C, question: Q) -> Self {
        Self {
            category: category.into(),
            question: question.into(),
        }
    }

    /// An unlabelled record, as fed to the prediction engine.
    pub fn unlabelled<Q: Into<String>>(question: Q) -> Self {
        Self::new(String::new(), question)
    }
}
