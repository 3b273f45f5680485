//! In-memory tabular data flowing through the pipeline.
//!
//! A [`DataView`] pairs a [`Schema`] with rows. Each transform reads some
//! columns of every row and writes new ones, updating the schema to match.

use std::collections::BTreeMap;

use crate::data::record::{CATEGORY_COLUMN, QUESTION_COLUMN, QuestionRecord};
use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::schema::{Column, Schema};

/// A single cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Vector(SparseVector),
    /// A categorical key; `None` is the missing key.
    Key(Option<u32>),
    Scores(Vec<f32>),
}

impl Value {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_vector(&self) -> Option<&SparseVector> {
        match self {
            Value::Vector(vector) => Some(vector),
            _ => None,
        }
    }

    pub fn as_key(&self) -> Option<Option<u32>> {
        match self {
            Value::Key(key) => Some(*key),
            _ => None,
        }
    }

    pub fn as_scores(&self) -> Option<&[f32]> {
        match self {
            Value::Scores(scores) => Some(scores),
            _ => None,
        }
    }
}

/// One row: column name to value.
pub type Row = BTreeMap<String, Value>;

/// A schema plus rows.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataView {
    schema: Schema,
    rows: Vec<Row>,
}

impl DataView {
    pub fn from_parts(schema: Schema, rows: Vec<Row>) -> Self {
        Self { schema, rows }
    }

    /// The schema of a freshly loaded record file.
    pub fn record_schema() -> Schema {
        Schema::new()
            .with_column(Column::text(CATEGORY_COLUMN))
            .with_column(Column::text(QUESTION_COLUMN))
    }

    /// Build a view with `Category` and `Question` text columns.
    pub fn from_records(records: &[QuestionRecord]) -> Self {
        let rows = records
            .iter()
            .map(|record| {
                let mut row = Row::new();
                row.insert(
                    CATEGORY_COLUMN.to_string(),
                    Value::Text(record.category.clone()),
                );
                row.insert(
                    QUESTION_COLUMN.to_string(),
                    Value::Text(record.question.clone()),
                );
                row
            })
            .collect();

        Self::from_parts(Self::record_schema(), rows)
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_parts(self) -> (Schema, Vec<Row>) {
        (self.schema, self.rows)
    }

    /// Text values of a column; rows without a value yield `None`.
    pub fn texts(&self, name: &str) -> Result<Vec<Option<&str>>> {
        self.schema.require(name)?.expect_kind("text")?;
        self.rows
            .iter()
            .map(|row| match row.get(name) {
                None => Ok(None),
                Some(value) => value.as_text().map(Some).ok_or_else(|| mismatch(name, "text")),
            })
            .collect()
    }

    /// Vector values of a column. Every row must hold one.
    pub fn vectors(&self, name: &str) -> Result<Vec<&SparseVector>> {
        self.schema.require(name)?.expect_kind("vector")?;
        self.rows
            .iter()
            .map(|row| {
                row.get(name)
                    .and_then(Value::as_vector)
                    .ok_or_else(|| mismatch(name, "vector"))
            })
            .collect()
    }

    /// Key values of a column; rows without a value yield the missing key.
    pub fn keys(&self, name: &str) -> Result<Vec<Option<u32>>> {
        self.schema.require(name)?.expect_kind("key")?;
        self.rows
            .iter()
            .map(|row| match row.get(name) {
                None => Ok(None),
                Some(value) => value.as_key().ok_or_else(|| mismatch(name, "key")),
            })
            .collect()
    }

    /// Score values of a column. Every row must hold one.
    pub fn scores(&self, name: &str) -> Result<Vec<&[f32]>> {
        self.schema.require(name)?.expect_kind("scores")?;
        self.rows
            .iter()
            .map(|row| {
                row.get(name)
                    .and_then(Value::as_scores)
                    .ok_or_else(|| mismatch(name, "scores"))
            })
            .collect()
    }
}

fn mismatch(name: &str, kind: &str) -> QuillonError {
    QuillonError::schema(format!("column '{name}' does not hold {kind} values"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_records() {
        let view = DataView::from_records(&[
            QuestionRecord::new("Magazzino", "inventario di fine anno"),
            QuestionRecord::unlabelled("fattura scartata"),
        ]);

        assert_eq!(view.len(), 2);
        assert_eq!(
            view.texts(QUESTION_COLUMN).unwrap(),
            vec![Some("inventario di fine anno"), Some("fattura scartata")]
        );
        assert_eq!(
            view.texts(CATEGORY_COLUMN).unwrap(),
            vec![Some("Magazzino"), Some("")]
        );
    }

    #[test]
    fn test_kind_checks() {
        let view = DataView::from_records(&[QuestionRecord::new("a", "b")]);
        assert!(view.vectors(QUESTION_COLUMN).is_err());
        assert!(view.keys("Label").is_err());
    }

    #[test]
    fn test_missing_cells_read_as_none() {
        let mut row = Row::new();
        row.insert(QUESTION_COLUMN.to_string(), Value::Text("ok".into()));
        let view = DataView::from_parts(DataView::record_schema(), vec![row, Row::new()]);

        assert_eq!(view.texts(QUESTION_COLUMN).unwrap(), vec![Some("ok"), None]);
        assert_eq!(view.texts(CATEGORY_COLUMN).unwrap(), vec![None, None]);
    }
}
