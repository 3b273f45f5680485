//! Column schema for data views and trained pipelines.
//!
//! A [`Schema`] is an ordered list of [`Column`]s. Key columns carry the names
//! of their key values and score columns carry one name per slot; both are
//! stored as [`Annotations`] so that downstream transforms (key decoding,
//! score ranking) can recover human-readable labels.

use serde::{Deserialize, Serialize};

use crate::error::{QuillonError, Result};

/// The kind of values a column holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Free text.
    Text,
    /// Sparse numeric vector of a fixed size.
    Vector { size: usize },
    /// Categorical key in `0..count`, possibly missing.
    Key { count: usize },
    /// Dense per-class scores.
    Scores { size: usize },
}

impl ColumnKind {
    pub fn name(&self) -> &'static str {
        match self {
            ColumnKind::Text => "text",
            ColumnKind::Vector { .. } => "vector",
            ColumnKind::Key { .. } => "key",
            ColumnKind::Scores { .. } => "scores",
        }
    }
}

/// Metadata attached to a column.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotations {
    /// Names of the key values, indexed by key.
    pub key_values: Option<Vec<String>>,
    /// Names of the vector slots.
    pub slot_names: Option<Vec<String>>,
}

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    pub annotations: Annotations,
}

impl Column {
    pub fn text<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Text,
            annotations: Annotations::default(),
        }
    }

    pub fn vector<S: Into<String>>(name: S, size: usize) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Vector { size },
            annotations: Annotations::default(),
        }
    }

    /// A key column whose keys name `key_values`.
    pub fn key<S: Into<String>>(name: S, key_values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Key {
                count: key_values.len(),
            },
            annotations: Annotations {
                key_values: Some(key_values),
                slot_names: None,
            },
        }
    }

    /// A score column with one named slot per class.
    pub fn scores<S: Into<String>>(name: S, slot_names: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: ColumnKind::Scores {
                size: slot_names.len(),
            },
            annotations: Annotations {
                key_values: None,
                slot_names: Some(slot_names),
            },
        }
    }

    /// Fail unless this column has the expected kind.
    pub fn expect_kind(&self, expected: &'static str) -> Result<&Self> {
        if self.kind.name() == expected {
            Ok(self)
        } else {
            Err(QuillonError::schema(format!(
                "column '{}' is of kind {}, expected {expected}",
                self.name,
                self.kind.name()
            )))
        }
    }
}

/// An ordered set of uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<Column>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Schema::upsert`].
    pub fn with_column(mut self, column: Column) -> Self {
        self.upsert(column);
        self
    }

    /// Insert a column, replacing a column of the same name in place.
    pub fn upsert(&mut self, column: Column) {
        match self.columns.iter_mut().find(|c| c.name == column.name) {
            Some(existing) => *existing = column,
            None => self.columns.push(column),
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Look up a column, failing with a schema error when it is absent.
    pub fn require(&self, name: &str) -> Result<&Column> {
        self.column(name).ok_or_else(|| {
            let available: Vec<_> = self.names().collect();
            QuillonError::schema(format!(
                "column '{name}' not found (available: {})",
                available.join(", ")
            ))
        })
    }

    /// Key-value names of a key column.
    pub fn key_values(&self, name: &str) -> Result<&[String]> {
        self.require(name)?
            .annotations
            .key_values
            .as_deref()
            .ok_or_else(|| QuillonError::schema(format!("column '{name}' has no key values")))
    }

    /// Slot names of a vector or score column.
    pub fn slot_names(&self, name: &str) -> Result<&[String]> {
        self.require(name)?
            .annotations
            .slot_names
            .as_deref()
            .ok_or_else(|| QuillonError::schema(format!("column '{name}' has no slot names")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upsert_replaces_in_place() {
        let mut schema = Schema::new()
            .with_column(Column::text("Category"))
            .with_column(Column::text("Question"));

        schema.upsert(Column::key("Category", vec!["a".into(), "b".into()]));
        schema.upsert(Column::vector("Features", 10));

        let names: Vec<_> = schema.names().collect();
        assert_eq!(names, vec!["Category", "Question", "Features"]);
        assert_eq!(
            schema.require("Category").unwrap().kind,
            ColumnKind::Key { count: 2 }
        );
    }

    #[test]
    fn test_annotations() {
        let schema = Schema::new()
            .with_column(Column::key("Label", vec!["x".into(), "y".into()]))
            .with_column(Column::scores("Score", vec!["x".into(), "y".into()]));

        assert_eq!(schema.key_values("Label").unwrap(), &["x", "y"]);
        assert_eq!(schema.slot_names("Score").unwrap(), &["x", "y"]);
        assert!(schema.slot_names("Label").is_err());
        let err = schema.key_values("Missing").unwrap_err();
        assert!(err.to_string().contains("available: Label, Score"));
    }

    #[test]
    fn test_expect_kind() {
        let column = Column::vector("Features", 3);
        assert!(column.expect_kind("vector").is_ok());
        let err = column.expect_kind("text").unwrap_err();
        assert!(err.to_string().contains("expected text"));
    }
}
