//! Conversions between categorical text values and keys.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::data::view::{DataView, Value};
use crate::error::{QuillonError, Result};
use crate::ml::schema::{Column, Schema};
use crate::ml::transforms::Transformer;

/// Maps the text values of `input` to dense keys in `output`.
///
/// Keys are assigned in order of first occurrence during fit. Empty,
/// missing and unseen values map to the missing key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValueToKeyTransform {
    input: String,
    output: String,
    key_values: Vec<String>,
}

impl ValueToKeyTransform {
    pub fn fit(data: &DataView, input: &str, output: &str) -> Result<Self> {
        let mut key_values: Vec<String> = Vec::new();
        for value in data.texts(input)?.into_iter().flatten() {
            if !value.is_empty() && !key_values.iter().any(|k| k == value) {
                key_values.push(value.to_string());
            }
        }

        debug!("Mapped '{input}' to {} keys", key_values.len());

        Ok(Self {
            input: input.to_string(),
            output: output.to_string(),
            key_values,
        })
    }

    /// The names of the keys, indexed by key.
    pub fn key_values(&self) -> &[String] {
        &self.key_values
    }

    pub fn key_of(&self, value: &str) -> Option<u32> {
        self.key_values
            .iter()
            .position(|k| k == value)
            .map(|k| k as u32)
    }
}

impl Transformer for ValueToKeyTransform {
    fn name(&self) -> &'static str {
        "map_value_to_key"
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        input.require(&self.input)?.expect_kind("text")?;
        Ok(input
            .clone()
            .with_column(Column::key(&self.output, self.key_values.clone())))
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        let schema = self.output_schema(data.schema())?;
        let (_, mut rows) = data.into_parts();

        for row in &mut rows {
            let key = match row.get(&self.input) {
                Some(Value::Text(text)) => self.key_of(text),
                Some(_) => {
                    return Err(QuillonError::schema(format!(
                        "column '{}' does not hold text values",
                        self.input
                    )));
                }
                None => None,
            };
            row.insert(self.output.clone(), Value::Key(key));
        }

        Ok(DataView::from_parts(schema, rows))
    }
}

/// Decodes the keys of `input` back to their text values, writing `output`.
///
/// The key names are read from the `key_values` annotation of the input
/// column. The missing key decodes to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyToValueTransform {
    input: String,
    output: String,
}

impl KeyToValueTransform {
    pub fn new<I: Into<String>, O: Into<String>>(input: I, output: O) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    /// Decode `column` in place.
    pub fn in_place<S: Into<String>>(column: S) -> Self {
        let column = column.into();
        Self::new(column.clone(), column)
    }
}

impl Transformer for KeyToValueTransform {
    fn name(&self) -> &'static str {
        "map_key_to_value"
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        input.require(&self.input)?.expect_kind("key")?;
        input.key_values(&self.input)?;
        Ok(input.clone().with_column(Column::text(&self.output)))
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        let key_values = data.schema().key_values(&self.input)?.to_vec();
        let schema = self.output_schema(data.schema())?;
        let (_, mut rows) = data.into_parts();

        for row in &mut rows {
            let key = match row.get(&self.input) {
                Some(Value::Key(key)) => *key,
                Some(_) => {
                    return Err(QuillonError::schema(format!(
                        "column '{}' does not hold key values",
                        self.input
                    )));
                }
                None => None,
            };
            let text = match key {
                Some(k) => key_values
                    .get(k as usize)
                    .cloned()
                    .ok_or_else(|| {
                        QuillonError::schema(format!(
                            "key {k} out of range for column '{}'",
                            self.input
                        ))
                    })?,
                None => String::new(),
            };
            row.insert(self.output.clone(), Value::Text(text));
        }

        Ok(DataView::from_parts(schema, rows))
    }
}
