//! Vector column concatenation.

use serde::{Deserialize, Serialize};

use crate::data::view::{DataView, Value};
use crate::error::{QuillonError, Result};
use crate::ml::features::SparseVector;
use crate::ml::schema::{Column, ColumnKind, Schema};
use crate::ml::transforms::Transformer;

/// Concatenates one or more vector columns into `output`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConcatTransform {
    output: String,
    inputs: Vec<String>,
}

impl ConcatTransform {
    pub fn new<S: Into<String>>(output: S, inputs: Vec<String>) -> Result<Self> {
        if inputs.is_empty() {
            return Err(QuillonError::invalid_argument(
                "concatenate needs at least one input column",
            ));
        }
        Ok(Self {
            output: output.into(),
            inputs,
        })
    }

    pub fn inputs(&self) -> &[String] {
        &self.inputs
    }

    fn output_size(&self, schema: &Schema) -> Result<usize> {
        self.inputs.iter().try_fold(0, |total, name| {
            match schema.require(name)?.kind {
                ColumnKind::Vector { size } => Ok(total + size),
                ref other => Err(QuillonError::schema(format!(
                    "cannot concatenate column '{name}' of kind {}",
                    other.name()
                ))),
            }
        })
    }
}

impl Transformer for ConcatTransform {
    fn name(&self) -> &'static str {
        "concatenate"
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        let size = self.output_size(input)?;
        Ok(input.clone().with_column(Column::vector(&self.output, size)))
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        let schema = self.output_schema(data.schema())?;
        let (_, mut rows) = data.into_parts();

        for row in &mut rows {
            let parts = self
                .inputs
                .iter()
                .map(|name| {
                    row.get(name).and_then(Value::as_vector).ok_or_else(|| {
                        QuillonError::schema(format!("row has no vector in column '{name}'"))
                    })
                })
                .collect::<Result<Vec<&SparseVector>>>()?;
            let combined = SparseVector::concat(&parts);
            row.insert(self.output.clone(), Value::Vector(combined));
        }

        Ok(DataView::from_parts(schema, rows))
    }
}
