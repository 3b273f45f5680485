//! Fitted transforms.
//!
//! Every fitted pipeline step implements [`Transformer`]. The closed
//! [`Transform`] enum is what a trained pipeline stores and serializes.

pub mod concat;
pub mod conversion;
pub mod text;

pub use concat::ConcatTransform;
pub use conversion::{KeyToValueTransform, ValueToKeyTransform};
pub use text::{NgramOptions, TextFeaturizer, TextFeaturizerOptions, Weighting};

use serde::{Deserialize, Serialize};

use crate::data::view::DataView;
use crate::error::Result;
use crate::ml::schema::Schema;
use crate::ml::trainers::PredictorTransform;

/// A fitted step that maps one data view to another.
pub trait Transformer {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// The schema `transform` produces for data of schema `input`.
    fn output_schema(&self, input: &Schema) -> Result<Schema>;

    /// Apply the step to every row.
    fn transform(&self, data: DataView) -> Result<DataView>;
}

/// Any fitted pipeline step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Transform {
    FeaturizeText(TextFeaturizer),
    Concatenate(ConcatTransform),
    ValueToKey(ValueToKeyTransform),
    Predictor(PredictorTransform),
    KeyToValue(KeyToValueTransform),
}

impl Transform {
    fn inner(&self) -> &dyn Transformer {
        match self {
            Transform::FeaturizeText(t) => t,
            Transform::Concatenate(t) => t,
            Transform::ValueToKey(t) => t,
            Transform::Predictor(t) => t,
            Transform::KeyToValue(t) => t,
        }
    }
}

impl Transformer for Transform {
    fn name(&self) -> &'static str {
        self.inner().name()
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        self.inner().output_schema(input)
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        self.inner().transform(data)
    }
}
