//! Estimator chains and trained pipelines.
//!
//! An [`EstimatorChain`] is an ordered list of unfitted steps. Fitting walks
//! the chain: each step is fitted on the data as transformed by the steps
//! before it, then used to transform that data for the next step. The result
//! is a [`TrainedPipeline`]: the input schema plus the fitted transforms.
//!
//! # Examples
//!
//! ```no_run
//! use quillon::data::{CsvLoader, DataView};
//! use quillon::ml::pipeline::question_pipeline;
//! use quillon::ml::trainers::TrainerOptions;
//! use quillon::ml::transforms::TextFeaturizerOptions;
//!
//! let records = CsvLoader::new().load_path("data/asi_train_set.csv").unwrap();
//! let data = DataView::from_records(&records);
//!
//! let chain = question_pipeline(TextFeaturizerOptions::default(), TrainerOptions::default());
//! let model = chain.fit(&data, 42).unwrap();
//! model.save("models/asi_sdca_model.bin").unwrap();
//! ```

use std::path::Path;
use std::time::Instant;

use log::{debug, info};

use crate::data::record::{CATEGORY_COLUMN, QUESTION_COLUMN};
use crate::data::view::DataView;
use crate::error::{QuillonError, Result};
use crate::ml::model_io;
use crate::ml::schema::Schema;
use crate::ml::trainers::{PredictorColumns, PredictorTransform, TrainerOptions};
use crate::ml::transforms::{
    ConcatTransform, KeyToValueTransform, TextFeaturizer, TextFeaturizerOptions, Transform,
    Transformer, ValueToKeyTransform,
};

/// Featurized question text.
pub const QUESTION_ENCODED_COLUMN: &str = "QuestionEncoded";
/// Concatenated feature vector.
pub const FEATURES_COLUMN: &str = "Features";
/// Label keys.
pub const LABEL_COLUMN: &str = "Label";
/// Per-class scores.
pub const SCORE_COLUMN: &str = "Score";
/// Predicted label, decoded to the category name by the last step.
pub const PREDICTED_LABEL_COLUMN: &str = "PredictedLabel";

/// An unfitted pipeline step.
#[derive(Debug, Clone, PartialEq)]
pub enum EstimatorStep {
    FeaturizeText {
        input: String,
        output: String,
        options: TextFeaturizerOptions,
    },
    Concatenate {
        output: String,
        inputs: Vec<String>,
    },
    MapValueToKey {
        input: String,
        output: String,
    },
    Train {
        columns: PredictorColumns,
        trainer: TrainerOptions,
    },
    MapKeyToValue {
        input: String,
        output: String,
    },
}

impl EstimatorStep {
    pub fn name(&self) -> &'static str {
        match self {
            EstimatorStep::FeaturizeText { .. } => "featurize_text",
            EstimatorStep::Concatenate { .. } => "concatenate",
            EstimatorStep::MapValueToKey { .. } => "map_value_to_key",
            EstimatorStep::Train { .. } => "train",
            EstimatorStep::MapKeyToValue { .. } => "map_key_to_value",
        }
    }

    /// Fit this step on `data`.
    pub fn fit(&self, data: &DataView, seed: u64) -> Result<Transform> {
        let transform = match self {
            EstimatorStep::FeaturizeText {
                input,
                output,
                options,
            } => Transform::FeaturizeText(TextFeaturizer::fit(
                data,
                input,
                output,
                options.clone(),
            )?),
            EstimatorStep::Concatenate { output, inputs } => {
                Transform::Concatenate(ConcatTransform::new(output.clone(), inputs.clone())?)
            }
            EstimatorStep::MapValueToKey { input, output } => {
                Transform::ValueToKey(ValueToKeyTransform::fit(data, input, output)?)
            }
            EstimatorStep::Train { columns, trainer } => Transform::Predictor(
                PredictorTransform::fit(data, columns.clone(), trainer, seed)?,
            ),
            EstimatorStep::MapKeyToValue { input, output } => {
                Transform::KeyToValue(KeyToValueTransform::new(input.clone(), output.clone()))
            }
        };
        Ok(transform)
    }
}

/// An ordered chain of estimator steps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EstimatorChain {
    steps: Vec<EstimatorStep>,
}

impl EstimatorChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn append(mut self, step: EstimatorStep) -> Self {
        self.steps.push(step);
        self
    }

    pub fn steps(&self) -> &[EstimatorStep] {
        &self.steps
    }

    /// Fit every step in order. `seed` is passed to the trainer.
    pub fn fit(&self, data: &DataView, seed: u64) -> Result<TrainedPipeline> {
        if self.steps.is_empty() {
            return Err(QuillonError::invalid_argument("estimator chain is empty"));
        }
        if data.is_empty() {
            return Err(QuillonError::insufficient_data(1, 0));
        }

        info!(
            "Fitting pipeline of {} steps on {} rows",
            self.steps.len(),
            data.len()
        );
        let start_time = Instant::now();
        let input_schema = data.schema().clone();
        let mut current = data.clone();
        let mut transforms = Vec::with_capacity(self.steps.len());

        for (position, step) in self.steps.iter().enumerate() {
            let step_start = Instant::now();
            let transform = step.fit(&current, seed)?;
            // The last step's output is not needed for fitting.
            if position + 1 < self.steps.len() {
                current = transform.transform(current)?;
            }
            debug!(
                "Fitted step {} ({}) in {} ms",
                position,
                step.name(),
                step_start.elapsed().as_millis()
            );
            transforms.push(transform);
        }

        info!("Pipeline fitted in {} ms", start_time.elapsed().as_millis());
        TrainedPipeline::new(input_schema, transforms)
    }
}

/// Build the question classification chain:
/// featurize `Question`, concatenate into `Features`, map `Category` to
/// `Label` keys, train, and decode `PredictedLabel`.
pub fn question_pipeline(
    featurizer: TextFeaturizerOptions,
    trainer: TrainerOptions,
) -> EstimatorChain {
    EstimatorChain::new()
        .append(EstimatorStep::FeaturizeText {
            input: QUESTION_COLUMN.to_string(),
            output: QUESTION_ENCODED_COLUMN.to_string(),
            options: featurizer,
        })
        .append(EstimatorStep::Concatenate {
            output: FEATURES_COLUMN.to_string(),
            inputs: vec![QUESTION_ENCODED_COLUMN.to_string()],
        })
        .append(EstimatorStep::MapValueToKey {
            input: CATEGORY_COLUMN.to_string(),
            output: LABEL_COLUMN.to_string(),
        })
        .append(EstimatorStep::Train {
            columns: PredictorColumns {
                label: LABEL_COLUMN.to_string(),
                features: FEATURES_COLUMN.to_string(),
                score: SCORE_COLUMN.to_string(),
                predicted_label: PREDICTED_LABEL_COLUMN.to_string(),
            },
            trainer,
        })
        .append(EstimatorStep::MapKeyToValue {
            input: PREDICTED_LABEL_COLUMN.to_string(),
            output: PREDICTED_LABEL_COLUMN.to_string(),
        })
}

/// A fitted pipeline.
#[derive(Debug, Clone)]
pub struct TrainedPipeline {
    input_schema: Schema,
    output_schema: Schema,
    transforms: Vec<Transform>,
}

impl TrainedPipeline {
    /// Assemble a pipeline, checking that the transforms chain up from
    /// `input_schema`.
    pub fn new(input_schema: Schema, transforms: Vec<Transform>) -> Result<Self> {
        let output_schema = transforms
            .iter()
            .try_fold(input_schema.clone(), |schema, t| t.output_schema(&schema))?;
        Ok(Self {
            input_schema,
            output_schema,
            transforms,
        })
    }

    /// The schema of the data the pipeline was fitted on.
    pub fn input_schema(&self) -> &Schema {
        &self.input_schema
    }

    /// The schema produced by [`TrainedPipeline::transform`].
    pub fn output_schema(&self) -> &Schema {
        &self.output_schema
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    /// The fitted predictor, if the pipeline has one.
    pub fn predictor(&self) -> Option<&PredictorTransform> {
        self.transforms.iter().find_map(|t| match t {
            Transform::Predictor(p) => Some(p),
            _ => None,
        })
    }

    /// Apply every transform in order.
    pub fn transform(&self, data: DataView) -> Result<DataView> {
        self.transforms
            .iter()
            .try_fold(data, |current, t| t.transform(current))
    }

    /// Save to `path` in the model file format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        model_io::save_model(path, self)
    }

    /// Load a pipeline saved with [`TrainedPipeline::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        model_io::load_model(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::QuestionRecord;
    use crate::ml::schema::ColumnKind;

    fn records() -> Vec<QuestionRecord> {
        vec![
            QuestionRecord::new("Magazzino", "inventario di magazzino"),
            QuestionRecord::new("Magazzino", "giacenze di magazzino errate"),
            QuestionRecord::new("Fatturazione", "fattura elettronica scartata"),
            QuestionRecord::new("Fatturazione", "emissione fattura differita"),
        ]
    }

    #[test]
    fn test_question_pipeline_steps() {
        let chain = question_pipeline(TextFeaturizerOptions::default(), TrainerOptions::default());
        let names: Vec<_> = chain.steps().iter().map(|s| s.name()).collect();
        assert_eq!(
            names,
            vec![
                "featurize_text",
                "concatenate",
                "map_value_to_key",
                "train",
                "map_key_to_value"
            ]
        );
    }

    #[test]
    fn test_fit_and_transform() {
        let data = DataView::from_records(&records());
        let chain = question_pipeline(TextFeaturizerOptions::default(), TrainerOptions::default());
        let model = chain.fit(&data, 1).unwrap();

        assert_eq!(model.transforms().len(), 5);
        assert_eq!(model.input_schema(), &DataView::record_schema());
        assert_eq!(
            model.output_schema().slot_names(SCORE_COLUMN).unwrap(),
            &["Magazzino", "Fatturazione"]
        );
        assert_eq!(
            model.output_schema().require(PREDICTED_LABEL_COLUMN).unwrap().kind,
            ColumnKind::Text
        );

        let scored = model
            .transform(DataView::from_records(&[QuestionRecord::unlabelled(
                "magazzino errato",
            )]))
            .unwrap();
        assert_eq!(
            scored.texts(PREDICTED_LABEL_COLUMN).unwrap(),
            vec![Some("Magazzino")]
        );
    }

    #[test]
    fn test_empty_inputs_rejected() {
        let chain = question_pipeline(TextFeaturizerOptions::default(), TrainerOptions::default());
        assert!(chain.fit(&DataView::from_records(&[]), 1).is_err());
        assert!(EstimatorChain::new()
            .fit(&DataView::from_records(&records()), 1)
            .is_err());
    }

    #[test]
    fn test_transforms_must_chain() {
        let bad = vec![Transform::KeyToValue(KeyToValueTransform::in_place("Label"))];
        assert!(TrainedPipeline::new(DataView::record_schema(), bad).is_err());
    }
}
