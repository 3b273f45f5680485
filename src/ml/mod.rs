//! Machine learning for question classification.
//!
//! The modules follow the life of a model: [`schema`] and [`features`]
//! describe the data, [`transforms`] and [`trainers`] are the pipeline steps,
//! [`pipeline`] fits them, [`model_io`] persists the result, and
//! [`evaluation`] and [`prediction`] use it.

pub mod evaluation;
pub mod features;
pub mod model_io;
pub mod pipeline;
pub mod prediction;
pub mod schema;
pub mod trainers;
pub mod transforms;

pub use evaluation::{MulticlassMetrics, evaluate};
pub use features::{SparseVector, VectorNorm};
pub use pipeline::{EstimatorChain, EstimatorStep, TrainedPipeline, question_pipeline};
pub use prediction::{PredictionEngine, QuestionPrediction, RankedScores, rank_scores};
pub use schema::{Column, ColumnKind, Schema};
pub use trainers::TrainerOptions;
