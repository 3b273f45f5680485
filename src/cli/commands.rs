//! Command implementations for the Quillon CLI.

use std::path::Path;
use std::time::Instant;

use log::{info, warn};

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::ClassifierConfig;
use crate::data::{DataView, QuestionRecord, train_test_split};
use crate::error::Result;
use crate::ml::evaluation::{MulticlassMetrics, evaluate};
use crate::ml::pipeline::{FEATURES_COLUMN, LABEL_COLUMN, SCORE_COLUMN, question_pipeline};
use crate::ml::prediction::PredictionEngine;
use crate::ml::schema::ColumnKind;
use crate::ml::TrainedPipeline;

/// Top-K used for hold-out metrics after training.
const HOLDOUT_TOP_K: usize = 3;

/// Execute a CLI command.
pub fn execute_command(args: QuillonArgs) -> Result<()> {
    let config = load_config(&args)?;
    match &args.command {
        Command::Train(train_args) => train(train_args.clone(), config, &args),
        Command::Evaluate(evaluate_args) => evaluate_model(evaluate_args.clone(), config, &args),
        Command::Predict(predict_args) => predict(predict_args.clone(), config, &args),
    }
}

/// The configuration file given on the command line, or the defaults.
fn load_config(args: &QuillonArgs) -> Result<ClassifierConfig> {
    match &args.config {
        Some(path) => ClassifierConfig::from_file(path),
        None => Ok(ClassifierConfig::default()),
    }
}

/// Train a model and save it.
fn train(args: TrainArgs, mut config: ClassifierConfig, cli_args: &QuillonArgs) -> Result<()> {
    if let Some(data) = args.data {
        config.data.train_path = data;
    }
    if let Some(model) = args.model {
        config.data.model_path = model;
    }
    if let Some(kind) = args.trainer {
        config.trainer = kind.options(&config.trainer);
    }
    if let Some(separator) = args.separator {
        config.data.separator = separator;
    }
    if let Some(holdout) = args.holdout {
        config.holdout_fraction = holdout;
    }
    if args.seed.is_some() {
        config.seed = args.seed;
    }
    config.validate()?;

    let seed = config.seed_or_random();
    if config.seed.is_none() {
        info!("No seed configured, using {seed}");
    }

    let start_time = Instant::now();
    let records = config.data.loader()?.load_path(&config.data.train_path)?;
    info!(
        "Loaded {} records from {}",
        records.len(),
        config.data.train_path.display()
    );

    let (train_records, holdout_records) = if config.holdout_fraction > 0.0 {
        train_test_split(&records, config.holdout_fraction, seed)?
    } else {
        (records, Vec::new())
    };

    let chain = question_pipeline(config.featurizer.clone(), config.trainer.clone());
    let pipeline = chain.fit(&DataView::from_records(&train_records), seed)?;

    // Evaluated before saving so a failing hold-out leaves no model behind.
    let holdout_metrics = if config.holdout_fraction > 0.0 {
        holdout_metrics(&pipeline, &holdout_records)?
    } else {
        None
    };
    pipeline.save(&config.data.model_path)?;

    output_result(
        "Model trained successfully",
        &TrainingResult {
            model_path: display_path(&config.data.model_path),
            trainer: config.trainer.name().to_string(),
            seed,
            training_rows: train_records.len(),
            categories: pipeline.output_schema().slot_names(SCORE_COLUMN)?.to_vec(),
            num_features: feature_width(&pipeline),
            duration_ms: start_time.elapsed().as_millis() as u64,
            holdout_metrics,
        },
        cli_args,
    )
}

/// Score the hold-out rows; `None` when none of them can be evaluated.
fn holdout_metrics(
    pipeline: &TrainedPipeline,
    records: &[QuestionRecord],
) -> Result<Option<MulticlassMetrics>> {
    if records.is_empty() {
        warn!("Hold-out split is empty, skipping evaluation");
        return Ok(None);
    }

    let scored = pipeline.transform(DataView::from_records(records))?;
    if scored.keys(LABEL_COLUMN)?.iter().all(Option::is_none) {
        warn!(
            "None of the {} hold-out rows has a category seen in training, skipping evaluation",
            records.len()
        );
        return Ok(None);
    }

    evaluate(&scored, LABEL_COLUMN, SCORE_COLUMN, HOLDOUT_TOP_K).map(Some)
}

fn feature_width(pipeline: &TrainedPipeline) -> usize {
    match pipeline.output_schema().column(FEATURES_COLUMN).map(|c| &c.kind) {
        Some(ColumnKind::Vector { size }) => *size,
        _ => 0,
    }
}

/// Evaluate a saved model against labelled data.
fn evaluate_model(
    args: EvaluateArgs,
    mut config: ClassifierConfig,
    cli_args: &QuillonArgs,
) -> Result<()> {
    if let Some(data) = args.data {
        config.data.test_path = data;
    }
    if let Some(model) = args.model {
        config.data.model_path = model;
    }
    if let Some(separator) = args.separator {
        config.data.separator = separator;
    }
    config.validate()?;

    let pipeline = TrainedPipeline::load(&config.data.model_path)?;
    let records = config.data.loader()?.load_path(&config.data.test_path)?;
    info!(
        "Evaluating {} records from {}",
        records.len(),
        config.data.test_path.display()
    );

    let scored = pipeline.transform(DataView::from_records(&records))?;
    let metrics = evaluate(&scored, LABEL_COLUMN, SCORE_COLUMN, args.top_k)?;

    output_result(
        "Model evaluated",
        &EvaluationResult {
            model_path: display_path(&config.data.model_path),
            data_path: display_path(&config.data.test_path),
            metrics,
        },
        cli_args,
    )
}

/// Classify one question.
fn predict(args: PredictArgs, mut config: ClassifierConfig, cli_args: &QuillonArgs) -> Result<()> {
    if let Some(model) = args.model {
        config.data.model_path = model;
    }

    let engine = PredictionEngine::from_path(&config.data.model_path)?;
    let (prediction, ranked) = engine.predict_ranked(&args.question)?;
    let scores = match args.top {
        Some(n) => ranked.top(n),
        None => ranked,
    };

    output_result(
        "Prediction",
        &PredictionResult {
            question: args.question,
            category: prediction.category,
            scores,
        },
        cli_args,
    )
}

fn display_path(path: &Path) -> String {
    path.to_string_lossy().to_string()
}
