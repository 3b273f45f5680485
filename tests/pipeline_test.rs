use std::fs;
use std::path::PathBuf;

use quillon::data::{CsvLoader, DataView, QuestionRecord};
use quillon::error::{QuillonError, Result};
use quillon::ml::evaluation::evaluate;
use quillon::ml::pipeline::{LABEL_COLUMN, SCORE_COLUMN, TrainedPipeline, question_pipeline};
use quillon::ml::prediction::{PredictionEngine, rank_scores};
use quillon::ml::trainers::{
    GbdtOptions, LogisticRegressionOptions, MaximumEntropyOptions, NaiveBayesOptions,
    TrainerOptions,
};
use quillon::ml::transforms::TextFeaturizerOptions;

const QUESTION: &str =
    "Sto avendo problemi con la valorizzazione di magazzino di fine anno, aiuto!";

fn data_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data").join(name)
}

fn load(name: &str) -> Result<Vec<QuestionRecord>> {
    CsvLoader::new().load_path(data_path(name))
}

fn small_gbdt() -> TrainerOptions {
    TrainerOptions::LightGbm(GbdtOptions {
        num_iterations: 10,
        max_depth: 3,
        ..GbdtOptions::default()
    })
}

fn train(trainer: TrainerOptions, seed: u64) -> Result<TrainedPipeline> {
    let records = load("asi_train_set.csv")?;
    question_pipeline(TextFeaturizerOptions::default(), trainer)
        .fit(&DataView::from_records(&records), seed)
}

#[test]
fn test_training_is_byte_identical() -> Result<()> {
    let dir = tempfile::tempdir()?;

    for (name, trainer) in [
        (
            "maxent",
            TrainerOptions::MaximumEntropy(MaximumEntropyOptions::default()),
        ),
        (
            "ova",
            TrainerOptions::OneVersusAll(LogisticRegressionOptions::default()),
        ),
        (
            "naive_bayes",
            TrainerOptions::NaiveBayes(NaiveBayesOptions::default()),
        ),
        ("gbdt", small_gbdt()),
    ] {
        let first = dir.path().join(format!("{name}_1.bin"));
        let second = dir.path().join(format!("{name}_2.bin"));

        train(trainer.clone(), 42)?.save(&first)?;
        train(trainer, 42)?.save(&second)?;

        assert_eq!(
            fs::read(&first)?,
            fs::read(&second)?,
            "{name} model bytes differ between runs"
        );
    }
    Ok(())
}

#[test]
fn test_known_question_is_classified() -> Result<()> {
    for trainer in [
        TrainerOptions::MaximumEntropy(MaximumEntropyOptions::default()),
        TrainerOptions::OneVersusAll(LogisticRegressionOptions::default()),
        TrainerOptions::NaiveBayes(NaiveBayesOptions::default()),
        // DART booster with default settings
        TrainerOptions::LightGbm(GbdtOptions::default()),
    ] {
        let name = trainer.name();
        let engine = PredictionEngine::new(train(trainer, 7)?)?;
        let prediction = engine.predict(QUESTION)?;
        assert_eq!(prediction.category, "Magazzino", "trainer {name}");
    }
    Ok(())
}

#[test]
fn test_ranking_preserves_scores() -> Result<()> {
    let engine = PredictionEngine::new(train(TrainerOptions::default(), 1)?)?;
    let (prediction, ranked) = engine.predict_ranked(QUESTION)?;

    assert_eq!(ranked.len(), 4);
    let raw_sum: f32 = prediction.score.iter().sum();
    assert!((ranked.total() - raw_sum).abs() < 1e-5);
    assert!((raw_sum - 1.0).abs() < 1e-4);

    let scores: Vec<f32> = ranked.iter().map(|entry| entry.score).collect();
    assert!(scores.windows(2).all(|pair| pair[0] >= pair[1]));
    assert_eq!(
        ranked.best().map(|entry| entry.category.as_str()),
        Some(prediction.category.as_str())
    );

    // Same ranking when computed from the output schema directly.
    let again = rank_scores(engine.output_schema(), SCORE_COLUMN, &prediction.score)?;
    assert_eq!(again, ranked);
    Ok(())
}

#[test]
fn test_saved_model_predicts_like_the_fitted_one() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("models").join("model.bin");

    let pipeline = train(TrainerOptions::default(), 3)?;
    pipeline.save(&path)?;

    let fitted = PredictionEngine::new(pipeline)?;
    let loaded = PredictionEngine::from_path(&path)?;

    for question in [QUESTION, "La fattura elettronica è stata scartata", ""] {
        assert_eq!(fitted.predict(question)?, loaded.predict(question)?);
    }
    Ok(())
}

#[test]
fn test_corrupt_model_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("model.bin");
    train(TrainerOptions::NaiveBayes(NaiveBayesOptions::default()), 0)?.save(&path)?;

    let mut bytes = fs::read(&path)?;
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes)?;

    match TrainedPipeline::load(&path) {
        Err(QuillonError::ModelFormat(_)) => {}
        other => panic!("expected a model format error, got {other:?}"),
    }
    Ok(())
}

#[test]
fn test_evaluation_on_test_set() -> Result<()> {
    let pipeline = train(TrainerOptions::default(), 11)?;
    let records = load("asi_test_set.csv")?;
    let scored = pipeline.transform(DataView::from_records(&records))?;

    let metrics = evaluate(&scored, LABEL_COLUMN, SCORE_COLUMN, 2)?;

    // "Assistenza" is not a training category.
    assert_eq!(metrics.skipped_rows, 1);
    assert_eq!(metrics.evaluated_rows, records.len() - 1);
    assert!((0.0..=1.0).contains(&metrics.micro_accuracy));
    assert!(metrics.top_k_accuracy >= metrics.micro_accuracy);
    assert!(metrics.log_loss > 0.0);
    assert!(metrics.to_string().contains("MicroAccuracy"));
    Ok(())
}
