//! Output formatting for CLI commands.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::cli::args::{OutputFormat, QuillonArgs};
use crate::error::Result;
use crate::ml::evaluation::MulticlassMetrics;
use crate::ml::prediction::RankedScores;

/// Result structure for training.
#[derive(Debug, Serialize, Deserialize)]
pub struct TrainingResult {
    pub model_path: String,
    pub trainer: String,
    pub seed: u64,
    pub training_rows: usize,
    pub categories: Vec<String>,
    /// Width of the feature vector.
    pub num_features: usize,
    pub duration_ms: u64,
    /// Metrics on the held-out rows, when a hold-out fraction was given.
    pub holdout_metrics: Option<MulticlassMetrics>,
}

/// Result structure for evaluation.
#[derive(Debug, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub model_path: String,
    pub data_path: String,
    pub metrics: MulticlassMetrics,
}

/// Result structure for a single prediction.
#[derive(Debug, Serialize, Deserialize)]
pub struct PredictionResult {
    pub question: String,
    pub category: String,
    pub scores: RankedScores,
}

impl fmt::Display for TrainingResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Trainer:    {}", self.trainer)?;
        writeln!(f, "Seed:       {}", self.seed)?;
        writeln!(f, "Rows:       {}", self.training_rows)?;
        writeln!(f, "Categories: {}", self.categories.join(", "))?;
        writeln!(f, "Features:   {}", self.num_features)?;
        writeln!(f, "Model:      {}", self.model_path)?;
        writeln!(f, "Time:       {} ms", self.duration_ms)?;
        if let Some(metrics) = &self.holdout_metrics {
            writeln!(f, "{metrics}")?;
        }
        write!(f, "Finished")
    }
}

impl fmt::Display for EvaluationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.metrics)?;
        if self.metrics.skipped_rows > 0 {
            write!(
                f,
                "\n{} rows skipped (category unknown to the model)",
                self.metrics.skipped_rows
            )?;
        }
        Ok(())
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "=============== Single Prediction - Result: {} ===============",
            self.category
        )?;
        let width = self
            .scores
            .iter()
            .map(|entry| entry.category.chars().count())
            .max()
            .unwrap_or(0);
        for entry in self.scores.iter() {
            writeln!(f, "{:<width$}  {:.4}", entry.category, entry.score)?;
        }
        Ok(())
    }
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &QuillonArgs) -> Result<()>
where
    T: Serialize + fmt::Display,
{
    match args.output_format {
        OutputFormat::Human => output_human(message, result, args),
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in human-readable format.
fn output_human<T: fmt::Display>(message: &str, result: &T, args: &QuillonArgs) -> Result<()> {
    if args.verbosity() > 1 {
        println!("{message}");
        println!();
    }
    println!("{result}");
    Ok(())
}

fn output_json<T: Serialize>(result: &T, args: &QuillonArgs) -> Result<()> {
    println!("{}", to_json(result, args.pretty)?);
    Ok(())
}

fn to_json<T: Serialize>(result: &T, pretty: bool) -> Result<String> {
    let json = if pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };
    Ok(json)
}
