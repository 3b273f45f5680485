//! Command line argument parsing for the Quillon CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::ml::trainers::{
    GbdtOptions, LogisticRegressionOptions, MaximumEntropyOptions, NaiveBayesOptions,
    TrainerOptions,
};

/// The question asked by `predict` when none is given.
pub const DEFAULT_QUESTION: &str =
    "Sto avendo problemi con la valorizzazione di magazzino di fine anno, aiuto!";

/// Quillon - A multiclass support-question classifier
#[derive(Parser, Debug, Clone)]
#[command(name = "quillon")]
#[command(about = "Train, evaluate and query a support-question classifier")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(author = "Quillon Contributors")]
#[command(long_about = None)]
pub struct QuillonArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", env = "QUILLON_CONFIG")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl QuillonArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1, // Default to normal
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Train a model and save it
    Train(TrainArgs),

    /// Evaluate a saved model against labelled data
    Evaluate(EvaluateArgs),

    /// Classify a single question
    Predict(PredictArgs),
}

/// Arguments for training
#[derive(Parser, Debug, Clone)]
pub struct TrainArgs {
    /// Training data file (overrides the config)
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: Option<PathBuf>,

    /// Where to write the model (overrides the config)
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: Option<PathBuf>,

    /// Trainer to use, with default options
    #[arg(short, long)]
    pub trainer: Option<TrainerKind>,

    /// Random seed
    #[arg(short, long)]
    pub seed: Option<u64>,

    /// Field separator of the data file
    #[arg(long)]
    pub separator: Option<char>,

    /// Fraction of the data held out for evaluation
    #[arg(long, value_name = "FRACTION")]
    pub holdout: Option<f64>,
}

/// Arguments for evaluation
#[derive(Parser, Debug, Clone)]
pub struct EvaluateArgs {
    /// Test data file (overrides the config)
    #[arg(short, long, value_name = "DATA_FILE")]
    pub data: Option<PathBuf>,

    /// Model file (overrides the config)
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: Option<PathBuf>,

    /// Field separator of the data file
    #[arg(long)]
    pub separator: Option<char>,

    /// K of the top-K accuracy
    #[arg(short = 'k', long, default_value = "3")]
    pub top_k: usize,
}

/// Arguments for prediction
#[derive(Parser, Debug, Clone)]
pub struct PredictArgs {
    /// The question to classify
    #[arg(value_name = "QUESTION", default_value = DEFAULT_QUESTION)]
    pub question: String,

    /// Model file (overrides the config)
    #[arg(short, long, value_name = "MODEL_FILE")]
    pub model: Option<PathBuf>,

    /// Number of ranked categories to show (all when absent)
    #[arg(short, long)]
    pub top: Option<usize>,
}

/// Trainers selectable from the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TrainerKind {
    /// L2-regularized multinomial logistic regression
    MaximumEntropy,
    /// One binary logistic regression per category
    OneVersusAll,
    /// Bernoulli naive Bayes
    NaiveBayes,
    /// Gradient-boosted trees with the DART booster
    LightGbm,
}

impl TrainerKind {
    /// Options for this trainer. Configured options are kept when they are
    /// of the same kind.
    pub fn options(self, configured: &TrainerOptions) -> TrainerOptions {
        match (self, configured) {
            (TrainerKind::MaximumEntropy, TrainerOptions::MaximumEntropy(_))
            | (TrainerKind::OneVersusAll, TrainerOptions::OneVersusAll(_))
            | (TrainerKind::NaiveBayes, TrainerOptions::NaiveBayes(_))
            | (TrainerKind::LightGbm, TrainerOptions::LightGbm(_)) => configured.clone(),
            (TrainerKind::MaximumEntropy, _) => {
                TrainerOptions::MaximumEntropy(MaximumEntropyOptions::default())
            }
            (TrainerKind::OneVersusAll, _) => {
                TrainerOptions::OneVersusAll(LogisticRegressionOptions::default())
            }
            (TrainerKind::NaiveBayes, _) => TrainerOptions::NaiveBayes(NaiveBayesOptions::default()),
            (TrainerKind::LightGbm, _) => TrainerOptions::LightGbm(GbdtOptions::default()),
        }
    }
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}
