//! # Quillon
//!
//! A multiclass classifier for support questions.
//!
//! ## Features
//!
//! - Text analysis pipeline (char filters, tokenizers, token filters)
//! - Word and character n-gram featurization with TF/IDF weighting
//! - Maximum entropy, one-versus-all, naive Bayes and gradient-boosted tree trainers
//! - Deterministic, checksummed model files
//! - Evaluation metrics and ranked single predictions
//!
//! ## Example
//!
//! ```
//! use quillon::data::{DataView, QuestionRecord};
//! use quillon::ml::{TrainerOptions, question_pipeline};
//! use quillon::ml::prediction::PredictionEngine;
//!
//! let records = vec![
//!     QuestionRecord::new("Magazzino", "valorizzazione del magazzino"),
//!     QuestionRecord::new("Magazzino", "giacenze di magazzino a fine anno"),
//!     QuestionRecord::new("Fatturazione", "stampa della fattura elettronica"),
//!     QuestionRecord::new("Fatturazione", "fattura non inviata allo sdi"),
//! ];
//!
//! let chain = question_pipeline(Default::default(), TrainerOptions::default());
//! let pipeline = chain.fit(&DataView::from_records(&records), 42).unwrap();
//!
//! let engine = PredictionEngine::new(pipeline).unwrap();
//! let prediction = engine.predict("problemi con il magazzino").unwrap();
//! assert_eq!(prediction.score.len(), 2);
//! ```

pub mod analysis;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod ml;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
