//! Core analyzer trait definition.
//!
//! Analyzers combine char filters, a tokenizer and token filters into the
//! complete text processing pipeline:
//!
//! ```text
//! Raw Text → Char Filters → Tokenizer → Filter 1 … Filter N → Token Stream
//! ```
//!
//! # Examples
//!
//! Implementing a custom analyzer:
//!
//! ```
//! use quillon::analysis::analyzer::Analyzer;
//! use quillon::analysis::token::TokenStream;
//! use quillon::error::Result;
//!
//! struct MyAnalyzer;
//!
//! impl Analyzer for MyAnalyzer {
//!     fn analyze(&self, text: &str) -> Result<TokenStream> {
//!         Ok(Box::new(std::iter::empty()))
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "my_analyzer"
//!     }
//! }
//! ```

use crate::analysis::token::TokenStream;
use crate::error::Result;

/// Trait for analyzers that convert text into processed tokens.
///
/// The trait requires `Send + Sync` so a fitted featurizer can be shared
/// between threads.
pub trait Analyzer: Send + Sync {
    /// Analyze the given text and return a stream of tokens.
    fn analyze(&self, text: &str) -> Result<TokenStream>;

    /// Get the name of this analyzer (for debugging and configuration).
    fn name(&self) -> &'static str;
}
