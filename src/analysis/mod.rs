//! Text analysis module for Quillon.
//!
//! This module provides the text processing used by the featurizer: char
//! filters normalize raw text, a tokenizer splits it, and token filters
//! rewrite or drop tokens before they are counted.

pub mod analyzer;
pub mod char_filter;
pub mod token;
pub mod token_filter;
pub mod tokenizer;

// Re-export commonly used types
pub use analyzer::*;
pub use char_filter::*;
pub use token::*;
pub use token_filter::*;
pub use tokenizer::*;
