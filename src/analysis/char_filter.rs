//! Char filter implementations for text normalization.
//!
//! Char filters pre-process the raw text before it is passed to the
//! tokenizer, e.g. to strip diacritics or remove punctuation.
//!
//! # Available Filters
//!
//! - [`diacritics::DiacriticsCharFilter`] - Strips combining marks after NFD decomposition
//! - [`pattern_replace::PatternReplaceCharFilter`] - Regex-based replacement
//!
//! # Examples
//!
//! ```
//! use quillon::analysis::char_filter::CharFilter;
//! use quillon::analysis::char_filter::diacritics::DiacriticsCharFilter;
//!
//! let filter = DiacriticsCharFilter::new();
//! assert_eq!(filter.filter("contabilità"), "contabilita");
//! ```

/// Trait for character filters that transform text before tokenization.
pub trait CharFilter: Send + Sync {
    /// Apply this filter to the input text and return the filtered text.
    fn filter(&self, input: &str) -> String;

    /// Get the name of this char filter.
    fn name(&self) -> &'static str;
}

pub mod diacritics;
pub mod pattern_replace;

pub use diacritics::DiacriticsCharFilter;
pub use pattern_replace::PatternReplaceCharFilter;
