//! Stop filter implementation.
//!
//! Removes common words that carry little signal for classification. Default
//! word lists are provided for English and Italian.
//!
//! # Examples
//!
//! ```
//! use quillon::analysis::token_filter::Filter;
//! use quillon::analysis::token_filter::stop::StopFilter;
//! use quillon::analysis::token::Token;
//!
//! let filter = StopFilter::italian();
//! let tokens = vec![
//!     Token::new("problemi", 0),
//!     Token::new("con", 1),
//!     Token::new("la", 2),
//!     Token::new("fattura", 3),
//! ];
//!
//! let result: Vec<_> = filter.filter(Box::new(tokens.into_iter()))
//!     .unwrap()
//!     .collect();
//!
//! assert_eq!(result.len(), 2);
//! assert_eq!(result[0].text, "problemi");
//! assert_eq!(result[1].text, "fattura");
//! ```

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use serde::{Deserialize, Serialize};

use crate::analysis::token::{Token, TokenStream};
use crate::analysis::token_filter::Filter;
use crate::error::Result;

/// Default English stop words list.
const DEFAULT_ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

/// Default Italian stop words list.
const DEFAULT_ITALIAN_STOP_WORDS: &[&str] = &[
    "a", "ad", "agli", "ai", "al", "alla", "alle", "allo", "anche", "c", "che", "chi", "ci",
    "come", "con", "da", "dai", "dal", "dalla", "dalle", "degli", "dei", "del", "della", "delle",
    "dello", "di", "e", "ed", "fra", "gli", "i", "il", "in", "io", "l", "la", "le", "lo", "ma",
    "mi", "ne", "nei", "nel", "nella", "nelle", "non", "o", "per", "più", "quando", "questa",
    "questo", "se", "si", "sono", "su", "sul", "sulla", "ti", "tra", "un", "una", "uno", "è",
];

/// Default English stop words as a HashSet.
pub static DEFAULT_ENGLISH_STOP_WORDS_SET: LazyLock<HashSet<String>> = LazyLock::new(|| {
    DEFAULT_ENGLISH_STOP_WORDS
        .iter()
        .map(|&s| s.to_string())
        .collect()
});

/// Default Italian stop words as a HashSet.
pub static DEFAULT_ITALIAN_STOP_WORDS_SET: LazyLock<HashSet<String>> = LazyLock::new(|| {
    DEFAULT_ITALIAN_STOP_WORDS
        .iter()
        .map(|&s| s.to_string())
        .collect()
});

/// Built-in stop word lists.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopWordsLanguage {
    English,
    Italian,
}

/// A filter that removes stop words from the token stream.
#[derive(Clone, Debug)]
pub struct StopFilter {
    /// The set of stop words to remove
    stop_words: Arc<HashSet<String>>,
    /// Whether to remove stopped tokens entirely or just mark them as stopped
    remove_stopped: bool,
}

impl StopFilter {
    /// Create a new stop filter with the default English stop words.
    pub fn new() -> Self {
        Self::with_stop_words(DEFAULT_ENGLISH_STOP_WORDS_SET.clone())
    }

    /// Create a new stop filter with the default Italian stop words.
    pub fn italian() -> Self {
        Self::with_stop_words(DEFAULT_ITALIAN_STOP_WORDS_SET.clone())
    }

    /// Create a stop filter for one of the built-in languages.
    pub fn for_language(language: StopWordsLanguage) -> Self {
        match language {
            StopWordsLanguage::English => Self::new(),
            StopWordsLanguage::Italian => Self::italian(),
        }
    }

    /// Create a new stop filter with custom stop words.
    pub fn with_stop_words(stop_words: HashSet<String>) -> Self {
        StopFilter {
            stop_words: Arc::new(stop_words),
            remove_stopped: true,
        }
    }

    /// Create a new stop filter from a list of stop words.
    pub fn from_words<I, S>(words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let stop_words = words.into_iter().map(|s| s.into()).collect();
        Self::with_stop_words(stop_words)
    }

    /// Set whether to remove stopped tokens entirely or just mark them as stopped.
    pub fn remove_stopped(mut self, remove: bool) -> Self {
        self.remove_stopped = remove;
        self
    }

    /// Check if a word is a stop word.
    pub fn is_stop_word(&self, word: &str) -> bool {
        self.stop_words.contains(word)
    }

    /// Get the number of stop words.
    pub fn len(&self) -> usize {
        self.stop_words.len()
    }

    /// Check if the stop word set is empty.
    pub fn is_empty(&self) -> bool {
        self.stop_words.is_empty()
    }
}

impl Default for StopFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl Filter for StopFilter {
    fn filter(&self, tokens: TokenStream) -> Result<TokenStream> {
        let filtered_tokens: Vec<Token> = tokens
            .filter_map(|token| {
                if token.is_stopped() {
                    Some(token)
                } else if self.is_stop_word(&token.text) {
                    if self.remove_stopped {
                        None
                    } else {
                        Some(token.stop())
                    }
                } else {
                    Some(token)
                }
            })
            .collect();

        Ok(Box::new(filtered_tokens.into_iter()))
    }

    fn name(&self) -> &'static str {
        "stop"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::token::Token;

    #[test]
    fn test_stop_filter() {
        let filter = StopFilter::from_words(vec!["the", "and", "or"]);
        let tokens = vec![
            Token::new("hello", 0),
            Token::new("the", 1),
            Token::new("world", 2),
            Token::new("and", 3),
            Token::new("test", 4),
        ];
        let token_stream = Box::new(tokens.into_iter());

        let result: Vec<Token> = filter.filter(token_stream).unwrap().collect();

        assert_eq!(result.len(), 3);
        assert_eq!(result[0].text, "hello");
        assert_eq!(result[1].text, "world");
        assert_eq!(result[2].text, "test");
    }

    #[test]
    fn test_stop_filter_preserve_stopped() {
        let filter = StopFilter::from_words(vec!["the", "and"]).remove_stopped(false);
        let tokens = vec![Token::new("hello", 0), Token::new("the", 1)];
        let token_stream = Box::new(tokens.into_iter());

        let result: Vec<Token> = filter.filter(token_stream).unwrap().collect();

        assert_eq!(result.len(), 2);
        assert!(!result[0].is_stopped());
        assert!(result[1].is_stopped());
    }

    #[test]
    fn test_language_lists() {
        let italian = StopFilter::for_language(StopWordsLanguage::Italian);
        assert!(italian.is_stop_word("della"));
        assert!(!italian.is_stop_word("magazzino"));

        let english = StopFilter::for_language(StopWordsLanguage::English);
        assert!(english.is_stop_word("the"));
        assert!(!english.is_empty());
    }

    #[test]
    fn test_filter_name() {
        assert_eq!(StopFilter::new().name(), "stop");
    }
}
