//! Token types for text analysis.
//!
//! A [`Token`] is the unit that flows through the analysis pipeline: the
//! tokenizer produces them, token filters rewrite or stop them, and the text
//! featurizer counts what is left.
//!
//! # Examples
//!
//! ```
//! use quillon::analysis::token::Token;
//!
//! let token = Token::with_offsets("magazzino", 3, 12, 21);
//! assert_eq!(token.text, "magazzino");
//! assert_eq!(token.position, 3);
//! assert!(!token.is_stopped());
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A token represents a single unit of text after tokenization.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Token {
    /// The text content of the token
    pub text: String,

    /// The position of the token in the original token stream (0-based)
    pub position: usize,

    /// The byte offset where this token starts in the analyzed text
    pub start_offset: usize,

    /// The byte offset where this token ends in the analyzed text
    pub end_offset: usize,

    /// Whether this token has been marked as stopped (removed) by a filter
    pub stopped: bool,
}

impl Token {
    /// Create a new token with the given text and position.
    pub fn new<S: Into<String>>(text: S, position: usize) -> Self {
        let text = text.into();
        let end_offset = text.len();
        Token {
            text,
            position,
            start_offset: 0,
            end_offset,
            stopped: false,
        }
    }

    /// Create a new token with explicit byte offsets.
    pub fn with_offsets<S: Into<String>>(
        text: S,
        position: usize,
        start_offset: usize,
        end_offset: usize,
    ) -> Self {
        Token {
            text: text.into(),
            position,
            start_offset,
            end_offset,
            stopped: false,
        }
    }

    /// Length of the token text in bytes.
    pub fn len(&self) -> usize {
        self.text.len()
    }

    /// Check if the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Mark this token as stopped.
    pub fn stop(mut self) -> Self {
        self.stopped = true;
        self
    }

    /// Check if this token has been stopped.
    pub fn is_stopped(&self) -> bool {
        self.stopped
    }

    /// Return a copy of this token with different text.
    pub fn with_text<S: Into<String>>(&self, text: S) -> Self {
        let mut token = self.clone();
        token.text = text.into();
        token
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.text, self.position)
    }
}

/// A stream of tokens produced by tokenizers and transformed by filters.
pub type TokenStream = Box<dyn Iterator<Item = Token> + Send>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_creation() {
        let token = Token::new("fattura", 2);
        assert_eq!(token.text, "fattura");
        assert_eq!(token.position, 2);
        assert_eq!(token.start_offset, 0);
        assert_eq!(token.end_offset, 7);
        assert_eq!(token.len(), 7);
    }

    #[test]
    fn test_token_stop_and_rewrite() {
        let token = Token::with_offsets("Ciao", 0, 4, 8).stop();
        assert!(token.is_stopped());

        let rewritten = token.with_text("ciao");
        assert_eq!(rewritten.text, "ciao");
        assert_eq!(rewritten.start_offset, 4);
        assert!(rewritten.is_stopped());
        assert_eq!(rewritten.to_string(), "ciao@0");
    }
}
