//! Regex-based char filter.

use regex::Regex;

use super::CharFilter;
use crate::error::{QuillonError, Result};

/// Pattern matching Unicode punctuation.
pub const PUNCTUATION_PATTERN: &str = r"\p{P}";

/// Pattern matching Unicode numeric characters.
pub const NUMBER_PATTERN: &str = r"\p{N}";

/// A char filter that replaces characters matching a regex pattern.
#[derive(Clone, Debug)]
pub struct PatternReplaceCharFilter {
    pattern: Regex,
    replacement: String,
}

impl PatternReplaceCharFilter {
    /// Create a new pattern replace char filter.
    pub fn new(pattern: &str, replacement: &str) -> Result<Self> {
        let pattern = Regex::new(pattern)
            .map_err(|e| QuillonError::analysis(format!("Invalid regex pattern: {e}")))?;

        Ok(Self {
            pattern,
            replacement: replacement.to_string(),
        })
    }

    /// A filter that deletes punctuation.
    pub fn punctuation() -> Result<Self> {
        Self::new(PUNCTUATION_PATTERN, "")
    }

    /// A filter that deletes digits and other numeric characters.
    pub fn numbers() -> Result<Self> {
        Self::new(NUMBER_PATTERN, "")
    }

    /// Get the regex pattern used by this filter.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl CharFilter for PatternReplaceCharFilter {
    fn filter(&self, input: &str) -> String {
        self.pattern
            .replace_all(input, self.replacement.as_str())
            .into_owned()
    }

    fn name(&self) -> &'static str {
        "pattern_replace"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_replace() {
        let filter = PatternReplaceCharFilter::new(r"\s+", " ").unwrap();
        assert_eq!(filter.filter("a   b\t\tc"), "a b c");
    }

    #[test]
    fn test_punctuation_removal() {
        let filter = PatternReplaceCharFilter::punctuation().unwrap();
        assert_eq!(filter.filter("aiuto! come si fa?"), "aiuto come si fa");
    }

    #[test]
    fn test_number_removal() {
        let filter = PatternReplaceCharFilter::numbers().unwrap();
        assert_eq!(filter.filter("fattura 2023 n. 15"), "fattura  n. ");
    }

    #[test]
    fn test_invalid_pattern() {
        assert!(PatternReplaceCharFilter::new("(", "").is_err());
    }
}
