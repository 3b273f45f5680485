//! Diacritics removal via Unicode decomposition.

use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use super::CharFilter;

/// A char filter that removes diacritical marks.
///
/// The input is decomposed (NFD), combining marks are dropped and the result
/// is recomposed (NFC), so `"è"` becomes `"e"` while unaccented text passes
/// through unchanged.
#[derive(Clone, Debug, Default)]
pub struct DiacriticsCharFilter;

impl DiacriticsCharFilter {
    /// Create a new diacritics filter.
    pub fn new() -> Self {
        DiacriticsCharFilter
    }
}

impl CharFilter for DiacriticsCharFilter {
    fn filter(&self, input: &str) -> String {
        if input.is_ascii() {
            return input.to_string();
        }

        input
            .nfd()
            .filter(|c| !is_combining_mark(*c))
            .nfc()
            .collect()
    }

    fn name(&self) -> &'static str {
        "diacritics"
    }
}
