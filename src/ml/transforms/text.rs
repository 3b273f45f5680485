//! Text featurization.
//!
//! Turns a text column into a sparse numeric vector: the text is normalized
//! and tokenized by a [`PipelineAnalyzer`], word n-grams and character
//! n-grams are counted against a vocabulary learned at fit time, counts are
//! weighted (`Tf`, `Idf` or `TfIdf`) and the combined vector is normalized.
//!
//! Vocabulary slots are assigned in order of first occurrence over the
//! training rows. All word n-gram slots come before all character n-gram
//! slots.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::analysis::analyzer::{Analyzer, PipelineAnalyzer};
use crate::analysis::char_filter::{DiacriticsCharFilter, PatternReplaceCharFilter};
use crate::analysis::token::Token;
use crate::analysis::token_filter::stop::StopWordsLanguage;
use crate::analysis::token_filter::{LowercaseFilter, StopFilter};
use crate::analysis::tokenizer::WhitespaceTokenizer;
use crate::data::view::{DataView, Value};
use crate::error::{QuillonError, Result};
use crate::ml::features::{SparseVector, VectorNorm};
use crate::ml::schema::{Column, Schema};
use crate::ml::transforms::Transformer;

/// Marks the start of the text for character n-grams.
const TEXT_START: char = '\u{2}';

/// Marks the end of the text for character n-grams.
const TEXT_END: char = '\u{3}';

/// Joins the tokens of a word n-gram.
const NGRAM_SEPARATOR: &str = "|";

/// How counts are weighted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    /// Raw term counts.
    #[default]
    Tf,
    /// Inverse document frequency of each present term.
    Idf,
    /// Counts times inverse document frequency.
    TfIdf,
}

/// N-gram extraction settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NgramOptions {
    /// Longest n-gram to extract.
    pub length: usize,
    /// Also extract every shorter n-gram down to 1.
    pub all_lengths: bool,
}

impl NgramOptions {
    pub fn new(length: usize, all_lengths: bool) -> Self {
        Self {
            length,
            all_lengths,
        }
    }

    fn lengths(&self) -> std::ops::RangeInclusive<usize> {
        if self.all_lengths {
            1..=self.length
        } else {
            self.length..=self.length
        }
    }
}

/// Options of the text featurizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFeaturizerOptions {
    /// Lowercase every token.
    pub lowercase: bool,
    pub keep_diacritics: bool,
    pub keep_punctuations: bool,
    pub keep_numbers: bool,
    /// Built-in stop word list removed from word n-grams.
    pub stop_words: Option<StopWordsLanguage>,
    /// Word n-grams; `None` disables them.
    pub word_ngrams: Option<NgramOptions>,
    /// Character n-grams; `None` disables them.
    pub char_ngrams: Option<NgramOptions>,
    pub weighting: Weighting,
    pub norm: VectorNorm,
}

impl Default for TextFeaturizerOptions {
    fn default() -> Self {
        Self {
            lowercase: true,
            keep_diacritics: false,
            keep_punctuations: true,
            keep_numbers: true,
            stop_words: None,
            word_ngrams: Some(NgramOptions::new(1, true)),
            char_ngrams: Some(NgramOptions::new(3, false)),
            weighting: Weighting::Tf,
            norm: VectorNorm::L2,
        }
    }
}

impl TextFeaturizerOptions {
    pub fn validate(&self) -> Result<()> {
        if self.word_ngrams.is_none() && self.char_ngrams.is_none() {
            return Err(QuillonError::invalid_config(
                "text featurizer needs word n-grams, char n-grams or both",
            ));
        }
        for ngrams in self.word_ngrams.iter().chain(self.char_ngrams.iter()) {
            if ngrams.length == 0 {
                return Err(QuillonError::invalid_config("n-gram length must be at least 1"));
            }
        }
        Ok(())
    }

    /// Build the analyzer implementing these options.
    ///
    /// Stop words are marked rather than removed so that character n-grams
    /// still see the full text.
    pub fn build_analyzer(&self) -> Result<PipelineAnalyzer> {
        let mut analyzer = PipelineAnalyzer::new(Arc::new(WhitespaceTokenizer::new()));

        if !self.keep_diacritics {
            analyzer = analyzer.add_char_filter(Arc::new(DiacriticsCharFilter::new()));
        }
        if !self.keep_punctuations {
            analyzer = analyzer.add_char_filter(Arc::new(PatternReplaceCharFilter::punctuation()?));
        }
        if !self.keep_numbers {
            analyzer = analyzer.add_char_filter(Arc::new(PatternReplaceCharFilter::numbers()?));
        }
        if self.lowercase {
            analyzer = analyzer.add_filter(Arc::new(LowercaseFilter::new()));
        }
        if let Some(language) = self.stop_words {
            analyzer = analyzer
                .add_filter(Arc::new(StopFilter::for_language(language).remove_stopped(false)));
        }

        Ok(analyzer.with_name("featurize_text"))
    }
}

/// Term counts of one text, before vocabulary lookup.
#[derive(Debug, Default)]
struct TermCounts {
    words: Vec<(String, f32)>,
    chars: Vec<(String, f32)>,
}

/// A fitted text featurizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "TextFeaturizerState", into = "TextFeaturizerState")]
pub struct TextFeaturizer {
    input: String,
    output: String,
    options: TextFeaturizerOptions,
    /// Word n-gram -> slot.
    word_vocabulary: BTreeMap<String, u32>,
    /// Char n-gram -> slot, already offset past the word slots.
    char_vocabulary: BTreeMap<String, u32>,
    /// Inverse document frequency per slot.
    idf: Vec<f32>,
    document_count: usize,
    analyzer: PipelineAnalyzer,
}

/// Persisted form of [`TextFeaturizer`]; the analyzer is rebuilt on load.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct TextFeaturizerState {
    input: String,
    output: String,
    options: TextFeaturizerOptions,
    /// Terms in slot order.
    words: Vec<String>,
    chars: Vec<String>,
    idf: Vec<f32>,
    document_count: usize,
}

impl From<TextFeaturizer> for TextFeaturizerState {
    fn from(featurizer: TextFeaturizer) -> Self {
        TextFeaturizerState {
            words: slot_order(&featurizer.word_vocabulary),
            chars: slot_order(&featurizer.char_vocabulary),
            input: featurizer.input,
            output: featurizer.output,
            options: featurizer.options,
            idf: featurizer.idf,
            document_count: featurizer.document_count,
        }
    }
}

impl TryFrom<TextFeaturizerState> for TextFeaturizer {
    type Error = QuillonError;

    fn try_from(state: TextFeaturizerState) -> Result<Self> {
        state
            .options
            .validate()
            .map_err(|e| QuillonError::model_format(format!("featurizer options: {e}")))?;

        let word_count = state.words.len();
        if state.idf.len() != word_count + state.chars.len() {
            return Err(QuillonError::model_format(format!(
                "featurizer has {} idf weights for {} slots",
                state.idf.len(),
                word_count + state.chars.len()
            )));
        }

        let analyzer = state.options.build_analyzer()?;
        let word_vocabulary = state
            .words
            .into_iter()
            .enumerate()
            .map(|(slot, term)| (term, slot as u32))
            .collect();
        let char_vocabulary = state
            .chars
            .into_iter()
            .enumerate()
            .map(|(slot, term)| (term, (word_count + slot) as u32))
            .collect();

        Ok(TextFeaturizer {
            input: state.input,
            output: state.output,
            options: state.options,
            word_vocabulary,
            char_vocabulary,
            idf: state.idf,
            document_count: state.document_count,
            analyzer,
        })
    }
}

fn slot_order(vocabulary: &BTreeMap<String, u32>) -> Vec<String> {
    let mut terms: Vec<(&String, &u32)> = vocabulary.iter().collect();
    terms.sort_by_key(|(_, slot)| **slot);
    terms.into_iter().map(|(term, _)| term.clone()).collect()
}

impl TextFeaturizer {
    /// Learn the vocabulary and document frequencies of `input` in `data`.
    pub fn fit(
        data: &DataView,
        input: &str,
        output: &str,
        options: TextFeaturizerOptions,
    ) -> Result<Self> {
        options.validate()?;
        let analyzer = options.build_analyzer()?;
        let texts = data.texts(input)?;

        let mut words: Vec<String> = Vec::new();
        let mut chars: Vec<String> = Vec::new();
        let mut word_index: BTreeMap<String, u32> = BTreeMap::new();
        let mut char_index: BTreeMap<String, u32> = BTreeMap::new();
        let mut word_df: Vec<usize> = Vec::new();
        let mut char_df: Vec<usize> = Vec::new();

        for text in &texts {
            let counts = extract_terms(&analyzer, &options, text.unwrap_or(""))?;

            for (term, _) in counts.words {
                let slot = *word_index.entry(term.clone()).or_insert_with(|| {
                    words.push(term);
                    word_df.push(0);
                    (words.len() - 1) as u32
                });
                word_df[slot as usize] += 1;
            }
            for (term, _) in counts.chars {
                let slot = *char_index.entry(term.clone()).or_insert_with(|| {
                    chars.push(term);
                    char_df.push(0);
                    (chars.len() - 1) as u32
                });
                char_df[slot as usize] += 1;
            }
        }

        let document_count = texts.len();
        let idf = word_df
            .iter()
            .chain(char_df.iter())
            .map(|&df| inverse_document_frequency(document_count, df))
            .collect();

        debug!(
            "Fitted text featurizer on '{input}': {} rows, {} word slots, {} char slots",
            document_count,
            words.len(),
            chars.len()
        );

        let word_count = words.len();
        Ok(TextFeaturizer {
            input: input.to_string(),
            output: output.to_string(),
            options,
            word_vocabulary: word_index,
            char_vocabulary: char_index
                .into_iter()
                .map(|(term, slot)| (term, slot + word_count as u32))
                .collect(),
            idf,
            document_count,
            analyzer,
        })
    }

    /// Size of the output vector.
    pub fn vocabulary_size(&self) -> usize {
        self.word_vocabulary.len() + self.char_vocabulary.len()
    }

    pub fn word_vocabulary_size(&self) -> usize {
        self.word_vocabulary.len()
    }

    pub fn char_vocabulary_size(&self) -> usize {
        self.char_vocabulary.len()
    }

    pub fn options(&self) -> &TextFeaturizerOptions {
        &self.options
    }

    /// Slot of a word n-gram, if it was seen during fit.
    pub fn word_slot(&self, term: &str) -> Option<u32> {
        self.word_vocabulary.get(term).copied()
    }

    /// Slot of a character n-gram, if it was seen during fit.
    pub fn char_slot(&self, term: &str) -> Option<u32> {
        self.char_vocabulary.get(term).copied()
    }

    /// Featurize a single text.
    pub fn featurize(&self, text: &str) -> Result<SparseVector> {
        let counts = extract_terms(&self.analyzer, &self.options, text)?;

        let mut values: BTreeMap<u32, f32> = BTreeMap::new();
        let words = counts
            .words
            .into_iter()
            .filter_map(|(term, n)| self.word_slot(&term).map(|slot| (slot, n)));
        let chars = counts
            .chars
            .into_iter()
            .filter_map(|(term, n)| self.char_slot(&term).map(|slot| (slot, n)));

        for (slot, count) in words.chain(chars) {
            let idf = self.idf[slot as usize];
            let weight = match self.options.weighting {
                Weighting::Tf => count,
                Weighting::Idf => idf,
                Weighting::TfIdf => count * idf,
            };
            values.insert(slot, weight);
        }

        let mut vector = SparseVector::from_sorted(self.vocabulary_size(), values);
        vector.normalize(self.options.norm);
        Ok(vector)
    }
}

impl Transformer for TextFeaturizer {
    fn name(&self) -> &'static str {
        "featurize_text"
    }

    fn output_schema(&self, input: &Schema) -> Result<Schema> {
        input.require(&self.input)?.expect_kind("text")?;
        Ok(input
            .clone()
            .with_column(Column::vector(&self.output, self.vocabulary_size())))
    }

    fn transform(&self, data: DataView) -> Result<DataView> {
        let schema = self.output_schema(data.schema())?;
        let (_, mut rows) = data.into_parts();

        for row in &mut rows {
            let text = match row.get(&self.input) {
                Some(Value::Text(text)) => text.as_str(),
                Some(_) => {
                    return Err(QuillonError::schema(format!(
                        "column '{}' does not hold text values",
                        self.input
                    )));
                }
                None => "",
            };
            let vector = self.featurize(text)?;
            row.insert(self.output.clone(), Value::Vector(vector));
        }

        Ok(DataView::from_parts(schema, rows))
    }
}

/// `ln(N / df)`; zero for terms seen in every document.
fn inverse_document_frequency(document_count: usize, document_frequency: usize) -> f32 {
    if document_frequency == 0 {
        return 0.0;
    }
    (document_count as f64 / document_frequency as f64).ln() as f32
}

/// Analyze `text` and count its word and character n-grams, in order of
/// first occurrence.
fn extract_terms(
    analyzer: &PipelineAnalyzer,
    options: &TextFeaturizerOptions,
    text: &str,
) -> Result<TermCounts> {
    let tokens: Vec<Token> = analyzer.analyze(text)?.collect();
    let mut counts = TermCounts::default();

    if let Some(ngrams) = options.word_ngrams {
        let words: Vec<&str> = tokens
            .iter()
            .filter(|t| !t.is_stopped())
            .map(|t| t.text.as_str())
            .collect();
        let mut grams = Vec::new();
        for n in ngrams.lengths() {
            grams.extend(words.windows(n).map(|w| w.join(NGRAM_SEPARATOR)));
        }
        counts.words = count_in_order(grams);
    }

    if let Some(ngrams) = options.char_ngrams {
        let joined = tokens
            .iter()
            .map(|t| t.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");
        let chars: Vec<char> = std::iter::once(TEXT_START)
            .chain(joined.chars())
            .chain(std::iter::once(TEXT_END))
            .collect();
        let mut grams = Vec::new();
        for n in ngrams.lengths() {
            grams.extend(chars.windows(n).map(|w| w.iter().collect::<String>()));
        }
        counts.chars = count_in_order(grams);
    }

    Ok(counts)
}

fn count_in_order(grams: Vec<String>) -> Vec<(String, f32)> {
    let mut seen: BTreeSet<String> = BTreeSet::new();
    let mut totals: BTreeMap<String, f32> = BTreeMap::new();
    let mut order = Vec::new();

    for gram in grams {
        *totals.entry(gram.clone()).or_insert(0.0) += 1.0;
        if seen.insert(gram.clone()) {
            order.push(gram);
        }
    }

    order
        .into_iter()
        .map(|gram| {
            let count = totals[&gram];
            (gram, count)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::{QUESTION_COLUMN, QuestionRecord};

    fn view(questions: &[&str]) -> DataView {
        let records: Vec<_> = questions
            .iter()
            .map(|q| QuestionRecord::new("x", *q))
            .collect();
        DataView::from_records(&records)
    }

    fn words_only() -> TextFeaturizerOptions {
        TextFeaturizerOptions {
            char_ngrams: None,
            norm: VectorNorm::None,
            ..Default::default()
        }
    }

    #[test]
    fn test_vocabulary_in_first_occurrence_order() {
        let data = view(&["Fattura scartata", "fattura elettronica"]);
        let featurizer =
            TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", words_only()).unwrap();

        assert_eq!(featurizer.vocabulary_size(), 3);
        assert_eq!(featurizer.word_slot("fattura"), Some(0));
        assert_eq!(featurizer.word_slot("scartata"), Some(1));
        assert_eq!(featurizer.word_slot("elettronica"), Some(2));
    }

    #[test]
    fn test_words_precede_chars() {
        let data = view(&["ab"]);
        let featurizer = TextFeaturizer::fit(
            &data,
            QUESTION_COLUMN,
            "Encoded",
            TextFeaturizerOptions::default(),
        )
        .unwrap();

        assert_eq!(featurizer.word_vocabulary_size(), 1);
        // "\u{2}ab" and "ab\u{3}"
        assert_eq!(featurizer.char_vocabulary_size(), 2);
        assert_eq!(featurizer.char_slot("\u{2}ab"), Some(1));
        assert_eq!(featurizer.char_slot("ab\u{3}"), Some(2));
    }

    #[test]
    fn test_tf_counts_and_unseen_terms() {
        let data = view(&["magazzino magazzino chiusura"]);
        let featurizer =
            TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", words_only()).unwrap();

        let vector = featurizer.featurize("Magazzino e magazzino").unwrap();
        assert_eq!(vector.dim(), 2);
        assert_eq!(vector.entries(), &[(0, 2.0)]);
    }

    #[test]
    fn test_diacritics_and_stop_words() {
        let data = view(&["La contabilità di fine anno"]);
        let options = TextFeaturizerOptions {
            stop_words: Some(StopWordsLanguage::Italian),
            ..words_only()
        };
        let featurizer = TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", options).unwrap();

        assert_eq!(featurizer.word_slot("contabilita"), Some(0));
        assert_eq!(featurizer.word_slot("la"), None);
        assert_eq!(featurizer.word_slot("di"), None);
        assert_eq!(featurizer.vocabulary_size(), 3);
    }

    #[test]
    fn test_bigrams_with_all_lengths() {
        let data = view(&["fine anno"]);
        let options = TextFeaturizerOptions {
            word_ngrams: Some(NgramOptions::new(2, true)),
            ..words_only()
        };
        let featurizer = TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", options).unwrap();

        assert_eq!(featurizer.word_slot("fine"), Some(0));
        assert_eq!(featurizer.word_slot("anno"), Some(1));
        assert_eq!(featurizer.word_slot("fine|anno"), Some(2));
    }

    #[test]
    fn test_idf_weighting() {
        let data = view(&["iva fattura", "iva magazzino"]);
        let options = TextFeaturizerOptions {
            weighting: Weighting::TfIdf,
            ..words_only()
        };
        let featurizer = TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", options).unwrap();

        let vector = featurizer.featurize("iva fattura").unwrap();
        // "iva" is in every document, so its weight vanishes.
        assert_eq!(vector.get(0), 0.0);
        assert!((vector.get(1) - 2.0_f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn test_l2_normalized_output() {
        let data = view(&["Sto avendo problemi con il magazzino"]);
        let featurizer = TextFeaturizer::fit(
            &data,
            QUESTION_COLUMN,
            "Encoded",
            TextFeaturizerOptions::default(),
        )
        .unwrap();

        let vector = featurizer.featurize("problemi con il magazzino").unwrap();
        assert!((vector.norm(VectorNorm::L2) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_transform_adds_vector_column() {
        let data = view(&["fattura", "magazzino"]);
        let featurizer =
            TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", words_only()).unwrap();

        let out = featurizer.transform(data).unwrap();
        assert_eq!(
            out.schema().require("Encoded").unwrap().kind,
            crate::ml::schema::ColumnKind::Vector { size: 2 }
        );
        let vectors = out.vectors("Encoded").unwrap();
        assert_eq!(vectors[1].entries(), &[(1, 1.0)]);
    }

    #[test]
    fn test_state_round_trip_rebuilds_analyzer() {
        let data = view(&["Contabilità analitica", "fattura"]);
        let featurizer = TextFeaturizer::fit(
            &data,
            QUESTION_COLUMN,
            "Encoded",
            TextFeaturizerOptions::default(),
        )
        .unwrap();

        let json = serde_json::to_string(&featurizer).unwrap();
        let restored: TextFeaturizer = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.vocabulary_size(), featurizer.vocabulary_size());
        assert_eq!(
            restored.featurize("contabilita").unwrap(),
            featurizer.featurize("contabilita").unwrap()
        );
    }

    #[test]
    fn test_invalid_options() {
        let options = TextFeaturizerOptions {
            word_ngrams: None,
            char_ngrams: None,
            ..Default::default()
        };
        assert!(options.validate().is_err());

        let options = TextFeaturizerOptions {
            word_ngrams: Some(NgramOptions::new(0, false)),
            ..Default::default()
        };
        assert!(options.validate().is_err());
    }

    #[test]
    fn test_restore_rejects_zero_length_ngrams() {
        let data = view(&["chiusura magazzino"]);
        let featurizer =
            TextFeaturizer::fit(&data, QUESTION_COLUMN, "Encoded", words_only()).unwrap();

        let mut state = TextFeaturizerState::from(featurizer);
        state.options.word_ngrams = Some(NgramOptions::new(0, false));

        match TextFeaturizer::try_from(state) {
            Err(QuillonError::ModelFormat(msg)) => {
                assert!(msg.contains("n-gram length must be at least 1"))
            }
            other => panic!("expected a model format error, got {other:?}"),
        }
    }
}
