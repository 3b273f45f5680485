//! Delimited-text loader for question records.
//!
//! Rows are deserialized into [`QuestionRecord`] by position: the first field
//! is the category, the second the question. The header row, when present, is
//! skipped rather than matched by name. Fields are always trimmed.
//!
//! ```csv
//! Category;Question
//! Magazzino;Come si calcola la valorizzazione di magazzino?
//! ```

use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::{ReaderBuilder, Trim};
use log::{debug, warn};

use crate::data::record::QuestionRecord;
use crate::error::{QuillonError, Result};

/// Default field separator.
pub const DEFAULT_SEPARATOR: char = ';';

/// A loader for `category<sep>question` files.
#[derive(Debug, Clone)]
pub struct CsvLoader {
    /// CSV delimiter character (default: ';')
    delimiter: u8,
    /// Whether the first row is a header
    has_header: bool,
}

impl Default for CsvLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl CsvLoader {
    /// Create a loader for semicolon-separated files with a header row.
    pub fn new() -> Self {
        CsvLoader {
            delimiter: DEFAULT_SEPARATOR as u8,
            has_header: true,
        }
    }

    /// Set a custom delimiter character. Only ASCII delimiters are supported.
    pub fn with_delimiter(mut self, delimiter: char) -> Result<Self> {
        if !delimiter.is_ascii() {
            return Err(QuillonError::invalid_argument(format!(
                "separator must be an ASCII character, got '{delimiter}'"
            )));
        }
        self.delimiter = delimiter as u8;
        Ok(self)
    }

    /// Set whether the first row is a header.
    pub fn with_header(mut self, has_header: bool) -> Self {
        self.has_header = has_header;
        self
    }

    /// Load all records from a file.
    pub fn load_path<P: AsRef<Path>>(&self, path: P) -> Result<Vec<QuestionRecord>> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            QuillonError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {e}", path.display()),
            ))
        })?;
        let records = self.load_reader(file)?;
        debug!("Loaded {} records from {}", records.len(), path.display());
        Ok(records)
    }

    /// Load all records from any reader.
    pub fn load_reader<R: Read>(&self, reader: R) -> Result<Vec<QuestionRecord>> {
        let mut csv_reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(self.has_header)
            .trim(Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for result in csv_reader.records() {
            let mut row = result?;
            let line = row.position().map(|p| p.line()).unwrap_or_default();

            if row.len() < 2 {
                return Err(QuillonError::invalid_argument(format!(
                    "line {line}: expected 2 fields, found {}",
                    row.len()
                )));
            }
            if row.len() > 2 {
                warn!("line {line}: {} extra fields ignored", row.len() - 2);
                row.truncate(2);
            }

            let record: QuestionRecord = row.deserialize(None)?;
            records.push(record);
        }

        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_semicolon_with_header() {
        let data = "Category;Question\n\
                    Magazzino;Come chiudo il magazzino?\n\
                    Fatturazione; Fattura elettronica scartata, perché? \n";

        let records = CsvLoader::new().load_reader(data.as_bytes()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].category, "Magazzino");
        assert_eq!(records[1].question, "Fattura elettronica scartata, perché?");
    }

    #[test]
    fn test_custom_delimiter_without_header() {
        let data = "Contabilita,\"Registrazione prima nota; errore\"\n";

        let records = CsvLoader::new()
            .with_delimiter(',')
            .unwrap()
            .with_header(false)
            .load_reader(data.as_bytes())
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].question, "Registrazione prima nota; errore");
    }

    #[test]
    fn test_short_row_is_an_error() {
        let data = "Category;Question\nSoloCategoria\n";
        let err = CsvLoader::new().load_reader(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("expected 2 fields"));
    }

    #[test]
    fn test_extra_fields_are_ignored() {
        let data = "Category;Question;Note\n\
                    Magazzino;Inventario di fine anno;urgente;bis\n";

        let records = CsvLoader::new().load_reader(data.as_bytes()).unwrap();

        assert_eq!(
            records,
            vec![QuestionRecord::new("Magazzino", "Inventario di fine anno")]
        );
    }

    #[test]
    fn test_non_ascii_delimiter_rejected() {
        assert!(CsvLoader::new().with_delimiter('§').is_err());
    }
}
