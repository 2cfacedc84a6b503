//! Key extraction: turning a raw source line into a typed index key.

use std::fmt::Debug;
use std::num::ParseIntError;

/// Why a line did not yield a key. Always local to the line: indexing
/// continues with the next one.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    #[error("line has no column {0}")]
    MissingColumn(usize),

    #[error("column {column} is not an integer: {source}")]
    NotAnInteger {
        column: usize,
        #[source]
        source: ParseIntError,
    },

    #[error("{0}")]
    Malformed(String),
}

/// Extracts the index key from a line of the source file.
pub trait KeyExtractor<K>: Send + Debug {
    fn extract(&self, line: &str) -> Result<K, ExtractionError>;

    /// Stable identifier of what is extracted (e.g. the column number). It is
    /// part of every segment file name.
    fn id(&self) -> &str;
}

/// Extracts an integer column from a delimited line.
#[derive(Debug, Clone)]
pub struct IntegerCsvExtractor {
    column: usize,
    delimiter: String,
    id: String,
}

impl IntegerCsvExtractor {
    pub fn new(column: usize, delimiter: impl Into<String>) -> Self {
        Self {
            column,
            delimiter: delimiter.into(),
            id: column.to_string(),
        }
    }

    fn field<'a>(&self, line: &'a str) -> Result<&'a str, ExtractionError> {
        let field = if self.delimiter.is_empty() {
            line.split_whitespace().nth(self.column)
        } else {
            line.split(self.delimiter.as_str()).nth(self.column)
        };
        field.ok_or(ExtractionError::MissingColumn(self.column))
    }
}

impl KeyExtractor<i64> for IntegerCsvExtractor {
    fn extract(&self, line: &str) -> Result<i64, ExtractionError> {
        self.field(line)?
            .trim()
            .parse()
            .map_err(|source| ExtractionError::NotAnInteger {
                column: self.column,
                source,
            })
    }

    fn id(&self) -> &str {
        &self.id
    }
}

/// Extracts a text column from a delimited line, trimmed of surrounding
/// whitespace.
#[derive(Debug, Clone)]
pub struct StringCsvExtractor {
    inner: IntegerCsvExtractor,
}

impl StringCsvExtractor {
    pub fn new(column: usize, delimiter: impl Into<String>) -> Self {
        Self {
            inner: IntegerCsvExtractor::new(column, delimiter),
        }
    }
}

impl KeyExtractor<String> for StringCsvExtractor {
    fn extract(&self, line: &str) -> Result<String, ExtractionError> {
        Ok(self.inner.field(line)?.trim().to_string())
    }

    fn id(&self) -> &str {
        &self.inner.id
    }
}
