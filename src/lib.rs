//! Segmented B+Tree index over append-only line files.
//!
//! Lines are fed to an [`Index`] in file order. Keys extracted from each line
//! are buffered in memory and flushed as immutable segment files, each
//! covering a contiguous byte range of the source. A catalog records which
//! ranges are covered so a restarted writer resumes where it stopped and
//! readers can range-query everything indexed so far.

pub mod buffer;
pub mod catalog;
pub mod config;
mod durable;
pub mod encoding;
pub mod error;
pub mod extractor;
pub mod index;
pub mod iterator;
pub mod lock;
pub mod range;
pub mod segment;
pub mod source;
pub mod tree;

pub use config::{IndexConfig, RECOMMENDED_MIN_CACHE_SIZE};
pub use encoding::{Key, Value};
pub use error::{Error, Result};
pub use extractor::{ExtractionError, IntegerCsvExtractor, KeyExtractor, StringCsvExtractor};
pub use index::{
    build_index, Flavor, Index, IndexBuilder, IndexKey, IndexKind, LineIndex, NoIndex, Primary,
    Record, Secondary,
};
pub use iterator::RangeIterator;
pub use range::{KeyRange, RangeSet};
pub use source::SourceReader;
pub use tree::Tree;
