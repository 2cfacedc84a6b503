use super::{IndexKey, IndexKind, LineIndex, Record};
use crate::error::Result;
use crate::extractor::KeyExtractor;
use crate::range::RangeSet;

/// Stand-in used when indexing is turned off. Persists nothing and is always
/// open; lines are still matched against the default ranges so callers can
/// filter without an index.
#[derive(Debug)]
pub struct NoIndex<K> {
    extractor: Box<dyn KeyExtractor<K>>,
    default_ranges: RangeSet<K>,
}

impl<K: IndexKey> NoIndex<K> {
    pub fn new(extractor: Box<dyn KeyExtractor<K>>, default_ranges: RangeSet<K>) -> Self {
        Self {
            extractor,
            default_ranges,
        }
    }
}

impl<K: IndexKey> LineIndex for NoIndex<K> {
    fn kind(&self) -> IndexKind {
        IndexKind::Disabled
    }

    fn open(&mut self) -> Result<()> {
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        Ok(())
    }

    fn sync(&mut self) -> Result<()> {
        Ok(())
    }

    fn is_open(&self) -> bool {
        true
    }

    fn add_line(&mut self, line: &str, _start: u64, _end: u64) -> Result<bool> {
        if line.is_empty() {
            return Ok(false);
        }
        Ok(match self.extractor.extract(line) {
            Ok(key) => self.default_ranges.is_empty() || self.default_ranges.contains(&key),
            Err(_) => true,
        })
    }

    fn records(&self) -> Result<Box<dyn Iterator<Item = Record> + Send>> {
        Ok(Box::new(std::iter::empty()))
    }

    fn max_pos(&self) -> Result<u64> {
        Ok(0)
    }

    fn partial_end_for_pos(&self, _pos: u64) -> Result<i64> {
        Ok(-1)
    }
}
