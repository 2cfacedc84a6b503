//! Index flavors selectable at runtime.

use super::{Flavor, Index, IndexKey, NoIndex, Primary, Secondary};
use crate::config::IndexConfig;
use crate::error::{Error, Result};
use crate::extractor::KeyExtractor;
use crate::range::RangeSet;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    /// key -> full line
    Primary,
    /// key -> byte offset of the line
    Secondary,
    /// no index; lines are only matched against the default ranges
    Disabled,
}

impl FromStr for IndexKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "primary" => Ok(IndexKind::Primary),
            "secondary" => Ok(IndexKind::Secondary),
            "none" | "disabled" => Ok(IndexKind::Disabled),
            other => Err(Error::Config(format!("unknown index kind: {:?}", other))),
        }
    }
}

impl fmt::Display for IndexKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            IndexKind::Primary => "primary",
            IndexKind::Secondary => "secondary",
            IndexKind::Disabled => "none",
        };
        f.write_str(name)
    }
}

/// A value produced by iterating an index of any flavor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Line(String),
    Offset(u64),
}

/// Flavor-independent view of an index, for callers that pick the flavor
/// from configuration.
pub trait LineIndex: Send {
    fn kind(&self) -> IndexKind;

    fn open(&mut self) -> Result<()>;

    fn close(&mut self) -> Result<()>;

    fn sync(&mut self) -> Result<()>;

    fn is_open(&self) -> bool;

    fn add_line(&mut self, line: &str, start: u64, end: u64) -> Result<bool>;

    /// Records in the default ranges, or all records without default ranges.
    fn records(&self) -> Result<Box<dyn Iterator<Item = Record> + Send>>;

    fn max_pos(&self) -> Result<u64>;

    fn partial_end_for_pos(&self, pos: u64) -> Result<i64>;
}

impl<K: IndexKey, F: Flavor> LineIndex for Index<K, F> {
    fn kind(&self) -> IndexKind {
        F::KIND
    }

    fn open(&mut self) -> Result<()> {
        Index::open(self)
    }

    fn close(&mut self) -> Result<()> {
        Index::close(self)
    }

    fn sync(&mut self) -> Result<()> {
        Index::sync(self)
    }

    fn is_open(&self) -> bool {
        Index::is_open(self)
    }

    fn add_line(&mut self, line: &str, start: u64, end: u64) -> Result<bool> {
        Index::add_line(self, line, start, end)
    }

    fn records(&self) -> Result<Box<dyn Iterator<Item = Record> + Send>> {
        Ok(Box::new(self.iter()?.map(F::into_record)))
    }

    fn max_pos(&self) -> Result<u64> {
        Index::max_pos(self)
    }

    fn partial_end_for_pos(&self, pos: u64) -> Result<i64> {
        Index::partial_end_for_pos(self, pos)
    }
}

/// Builds the index flavor named by `kind`. The returned index is closed.
pub fn build_index<K: IndexKey>(
    kind: IndexKind,
    config: IndexConfig,
    extractor: Box<dyn KeyExtractor<K>>,
    default_ranges: RangeSet<K>,
) -> Result<Box<dyn LineIndex>> {
    let index: Box<dyn LineIndex> = match kind {
        IndexKind::Primary => Box::new(Index::<K, Primary>::new(config, extractor, default_ranges)?),
        IndexKind::Secondary => {
            Box::new(Index::<K, Secondary>::new(config, extractor, default_ranges)?)
        }
        IndexKind::Disabled => Box::new(NoIndex::new(extractor, default_ranges)),
    };
    tracing::debug!(%kind, "Index built");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::IntegerCsvExtractor;
    use crate::range::KeyRange;
    use tempfile::TempDir;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("primary".parse::<IndexKind>().unwrap(), IndexKind::Primary);
        assert_eq!(" Secondary ".parse::<IndexKind>().unwrap(), IndexKind::Secondary);
        assert_eq!("none".parse::<IndexKind>().unwrap(), IndexKind::Disabled);
        assert!(matches!("btree".parse::<IndexKind>(), Err(Error::Config(_))));

        for kind in [IndexKind::Primary, IndexKind::Secondary, IndexKind::Disabled] {
            assert_eq!(kind.to_string().parse::<IndexKind>().unwrap(), kind);
        }
    }

    fn build(kind: IndexKind, root: &TempDir) -> Box<dyn LineIndex> {
        let config = IndexConfig::new(root.path(), "/data/people.csv").cache_size(2);
        let ranges = RangeSet::merge(vec![KeyRange::new(0, 1)]);
        build_index(kind, config, Box::new(IntegerCsvExtractor::new(0, ",")), ranges)
            .expect("Failed to build index")
    }

    #[test]
    fn test_builds_each_kind() {
        let root = TempDir::new().expect("Failed to create temp dir");
        for kind in [IndexKind::Primary, IndexKind::Secondary, IndexKind::Disabled] {
            let index = build(kind, &root);
            assert_eq!(index.kind(), kind);
            assert_eq!(index.is_open(), kind == IndexKind::Disabled);
        }
    }

    #[test]
    fn test_records_by_flavor() -> Result<()> {
        let root = TempDir::new().expect("Failed to create temp dir");

        let mut primary = build(IndexKind::Primary, &root);
        primary.open()?;
        assert!(primary.add_line("1,Robin,25", 0, 10)?);
        assert!(!primary.add_line("2,Fritz,55", 11, 21)?);
        primary.close()?;
        primary.open()?;
        let records: Vec<Record> = primary.records()?.collect();
        assert_eq!(records, vec![Record::Line("1,Robin,25".to_string())]);
        primary.close()?;

        let other = TempDir::new().expect("Failed to create temp dir");
        let mut secondary = build(IndexKind::Secondary, &other);
        secondary.open()?;
        secondary.add_line("0,Anna,31", 0, 9)?;
        secondary.add_line("1,Robin,25", 10, 20)?;
        secondary.sync()?;
        let records: Vec<Record> = secondary.records()?.collect();
        assert_eq!(records, vec![Record::Offset(0), Record::Offset(10)]);
        assert_eq!(secondary.max_pos()?, 20);
        assert_eq!(secondary.partial_end_for_pos(15)?, 20);
        Ok(())
    }

    #[test]
    fn test_disabled_kind() -> Result<()> {
        let root = TempDir::new().expect("Failed to create temp dir");
        let mut index = build(IndexKind::Disabled, &root);

        index.open()?;
        assert!(index.add_line("1,Robin,25", 0, 10)?);
        assert!(!index.add_line("5,Fritz,55", 11, 21)?);
        index.close()?;

        assert!(index.records()?.next().is_none());
        assert_eq!(index.max_pos()?, 0);
        assert_eq!(index.partial_end_for_pos(0)?, -1);
        assert!(!root.path().join("data").exists());
        Ok(())
    }
}
