//! Immutable, persisted trees covering a byte range of the source file.

pub mod format;

use crate::durable;
use crate::encoding::{Key, Value};
use crate::error::Result;
use crate::tree::{Iter, RangeIter, Tree};
use crate::range::RangeSet;
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// A read-only tree loaded from (or just written to) a segment file, with
/// the source byte range its entries were extracted from.
#[derive(Debug)]
pub struct Segment<K, V> {
    name: String,
    start: u64,
    end: u64,
    tree: Tree<K, V>,
}

impl<K, V> Segment<K, V>
where
    K: Key + Ord + Clone,
    V: Value,
{
    /// Bulk-loads a sorted batch into a new tree and writes it durably under
    /// a fresh `<extractor_id>_<timestamp>` name in `dir`.
    pub fn create(
        dir: &Path,
        extractor_id: &str,
        entries: Vec<(K, V)>,
        (start, end): (u64, u64),
        leaf_capacity: usize,
        inner_capacity: usize,
    ) -> Result<Self> {
        let tree = Tree::bulk_load(entries, leaf_capacity, inner_capacity)?;
        let bytes = format::encode(&tree)?;

        let name = unused_name(dir, extractor_id);
        durable::write_atomic(&dir.join(&name), &bytes)?;

        tracing::debug!(segment = %name, entries = tree.len(), bytes = bytes.len(), "Segment written");
        Ok(Self {
            name,
            start,
            end,
            tree,
        })
    }

    /// Reads and verifies a cataloged segment.
    pub fn open(dir: &Path, name: &str, start: u64, end: u64) -> Result<Self> {
        let bytes = fs::read(dir.join(name))?;
        let tree = format::decode(&bytes)?;
        Ok(Self {
            name: name.to_string(),
            start,
            end,
            tree,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn end(&self) -> u64 {
        self.end
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.tree.get(key)
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        self.tree.iter()
    }

    pub fn range<'a>(&'a self, ranges: &'a RangeSet<K>) -> RangeIter<'a, K, V> {
        self.tree.range(ranges)
    }
}

/// Deletes a segment's backing file. A missing file is not an error.
pub fn delete(dir: &Path, name: &str) -> Result<()> {
    durable::remove_if_exists(&dir.join(name))?;
    Ok(())
}

fn unused_name(dir: &Path, extractor_id: &str) -> String {
    let mut timestamp = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default();
    loop {
        let name = format!("{}_{}", extractor_id, timestamp);
        if !dir.join(&name).exists() {
            return name;
        }
        timestamp += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::range::KeyRange;
    use tempfile::TempDir;

    fn rows(keys: impl Iterator<Item = i64>) -> Vec<(i64, String)> {
        keys.map(|k| (k, format!("{},name{}", k, k))).collect()
    }

    #[test]
    fn test_create_and_open() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let created = Segment::create(dir.path(), "0", rows(0..100), (0, 990), 8, 4)?;
        assert!(created.name().starts_with("0_"));

        let opened: Segment<i64, String> = Segment::open(dir.path(), created.name(), 0, 990)?;
        assert_eq!(opened.len(), 100);
        assert_eq!(opened.start(), 0);
        assert_eq!(opened.end(), 990);
        assert_eq!(opened.get(&42), Some(&"42,name42".to_string()));
        assert!(opened.iter().eq(created.iter()));
        Ok(())
    }

    #[test]
    fn test_names_do_not_collide() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let first = Segment::create(dir.path(), "3", rows(0..2), (0, 1), 4, 4)?;
        let second = Segment::create(dir.path(), "3", rows(2..4), (2, 3), 4, 4)?;

        assert_ne!(first.name(), second.name());
        assert!(dir.path().join(first.name()).exists());
        assert!(dir.path().join(second.name()).exists());
        Ok(())
    }

    #[test]
    fn test_range_over_segment() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let segment = Segment::create(dir.path(), "0", rows(0..100), (0, 99), 4, 3)?;

        let ranges = RangeSet::merge(vec![KeyRange::new(10, 12), KeyRange::new(98, 200)]);
        let keys: Vec<i64> = segment.range(&ranges).map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![10, 11, 12, 98, 99]);
        Ok(())
    }

    #[test]
    fn test_open_truncated_file() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let segment = Segment::create(dir.path(), "0", rows(0..10), (0, 9), 4, 4)?;

        let path = dir.path().join(segment.name());
        let bytes = fs::read(&path)?;
        fs::write(&path, &bytes[..bytes.len() / 2])?;

        let result: Result<Segment<i64, String>> = Segment::open(dir.path(), segment.name(), 0, 9);
        assert!(matches!(result, Err(Error::Corruption(_))));
        Ok(())
    }

    #[test]
    fn test_open_missing_file() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let result: Result<Segment<i64, u64>> = Segment::open(dir.path(), "0_1", 0, 0);
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_delete() -> Result<()> {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let segment = Segment::create(dir.path(), "0", rows(0..3), (0, 2), 4, 4)?;

        delete(dir.path(), segment.name())?;
        assert!(!dir.path().join(segment.name()).exists());
        delete(dir.path(), segment.name())?;
        Ok(())
    }
}
